//! Object-store client used for metric archives and codegen artifacts.
//!
//! The store is an HTTP PUT surface: `{endpoint}/{bucket}/{path}`. The
//! capability trait keeps the archive step and the artifact uploader
//! testable against a recording fake.

use reqwest::blocking::Client;
use serde_json::Value;

use crate::context::ActivityContext;
use crate::error::{ActivityError, ActivityResult, status_to_error, transport_error};

/// Blob upload operations.
pub trait ObjectStore: Send + Sync {
    /// Upload a JSON payload; returns the bytes written.
    fn upload_json(&self, ctx: &ActivityContext, path: &str, payload: &Value)
    -> ActivityResult<u64>;
    /// Upload raw bytes; returns the object URL.
    fn upload_bytes(
        &self,
        ctx: &ActivityContext,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> ActivityResult<String>;
}

/// HTTP-backed store.
pub struct HttpObjectStore {
    endpoint: String,
    bucket: String,
    http: Client,
}

impl HttpObjectStore {
    pub fn new(endpoint: &str, bucket: &str) -> ActivityResult<Self> {
        let http = Client::builder()
            .user_agent(format!("orbit-activities/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ActivityError::unavailable(format!("building object store client: {e}")))?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.trim_matches('/').to_string(),
            http,
        })
    }

    fn object_url(&self, path: &str) -> String {
        if self.bucket.is_empty() {
            format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
        } else {
            format!(
                "{}/{}/{}",
                self.endpoint,
                self.bucket,
                path.trim_start_matches('/')
            )
        }
    }

    fn put(
        &self,
        ctx: &ActivityContext,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> ActivityResult<String> {
        ctx.ensure_active()?;
        let url = self.object_url(path);
        let what = format!("uploading {path}");

        let resp = self
            .http
            .put(&url)
            .timeout(ctx.remaining())
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .map_err(|e| transport_error(e, &what))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let hint: String = resp.text().unwrap_or_default().chars().take(200).collect();
            return Err(status_to_error(status.as_u16(), &what, &hint));
        }
        Ok(url)
    }
}

impl ObjectStore for HttpObjectStore {
    fn upload_json(
        &self,
        ctx: &ActivityContext,
        path: &str,
        payload: &Value,
    ) -> ActivityResult<u64> {
        let bytes = serde_json::to_vec(payload)
            .map_err(|e| ActivityError::Other(anyhow::anyhow!("serializing {path}: {e}")))?;
        let written = bytes.len() as u64;
        self.put(ctx, path, bytes, "application/json")?;
        Ok(written)
    }

    fn upload_bytes(
        &self,
        ctx: &ActivityContext,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> ActivityResult<String> {
        self.put(ctx, path, bytes.to_vec(), content_type)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use serde_json::json;
    use tiny_http::{Response, Server};

    use super::*;

    #[test]
    fn upload_json_puts_under_the_bucket() {
        let server = Server::http("127.0.0.1:0").expect("server");
        let addr = format!("http://{}", server.server_addr());
        let handle = thread::spawn(move || {
            let mut req = server.recv().expect("request");
            assert_eq!(*req.method(), tiny_http::Method::Put);
            assert_eq!(req.url(), "/archives/metrics/app-1/2026-01-01T00-00-00.json");
            let mut body = String::new();
            use std::io::Read;
            req.as_reader().read_to_string(&mut body).unwrap();
            assert!(body.contains("\"docs\""));
            req.respond(Response::from_string("")).unwrap();
        });

        let ctx = ActivityContext::background("test");
        let store = HttpObjectStore::new(&addr, "archives").expect("store");
        let written = store
            .upload_json(
                &ctx,
                "metrics/app-1/2026-01-01T00-00-00.json",
                &json!({"docs": []}),
            )
            .expect("upload");
        assert!(written > 0);
        handle.join().unwrap();
    }

    #[test]
    fn upload_failure_maps_to_the_status_kind() {
        let server = Server::http("127.0.0.1:0").expect("server");
        let addr = format!("http://{}", server.server_addr());
        let handle = thread::spawn(move || {
            let req = server.recv().expect("request");
            req.respond(Response::from_string("denied").with_status_code(403))
                .unwrap();
        });

        let ctx = ActivityContext::background("test");
        let store = HttpObjectStore::new(&addr, "archives").expect("store");
        let err = store
            .upload_bytes(&ctx, "a/b.tar.gz", b"data", "application/gzip")
            .expect_err("403");
        assert!(matches!(err, ActivityError::PermissionDenied(_)));
        handle.join().unwrap();
    }

    #[test]
    fn object_url_composition() {
        let store = HttpObjectStore::new("http://store:9000/", "bucket").expect("store");
        assert_eq!(
            store.object_url("/a/b.json"),
            "http://store:9000/bucket/a/b.json"
        );
        let no_bucket = HttpObjectStore::new("http://store:9000", "").expect("store");
        assert_eq!(no_bucket.object_url("a/b.json"), "http://store:9000/a/b.json");
    }
}
