//! Typed-boundary client for the CMS collection surface.
//!
//! The CMS exposes REST collections (`GET/POST /api/{collection}`,
//! `PATCH /api/{collection}/{id}`) with a `{docs, totalDocs}` list envelope.
//! This client is the only place raw [`Doc`]s exist; callers decode them
//! into the records in [`crate::types`] immediately.
//!
//! Status mapping follows the platform propagation table: 401/403 are
//! permission failures, 404 is `NotFound`, 429 and 5xx are retryable, any
//! other 4xx is permanent.

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::Value;

use crate::context::ActivityContext;
use crate::doc::Doc;
use crate::error::{ActivityError, ActivityResult, status_to_error, transport_error};
use crate::query::QueryBuilder;

/// Collection slugs observed on the CMS.
pub mod collections {
    pub const WORKSPACES: &str = "workspaces";
    pub const APPLICATIONS: &str = "applications";
    pub const VIRTUAL_CLUSTERS: &str = "virtual-clusters";
    pub const CLUSTERS: &str = "clusters";
    pub const ENVIRONMENT_MAPPINGS: &str = "environment-mappings";
    pub const TOPICS: &str = "topics";
    pub const SCHEMAS: &str = "schemas";
    pub const SERVICE_ACCOUNTS: &str = "service-accounts";
    pub const TOPIC_SHARES: &str = "topic-shares";
    pub const LINEAGE_EDGES: &str = "lineage-edges";
    pub const LINEAGE_SNAPSHOTS: &str = "lineage-snapshots";
    pub const GITHUB_INSTALLATIONS: &str = "github-installations";
    pub const DEPLOYMENT_GENERATORS: &str = "deployment-generators";
    pub const REGISTRY_IMAGES: &str = "registry-images";
    pub const QUOTAS: &str = "quotas";
    pub const APPS: &str = "apps";
    pub const API_SPECS: &str = "api-specs";
    pub const METRICS: &str = "metrics";
    pub const AUDIT_EVENTS: &str = "audit-events";
    pub const CLEANUP_SCHEDULES: &str = "cleanup-schedules";
}

/// Result of a list query.
#[derive(Debug, Clone, Default)]
pub struct FindResult {
    pub docs: Vec<Doc>,
    pub total_docs: i64,
}

#[derive(Debug, Clone)]
pub struct CmsClient {
    base_url: String,
    api_key: Option<String>,
    http: Client,
}

impl CmsClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> ActivityResult<Self> {
        let http = Client::builder()
            .user_agent(format!("orbit-activities/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ActivityError::unavailable(format!("building CMS client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn prepare(&self, ctx: &ActivityContext, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.timeout(ctx.remaining());
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("API-Key {key}")),
            None => builder,
        }
    }

    /// `GET /api/{collection}/{id}`
    pub fn get(&self, ctx: &ActivityContext, collection: &str, id: &str) -> ActivityResult<Doc> {
        ctx.ensure_active()?;
        let what = format!("fetching {collection}/{id}");
        let url = format!("{}/api/{}/{}", self.base_url, collection, id);

        let resp = self
            .prepare(ctx, self.http.get(url))
            .send()
            .map_err(|e| transport_error(e, &what))?;
        let doc: Value = Self::check(resp, &what)?
            .json()
            .map_err(|e| transport_error(e, &what))?;
        as_doc(doc, &what)
    }

    /// `GET /api/{collection}/{id}?depth=n` with populated relations.
    pub fn get_with_depth(
        &self,
        ctx: &ActivityContext,
        collection: &str,
        id: &str,
        depth: u32,
    ) -> ActivityResult<Doc> {
        ctx.ensure_active()?;
        let what = format!("fetching {collection}/{id}");
        let url = format!("{}/api/{}/{}", self.base_url, collection, id);

        let resp = self
            .prepare(ctx, self.http.get(url).query(&[("depth", depth.to_string())]))
            .send()
            .map_err(|e| transport_error(e, &what))?;
        let doc: Value = Self::check(resp, &what)?
            .json()
            .map_err(|e| transport_error(e, &what))?;
        as_doc(doc, &what)
    }

    /// `GET /api/{collection}` with query parameters.
    pub fn find(
        &self,
        ctx: &ActivityContext,
        collection: &str,
        query: &QueryBuilder,
    ) -> ActivityResult<FindResult> {
        ctx.ensure_active()?;
        let what = format!("querying {collection}");
        let url = format!("{}/api/{}", self.base_url, collection);

        let resp = self
            .prepare(ctx, self.http.get(url).query(&query.build()))
            .send()
            .map_err(|e| transport_error(e, &what))?;
        let body: Value = Self::check(resp, &what)?
            .json()
            .map_err(|e| transport_error(e, &what))?;

        let docs = body
            .get("docs")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_object().cloned())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let total_docs = body
            .get("totalDocs")
            .and_then(Value::as_i64)
            .unwrap_or(docs.len() as i64);

        Ok(FindResult { docs, total_docs })
    }

    /// First match of a query, `None` when the result set is empty.
    pub fn find_one(
        &self,
        ctx: &ActivityContext,
        collection: &str,
        query: &QueryBuilder,
    ) -> ActivityResult<Option<Doc>> {
        let result = self.find(ctx, collection, &query.clone().limit(1))?;
        Ok(result.docs.into_iter().next())
    }

    /// `POST /api/{collection}`; the response envelope carries the created
    /// doc under `doc`.
    pub fn create(
        &self,
        ctx: &ActivityContext,
        collection: &str,
        data: Value,
    ) -> ActivityResult<Doc> {
        ctx.ensure_active()?;
        let what = format!("creating {collection}");
        let url = format!("{}/api/{}", self.base_url, collection);

        let resp = self
            .prepare(ctx, self.http.post(url).json(&data))
            .send()
            .map_err(|e| transport_error(e, &what))?;
        let body: Value = Self::check(resp, &what)?
            .json()
            .map_err(|e| transport_error(e, &what))?;
        unwrap_doc_envelope(body, &what)
    }

    /// `PATCH /api/{collection}/{id}`
    pub fn update(
        &self,
        ctx: &ActivityContext,
        collection: &str,
        id: &str,
        patch: Value,
    ) -> ActivityResult<Doc> {
        self.patch_path(ctx, &format!("api/{collection}/{id}"), collection, id, patch)
    }

    /// `PATCH /api/internal/{collection}/{id}`: the status-update surface
    /// the workers use, bypassing user-facing hooks.
    pub fn update_internal(
        &self,
        ctx: &ActivityContext,
        collection: &str,
        id: &str,
        patch: Value,
    ) -> ActivityResult<Doc> {
        self.patch_path(
            ctx,
            &format!("api/internal/{collection}/{id}"),
            collection,
            id,
            patch,
        )
    }

    fn patch_path(
        &self,
        ctx: &ActivityContext,
        path: &str,
        collection: &str,
        id: &str,
        patch: Value,
    ) -> ActivityResult<Doc> {
        ctx.ensure_active()?;
        let what = format!("updating {collection}/{id}");
        let url = format!("{}/{}", self.base_url, path);

        let resp = self
            .prepare(ctx, self.http.patch(url).json(&patch))
            .send()
            .map_err(|e| transport_error(e, &what))?;
        let body: Value = Self::check(resp, &what)?
            .json()
            .map_err(|e| transport_error(e, &what))?;
        unwrap_doc_envelope(body, &what)
    }

    fn check(
        resp: reqwest::blocking::Response,
        what: &str,
    ) -> ActivityResult<reqwest::blocking::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let hint = if status == StatusCode::NOT_FOUND {
            String::new()
        } else {
            resp.text().unwrap_or_default().chars().take(200).collect()
        };
        Err(status_to_error(status.as_u16(), what, &hint))
    }
}

fn as_doc(value: Value, what: &str) -> ActivityResult<Doc> {
    match value {
        Value::Object(doc) => Ok(doc),
        other => Err(ActivityError::Other(anyhow::anyhow!(
            "{what}: expected a document object, got {other}"
        ))),
    }
}

/// Create/update responses wrap the record as `{"doc": {...}}`; tolerate the
/// bare form as well.
fn unwrap_doc_envelope(body: Value, what: &str) -> ActivityResult<Doc> {
    match body {
        Value::Object(mut obj) => {
            if let Some(Value::Object(doc)) = obj.remove("doc") {
                return Ok(doc);
            }
            Ok(obj)
        }
        other => Err(ActivityError::Other(anyhow::anyhow!(
            "{what}: expected a document envelope, got {other}"
        ))),
    }
}
