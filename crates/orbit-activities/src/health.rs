//! HTTP health-check activity.

use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::context::{ActivityContext, require};
use crate::error::{ActivityError, ActivityResult};

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_EXPECTED_STATUS: u16 = 200;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthCheckInput {
    pub url: String,
    /// Defaults to GET.
    #[serde(default)]
    pub method: String,
    /// Defaults to 200.
    #[serde(default)]
    pub expected_status: Option<u16>,
    /// Defaults to 10 seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckOutput {
    /// healthy | degraded | down
    pub status: String,
    pub status_code: u16,
    pub response_time_ms: u64,
}

/// Probe a URL: the expected status is healthy, 5xx is down, anything else
/// (including an unreachable endpoint) is degraded or down accordingly.
pub fn health_check(
    ctx: &ActivityContext,
    input: &HealthCheckInput,
) -> ActivityResult<HealthCheckOutput> {
    require("url", &input.url)?;
    let method = if input.method.is_empty() {
        "GET".to_string()
    } else {
        input.method.to_uppercase()
    };
    let expected = input.expected_status.unwrap_or(DEFAULT_EXPECTED_STATUS);
    let timeout = Duration::from_secs(input.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
    ctx.info(&format!("health check {method} {}", input.url));
    ctx.ensure_active()?;

    let client = Client::builder()
        .user_agent(format!("orbit-activities/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ActivityError::unavailable(format!("building health client: {e}")))?;
    let reqwest_method = reqwest::Method::from_bytes(method.as_bytes())
        .map_err(|_| ActivityError::invalid_input(format!("invalid method {method}")))?;

    let start = Instant::now();
    let result = client
        .request(reqwest_method, &input.url)
        .timeout(timeout.min(ctx.remaining()))
        .send();
    // Sub-millisecond probes still report a nonzero time.
    let response_time_ms = start.elapsed().as_millis().max(1) as u64;

    let output = match result {
        Ok(resp) => {
            let code = resp.status().as_u16();
            let status = if code == expected {
                "healthy"
            } else if code >= 500 {
                "down"
            } else {
                "degraded"
            };
            HealthCheckOutput {
                status: status.to_string(),
                status_code: code,
                response_time_ms,
            }
        }
        // Unreachable endpoints are down, not an activity failure.
        Err(_) => HealthCheckOutput {
            status: "down".to_string(),
            status_code: 0,
            response_time_ms,
        },
    };

    ctx.info(&format!(
        "health check complete ({}, status {}, {}ms)",
        output.status, output.status_code, output.response_time_ms
    ));
    Ok(output)
}

#[cfg(test)]
mod tests {
    use std::thread;

    use tiny_http::{Response, Server};

    use super::*;

    fn serve(status: u16) -> (String, thread::JoinHandle<()>) {
        let server = Server::http("127.0.0.1:0").expect("server");
        let addr = format!("http://{}", server.server_addr());
        let handle = thread::spawn(move || {
            let req = server.recv().expect("request");
            req.respond(Response::from_string("ok").with_status_code(status))
                .unwrap();
        });
        (addr, handle)
    }

    fn ctx() -> ActivityContext {
        ActivityContext::background("test")
    }

    #[test]
    fn expected_status_is_healthy() {
        let (url, handle) = serve(200);
        let out = health_check(
            &ctx(),
            &HealthCheckInput {
                url,
                ..Default::default()
            },
        )
        .expect("check");
        assert_eq!(out.status, "healthy");
        assert_eq!(out.status_code, 200);
        handle.join().unwrap();
    }

    #[test]
    fn unexpected_4xx_is_degraded() {
        let (url, handle) = serve(404);
        let out = health_check(
            &ctx(),
            &HealthCheckInput {
                url,
                ..Default::default()
            },
        )
        .expect("check");
        assert_eq!(out.status, "degraded");
        assert_eq!(out.status_code, 404);
        assert!(out.response_time_ms > 0);
        handle.join().unwrap();
    }

    #[test]
    fn five_hundreds_are_down() {
        let (url, handle) = serve(503);
        let out = health_check(
            &ctx(),
            &HealthCheckInput {
                url,
                ..Default::default()
            },
        )
        .expect("check");
        assert_eq!(out.status, "down");
        handle.join().unwrap();
    }

    #[test]
    fn custom_expected_status_wins() {
        let (url, handle) = serve(204);
        let out = health_check(
            &ctx(),
            &HealthCheckInput {
                url,
                expected_status: Some(204),
                ..Default::default()
            },
        )
        .expect("check");
        assert_eq!(out.status, "healthy");
        handle.join().unwrap();
    }

    #[test]
    fn unreachable_endpoint_is_down_not_an_error() {
        let out = health_check(
            &ctx(),
            &HealthCheckInput {
                url: "http://127.0.0.1:1/healthz".to_string(),
                timeout_secs: Some(1),
                ..Default::default()
            },
        )
        .expect("check");
        assert_eq!(out.status, "down");
        assert_eq!(out.status_code, 0);
    }
}
