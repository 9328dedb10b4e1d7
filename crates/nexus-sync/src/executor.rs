//! # Request Executor
//!
//! Issues one authenticated HTTP call with a hard timeout and turns every
//! failure into a [`SyncError`].
//!
//! ## Request Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  execute(endpoint, method, body?, token?)                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌──────────────────── timeout (5000 ms) ─────────────────────────┐    │
//! │  │  send ──► status ──► read body                                 │    │
//! │  └────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ├── elapsed             → Timeout { after_ms }                   │
//! │       ├── transport failure   → Network(..)                            │
//! │       ├── non-2xx             → Api { status, message }                │
//! │       │     message from: error.message ▸ detail ▸ message             │
//! │       │     fallback:     "404: Not Found"                             │
//! │       ├── 2xx, bad JSON       → Decode(..)                             │
//! │       └── 2xx                 → JSON (empty body = null)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No retries happen here. Retry policy belongs to the caller.

use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::ApiSettings;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// HTTP Method
// =============================================================================

/// HTTP methods used by the POS API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_reqwest().as_str())
    }
}

// =============================================================================
// Executor
// =============================================================================

/// Bounded-latency HTTP executor.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl RequestExecutor {
    /// Creates an executor for `base_url` (http or https).
    pub fn new(base_url: &str, timeout: Duration) -> SyncResult<Self> {
        let parsed = Url::parse(base_url)?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(SyncError::InvalidUrl(format!(
                "API URL must start with http:// or https://, got: {}",
                base_url
            )));
        }

        if timeout.is_zero() {
            return Err(SyncError::InvalidConfig("timeout must be greater than 0".into()));
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| SyncError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(RequestExecutor {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Creates an executor from the `[api]` config section.
    pub fn from_settings(settings: &ApiSettings) -> SyncResult<Self> {
        Self::new(&settings.base_url, settings.timeout())
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Hard per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Issues one request and returns the JSON body.
    ///
    /// The bearer header is attached only when `auth_token` is `Some`.
    pub async fn execute(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<&Value>,
        auth_token: Option<&str>,
    ) -> SyncResult<Value> {
        let url = Url::parse(&format!(
            "{}/{}",
            self.base_url,
            endpoint.trim_start_matches('/')
        ))?;

        debug!(%method, %url, authenticated = auth_token.is_some(), "Sending request");

        let mut request = self.http.request(method.as_reqwest(), url.clone());
        if let Some(token) = auth_token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        // Covers connect, headers and the full body read
        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let bytes = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, bytes))
        };

        let result = match tokio::time::timeout(self.timeout, exchange).await {
            Err(_) => Err(self.timeout_error()),
            Ok(Err(e)) => Err(match SyncError::from(e) {
                SyncError::Timeout { .. } => self.timeout_error(),
                other => other,
            }),
            Ok(Ok((status, bytes))) => Self::interpret(status, &bytes),
        };

        if let Err(ref error) = result {
            warn!(%method, %url, kind = error.kind(), %error, "Request failed");
        }

        result
    }

    fn timeout_error(&self) -> SyncError {
        SyncError::Timeout {
            after_ms: self.timeout.as_millis() as u64,
        }
    }

    fn interpret(status: StatusCode, body: &[u8]) -> SyncResult<Value> {
        if !status.is_success() {
            return Err(SyncError::Api {
                status: status.as_u16(),
                message: error_message(status, body),
            });
        }

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_slice(body)?)
    }
}

// =============================================================================
// Error Body Parsing
// =============================================================================

/// Extracts a human-readable message from an error response body.
fn error_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|json| structured_message(&json))
        .unwrap_or_else(|| {
            format!(
                "{}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown Status")
            )
        })
}

/// Priority: `error.message`, then `detail`, then `message`.
///
/// `detail` is either a string or a list of field errors with `msg` fields.
fn structured_message(json: &Value) -> Option<String> {
    if let Some(message) = json.pointer("/error/message").and_then(Value::as_str) {
        return Some(message.to_string());
    }

    match json.get("detail") {
        Some(Value::String(detail)) => return Some(detail.clone()),
        Some(Value::Array(items)) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if !messages.is_empty() {
                return Some(messages.join("; "));
            }
        }
        _ => {}
    }

    json.get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn executor(server: &MockServer) -> RequestExecutor {
        RequestExecutor::new(&server.uri(), Duration::from_millis(5000)).unwrap()
    }

    #[tokio::test]
    async fn test_get_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/productos"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "p1"}])))
            .expect(1)
            .mount(&server)
            .await;

        let value = executor(&server)
            .execute("/api/v1/productos", Method::Get, None, Some("test-token"))
            .await
            .unwrap();
        assert_eq!(value, json!([{"id": "p1"}]));
    }

    #[tokio::test]
    async fn test_no_token_no_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/health"))
            .respond_with(|req: &Request| {
                if req.headers.contains_key("authorization") {
                    ResponseTemplate::new(400)
                } else {
                    ResponseTemplate::new(200).set_body_json(json!({"ok": true}))
                }
            })
            .mount(&server)
            .await;

        let value = executor(&server)
            .execute("api/v1/health", Method::Get, None, None)
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let server = MockServer::start().await;
        let body = json!({"items": [], "metodo_pago": "EFECTIVO"});
        Mock::given(method("POST"))
            .and(path("/api/v1/ventas/checkout"))
            .and(body_json(body.clone()))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "v1"})))
            .expect(1)
            .mount(&server)
            .await;

        let value = executor(&server)
            .execute("/api/v1/ventas/checkout", Method::Post, Some(&body), None)
            .await
            .unwrap();
        assert_eq!(value["id"], "v1");
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let executor = RequestExecutor::new(&server.uri(), Duration::from_millis(100)).unwrap();
        let err = executor
            .execute("/slow", Method::Get, None, None)
            .await
            .unwrap_err();
        assert_eq!(err, SyncError::Timeout { after_ms: 100 });
    }

    #[tokio::test]
    async fn test_fastapi_detail_string() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/ventas/scan/000"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"detail": "Producto con código '000' no encontrado"})),
            )
            .mount(&server)
            .await;

        let err = executor(&server)
            .execute("/api/v1/ventas/scan/000", Method::Get, None, None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SyncError::Api {
                status: 404,
                message: "Producto con código '000' no encontrado".into()
            }
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        // Nothing listens on port 1
        let executor = RequestExecutor::new("http://127.0.0.1:1", Duration::from_secs(5)).unwrap();
        let err = executor
            .execute("/", Method::Get, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Network(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_malformed_success_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = executor(&server)
            .execute("/api/v1/productos", Method::Get, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Decode(_)));
    }

    #[tokio::test]
    async fn test_empty_success_body_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let value = executor(&server)
            .execute("/api/v1/productos/p1", Method::Delete, None, Some("t"))
            .await
            .unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn test_error_message_priority() {
        let status = StatusCode::BAD_REQUEST;

        let body = json!({"error": {"message": "nested"}, "detail": "detail", "message": "top"});
        assert_eq!(error_message(status, body.to_string().as_bytes()), "nested");

        let body = json!({"detail": "detail", "message": "top"});
        assert_eq!(error_message(status, body.to_string().as_bytes()), "detail");

        let body = json!({"message": "top"});
        assert_eq!(error_message(status, body.to_string().as_bytes()), "top");

        let body = json!({"detail": [
            {"loc": ["body", "items"], "msg": "field required"},
            {"loc": ["body", "metodo_pago"], "msg": "invalid enum"}
        ]});
        assert_eq!(
            error_message(StatusCode::UNPROCESSABLE_ENTITY, body.to_string().as_bytes()),
            "field required; invalid enum"
        );
    }

    #[test]
    fn test_error_message_fallback() {
        assert_eq!(
            error_message(StatusCode::INTERNAL_SERVER_ERROR, b"Internal Server Error"),
            "500: Internal Server Error"
        );
        assert_eq!(
            error_message(StatusCode::NOT_FOUND, br#"{"unexpected": 1}"#),
            "404: Not Found"
        );
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        assert!(RequestExecutor::new("ftp://example.com", Duration::from_secs(1)).is_err());
        assert!(RequestExecutor::new("http://example.com", Duration::ZERO).is_err());
    }
}
