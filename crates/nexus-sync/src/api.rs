//! # API Client
//!
//! [`RequestExecutor`] plus the credential store, with typed helpers.
//!
//! The token is read from the store at call time, so a login or logout is
//! picked up by the next request without rebuilding anything.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::credentials::CredentialStore;
use crate::error::{SyncError, SyncResult};
use crate::executor::{Method, RequestExecutor};

// =============================================================================
// Request Description
// =============================================================================

/// A reusable description of one call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        ApiRequest {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Put, path).with_body(body)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

// =============================================================================
// Client
// =============================================================================

/// Authenticated API access shared by queries, mutations and the session.
#[derive(Clone)]
pub struct ApiClient {
    executor: Arc<RequestExecutor>,
    credentials: Arc<dyn CredentialStore>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.executor.base_url())
            .field("authenticated", &self.has_token())
            .finish()
    }
}

impl ApiClient {
    pub fn new(executor: RequestExecutor, credentials: Arc<dyn CredentialStore>) -> Self {
        ApiClient {
            executor: Arc::new(executor),
            credentials,
        }
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    /// True when a token is stored.
    pub fn has_token(&self) -> bool {
        self.credentials.get_token().is_some()
    }

    /// Sends a described request and returns the raw JSON body.
    pub async fn send(&self, request: &ApiRequest) -> SyncResult<Value> {
        let token = self.credentials.get_token();
        self.executor
            .execute(
                &request.path,
                request.method,
                request.body.as_ref(),
                token.as_deref(),
            )
            .await
    }

    /// Sends a request and decodes the body into `T`.
    pub async fn send_as<T: DeserializeOwned>(&self, request: &ApiRequest) -> SyncResult<T> {
        let value = self.send(request).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> SyncResult<T> {
        self.send_as(&ApiRequest::get(path)).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> SyncResult<T> {
        self.send_as(&ApiRequest::post(path, encode(body)?)).await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> SyncResult<T> {
        self.send_as(&ApiRequest::put(path, encode(body)?)).await
    }

    /// PATCH with an optional body.
    pub async fn patch<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> SyncResult<T> {
        let mut request = ApiRequest::patch(path);
        if let Some(body) = body {
            request = request.with_body(encode(body)?);
        }
        self.send_as(&request).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> SyncResult<T> {
        self.send_as(&ApiRequest::delete(path)).await
    }
}

pub(crate) fn encode<B: Serialize>(body: &B) -> SyncResult<Value> {
    serde_json::to_value(body)
        .map_err(|e| SyncError::Internal(format!("Failed to encode request body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialStore;
    use nexus_core::{Producto, ProductoScan};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, store: Arc<MemoryCredentialStore>) -> ApiClient {
        let executor = RequestExecutor::new(&server.uri(), Duration::from_secs(5)).unwrap();
        ApiClient::new(executor, store)
    }

    #[tokio::test]
    async fn test_typed_get_reads_token_at_call_time() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/ventas/scan/7790001"))
            .and(header("authorization", "Bearer late-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "p1",
                "nombre": "Yerba",
                "sku": "7790001",
                "precio_venta": 1500.0,
                "stock_actual": 4.0,
                "tipo": "GENERAL",
                "tiene_stock": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryCredentialStore::new());
        let api = client(&server, store.clone());
        assert!(!api.has_token());

        store.set_token("late-token");
        let scan: ProductoScan = api.get("/api/v1/ventas/scan/7790001").await.unwrap();
        assert_eq!(scan.nombre, "Yerba");
        assert!(scan.tiene_stock);
    }

    #[tokio::test]
    async fn test_type_mismatch_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/productos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"not": "a list"})))
            .mount(&server)
            .await;

        let api = client(&server, Arc::new(MemoryCredentialStore::new()));
        let err = api.get::<Vec<Producto>>("/api/v1/productos").await.unwrap_err();
        assert!(matches!(err, SyncError::Decode(_)));
    }

    #[tokio::test]
    async fn test_delete_without_content() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/productos/p1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server, Arc::new(MemoryCredentialStore::with_token("t")));
        let () = api.delete("/api/v1/productos/p1").await.unwrap();
    }

    #[test]
    fn test_request_builders() {
        let request = ApiRequest::post("/api/v1/productos", json!({"nombre": "Yerba"}));
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.body, Some(json!({"nombre": "Yerba"})));

        let request = ApiRequest::patch("/api/v1/admin/usuarios/u1/activate");
        assert_eq!(request.body, None);
    }
}
