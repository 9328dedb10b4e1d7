//! # Session
//!
//! Login and logout on top of a [`QueryClient`].
//!
//! ```text
//! login(credentials)
//!   ├── validate email / password locally
//!   ├── POST /api/v1/auth/login ──► AuthResponse
//!   ├── store access_token in the credential store
//!   ├── cache ["user"] = response.user
//!   └── prefetch ["dashboard","resumen"] (failure only logged)
//!
//! logout()
//!   ├── clear the stored token
//!   └── clear the whole cache
//! ```

use nexus_core::validation::validate_email;
use nexus_core::{AuthResponse, LoginCredentials, User, ValidationError};
use tracing::info;

use crate::client::QueryClient;
use crate::error::{SyncError, SyncResult};
use crate::queries;

/// Authentication state for one [`QueryClient`].
#[derive(Debug, Clone)]
pub struct Session {
    client: QueryClient,
}

impl Session {
    pub fn new(client: QueryClient) -> Self {
        Session { client }
    }

    pub fn client(&self) -> &QueryClient {
        &self.client
    }

    pub fn is_authenticated(&self) -> bool {
        self.client.api().has_token()
    }

    /// Signs in and warms the dashboard.
    pub async fn login(&self, credentials: &LoginCredentials) -> SyncResult<User> {
        validate_email(&credentials.email)?;
        if credentials.password.is_empty() {
            return Err(ValidationError::Required {
                field: "password".to_string(),
            }
            .into());
        }

        let response: AuthResponse = self
            .client
            .api()
            .post("/api/v1/auth/login", credentials)
            .await?;

        self.client
            .api()
            .credentials()
            .set_token(&response.access_token);
        self.client.set_query(&queries::current_user(), &response.user)?;
        info!(user_id = %response.user.id, rol = %response.user.rol, "Logged in");

        self.client.prefetch(&queries::dashboard_resumen()).await;
        Ok(response.user)
    }

    /// Forgets the token and every cached entry.
    pub fn logout(&self) {
        self.client.api().credentials().clear_token();
        self.client.clear();
        info!("Logged out");
    }

    /// The signed-in user, fetched when not cached. `None` without a token.
    pub async fn current_user(&self) -> SyncResult<Option<User>> {
        if !self.is_authenticated() {
            return Ok(None);
        }
        match self.client.read_query(&queries::current_user()).await {
            Ok(user) => Ok(Some(user)),
            Err(SyncError::Unauthenticated) => Ok(None),
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiClient;
    use crate::config::CacheSettings;
    use crate::credentials::{CredentialStore, MemoryCredentialStore};
    use crate::executor::RequestExecutor;
    use crate::queries::keys;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session(server: &MockServer, store: Arc<MemoryCredentialStore>) -> Session {
        let executor = RequestExecutor::new(&server.uri(), Duration::from_secs(5)).unwrap();
        Session::new(QueryClient::new(
            ApiClient::new(executor, store),
            &CacheSettings::default(),
        ))
    }

    fn user_json() -> Value {
        json!({
            "id": "u1",
            "email": "caja@nexus.com",
            "full_name": "Caja Uno",
            "rol": "cajero",
            "tienda_id": "t1",
            "tienda": {"id": "t1", "nombre": "Kiosco", "rubro": "almacen"}
        })
    }

    fn credentials() -> LoginCredentials {
        LoginCredentials {
            email: "caja@nexus.com".into(),
            password: "secreto".into(),
        }
    }

    #[tokio::test]
    async fn test_login_stores_token_and_warms_cache() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/login"))
            .and(body_json(json!({"email": "caja@nexus.com", "password": "secreto"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "jwt-1",
                "token_type": "bearer",
                "user": user_json()
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/dashboard/resumen"))
            .and(header("authorization", "Bearer jwt-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ventas_hoy": {}})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/auth/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
            .expect(0)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryCredentialStore::new());
        let session = session(&server, store.clone());
        let user = session.login(&credentials()).await.unwrap();

        assert_eq!(user.id, "u1");
        assert_eq!(store.get_token().as_deref(), Some("jwt-1"));
        assert!(session.is_authenticated());
        assert!(session
            .client()
            .cache()
            .fresh_data(&keys::dashboard_resumen())
            .is_some());

        // Served from the cache written at login.
        let current = session.current_user().await.unwrap().unwrap();
        assert_eq!(current, user);
    }

    #[tokio::test]
    async fn test_login_rejected_leaves_no_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/login"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"detail": "Credenciales incorrectas"})),
            )
            .mount(&server)
            .await;

        let store = Arc::new(MemoryCredentialStore::new());
        let session = session(&server, store.clone());
        let err = session.login(&credentials()).await.unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(err.to_string(), "Credenciales incorrectas");
        assert_eq!(store.get_token(), None);
    }

    #[tokio::test]
    async fn test_login_validates_before_sending() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let session = session(&server, Arc::new(MemoryCredentialStore::new()));
        let bad_email = LoginCredentials {
            email: "no-at-sign".into(),
            password: "x".into(),
        };
        assert!(matches!(
            session.login(&bad_email).await,
            Err(SyncError::Validation(_))
        ));

        let no_password = LoginCredentials {
            email: "caja@nexus.com".into(),
            password: String::new(),
        };
        assert!(matches!(
            session.login(&no_password).await,
            Err(SyncError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_clears_token_and_cache() {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryCredentialStore::with_token("jwt-1"));
        let session = session(&server, store.clone());
        session
            .client()
            .set_query_data(&keys::ventas(), &json!([]))
            .unwrap();

        session.logout();

        assert_eq!(store.get_token(), None);
        assert!(session.client().cache().is_empty());
        assert_eq!(session.current_user().await.unwrap(), None);
    }
}
