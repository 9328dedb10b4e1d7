//! # Mutation Catalog
//!
//! Writes the POS front end performs, each paired with the cache prefixes it
//! makes stale.
//!
//! ```text
//! ┌──────────────────┬──────────────────────────────────────────┬─────────────────────────────────────┐
//! │ Mutation         │ Request                                  │ Invalidates                         │
//! ├──────────────────┼──────────────────────────────────────────┼─────────────────────────────────────┤
//! │ checkout         │ POST   /api/v1/ventas/checkout           │ ventas, dashboard, productos,       │
//! │                  │                                          │ insights                            │
//! │ create_producto  │ POST   /api/v1/productos                 │ productos, dashboard                │
//! │ update_producto  │ PUT    /api/v1/productos/{id}            │ productos, dashboard                │
//! │ delete_producto  │ DELETE /api/v1/productos/{id}            │ productos, dashboard                │
//! │ create_tienda    │ POST   /api/v1/admin/tiendas             │ admin/tiendas                       │
//! │ create_usuario   │ POST   /api/v1/admin/usuarios            │ admin/usuarios                      │
//! │ deactivate_user  │ DELETE /api/v1/admin/usuarios/{id}       │ admin/usuarios                      │
//! │ activate_usuario │ PATCH  /api/v1/admin/usuarios/{id}/activ │ admin/usuarios                      │
//! │ onboarding       │ POST   /api/v1/admin/onboarding          │ admin/tiendas, admin/usuarios       │
//! │ update_mi_tienda │ PATCH  /api/v1/tiendas/me                │ user                                │
//! └──────────────────┴──────────────────────────────────────────┴─────────────────────────────────────┘
//! ```
//!
//! Inputs are validated locally first. A rejected input never reaches the
//! network, and because the dispatcher only invalidates on success it never
//! touches the cache either.

use nexus_core::validation::{
    validate_checkout, validate_email, validate_producto_input, validate_uuid,
};
use nexus_core::{
    CheckoutRequest, OnboardingData, OnboardingResponse, Producto, ProductoInput, Tienda,
    TiendaCreate, TiendaUpdate, Usuario, UsuarioCreate, ValidationError, Venta,
};
use serde_json::{json, Value};

use crate::api::ApiClient;
use crate::dispatcher::MutationDescriptor;
use crate::error::SyncError;
use crate::queries::keys;

/// Records a sale.
pub fn checkout(api: &ApiClient) -> MutationDescriptor<CheckoutRequest, Venta> {
    let api = api.clone();
    MutationDescriptor::new(
        "checkout",
        move |request: CheckoutRequest| {
            let api = api.clone();
            async move {
                validate_checkout(&request)?;
                api.post("/api/v1/ventas/checkout", &request).await
            }
        },
        vec![
            keys::ventas(),
            keys::dashboard(),
            keys::productos(),
            keys::insights(),
        ],
    )
}

pub fn create_producto(api: &ApiClient) -> MutationDescriptor<ProductoInput, Producto> {
    let api = api.clone();
    MutationDescriptor::new(
        "create_producto",
        move |input: ProductoInput| {
            let api = api.clone();
            async move {
                validate_producto_input(&input, true)?;
                api.post("/api/v1/productos", &input).await
            }
        },
        vec![keys::productos(), keys::dashboard()],
    )
}

/// Input is `(producto_id, changes)`.
pub fn update_producto(api: &ApiClient) -> MutationDescriptor<(String, ProductoInput), Producto> {
    let api = api.clone();
    MutationDescriptor::new(
        "update_producto",
        move |(id, input): (String, ProductoInput)| {
            let api = api.clone();
            async move {
                validate_uuid("producto_id", &id)?;
                validate_producto_input(&input, false)?;
                api.put(&format!("/api/v1/productos/{}", id), &input).await
            }
        },
        vec![keys::productos(), keys::dashboard()],
    )
}

pub fn delete_producto(api: &ApiClient) -> MutationDescriptor<String, Value> {
    let api = api.clone();
    MutationDescriptor::new(
        "delete_producto",
        move |id: String| {
            let api = api.clone();
            async move {
                validate_uuid("producto_id", &id)?;
                api.delete(&format!("/api/v1/productos/{}", id)).await
            }
        },
        vec![keys::productos(), keys::dashboard()],
    )
}

pub fn create_tienda(api: &ApiClient) -> MutationDescriptor<TiendaCreate, Tienda> {
    let api = api.clone();
    MutationDescriptor::new(
        "create_tienda",
        move |input: TiendaCreate| {
            let api = api.clone();
            async move {
                if input.nombre.trim().is_empty() {
                    return Err(SyncError::from(ValidationError::Required {
                        field: "nombre".to_string(),
                    }));
                }
                api.post("/api/v1/admin/tiendas", &input).await
            }
        },
        vec![keys::admin_tiendas()],
    )
}

pub fn create_usuario(api: &ApiClient) -> MutationDescriptor<UsuarioCreate, Usuario> {
    let api = api.clone();
    MutationDescriptor::new(
        "create_usuario",
        move |input: UsuarioCreate| {
            let api = api.clone();
            async move {
                validate_email(&input.email)?;
                validate_uuid("tienda_id", &input.tienda_id)?;
                api.post("/api/v1/admin/usuarios", &input).await
            }
        },
        vec![keys::admin_usuarios()],
    )
}

/// Soft delete: the backend flags the user inactive.
pub fn deactivate_usuario(api: &ApiClient) -> MutationDescriptor<String, Value> {
    let api = api.clone();
    MutationDescriptor::new(
        "deactivate_usuario",
        move |id: String| {
            let api = api.clone();
            async move {
                validate_uuid("usuario_id", &id)?;
                api.delete(&format!("/api/v1/admin/usuarios/{}", id)).await
            }
        },
        vec![keys::admin_usuarios()],
    )
}

pub fn activate_usuario(api: &ApiClient) -> MutationDescriptor<String, Value> {
    let api = api.clone();
    MutationDescriptor::new(
        "activate_usuario",
        move |id: String| {
            let api = api.clone();
            async move {
                validate_uuid("usuario_id", &id)?;
                api.patch(
                    &format!("/api/v1/admin/usuarios/{}/activate", id),
                    Some(&json!({})),
                )
                .await
            }
        },
        vec![keys::admin_usuarios()],
    )
}

/// Creates a store and its first user in one call.
pub fn onboarding(api: &ApiClient) -> MutationDescriptor<OnboardingData, OnboardingResponse> {
    let api = api.clone();
    MutationDescriptor::new(
        "onboarding",
        move |data: OnboardingData| {
            let api = api.clone();
            async move {
                validate_email(&data.email)?;
                api.post("/api/v1/admin/onboarding", &data).await
            }
        },
        vec![keys::admin_tiendas(), keys::admin_usuarios()],
    )
}

/// Edits the signed-in user's own store. The user query embeds the store,
/// so that is what goes stale.
pub fn update_mi_tienda(api: &ApiClient) -> MutationDescriptor<TiendaUpdate, Tienda> {
    let api = api.clone();
    MutationDescriptor::new(
        "update_mi_tienda",
        move |update: TiendaUpdate| {
            let api = api.clone();
            async move { api.patch("/api/v1/tiendas/me", Some(&update)).await }
        },
        vec![keys::user()],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{QueryCache, QueryOptions};
    use crate::credentials::MemoryCredentialStore;
    use crate::dispatcher::MutationDispatcher;
    use crate::executor::RequestExecutor;
    use nexus_core::{ItemVenta, MetodoPago, QueryKey};
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PRODUCTO_ID: &str = "3f2b8c1e-9d4a-4f6b-8e2a-1c5d7e9f0a1b";

    fn api(server: &MockServer) -> ApiClient {
        let executor = RequestExecutor::new(&server.uri(), Duration::from_secs(5)).unwrap();
        ApiClient::new(executor, Arc::new(MemoryCredentialStore::with_token("t")))
    }

    fn fresh_cache() -> QueryCache {
        let cache = QueryCache::with_defaults(QueryOptions::new(
            Duration::from_secs(60),
            Duration::from_secs(300),
        ));
        cache.set(&keys::ventas(), json!([]));
        cache.set(&keys::dashboard_resumen(), json!({"ventas_hoy": {"total": 0}}));
        cache.set(&keys::productos(), json!([]));
        cache.set(&keys::user(), json!({"id": "u1"}));
        cache
    }

    fn sale(cantidad: i64) -> CheckoutRequest {
        CheckoutRequest {
            items: vec![ItemVenta {
                producto_id: PRODUCTO_ID.to_string(),
                cantidad,
                precio_unitario: None,
            }],
            metodo_pago: MetodoPago::Efectivo,
        }
    }

    #[tokio::test]
    async fn test_checkout_posts_and_invalidates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/ventas/checkout"))
            .and(body_json(json!({
                "items": [{"producto_id": PRODUCTO_ID, "cantidad": 2}],
                "metodo_pago": "EFECTIVO"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "v1",
                "total": 3000.0,
                "metodo_pago": "EFECTIVO"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cache = fresh_cache();
        let dispatcher = MutationDispatcher::new(cache.clone());
        let venta = dispatcher.dispatch(&checkout(&api(&server)), sale(2)).await.unwrap();

        assert_eq!(venta.id, "v1");
        assert!(cache.get(&keys::ventas()).unwrap().is_stale());
        assert!(cache.get(&keys::dashboard_resumen()).unwrap().is_stale());
        assert!(cache.get(&keys::productos()).unwrap().is_stale());
        assert!(!cache.get(&keys::user()).unwrap().is_stale());
    }

    #[tokio::test]
    async fn test_invalid_checkout_never_reaches_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let cache = fresh_cache();
        let dispatcher = MutationDispatcher::new(cache.clone());
        let descriptor = checkout(&api(&server));

        let err = dispatcher.dispatch(&descriptor, sale(1000)).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));

        let empty = CheckoutRequest {
            items: vec![],
            metodo_pago: MetodoPago::Tarjeta,
        };
        let err = dispatcher.dispatch(&descriptor, empty).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));

        assert!(!cache.get(&keys::ventas()).unwrap().is_stale());
    }

    #[tokio::test]
    async fn test_rejected_checkout_keeps_cache() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/ventas/checkout"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"detail": "Stock insuficiente"})),
            )
            .mount(&server)
            .await;

        let cache = fresh_cache();
        let dispatcher = MutationDispatcher::new(cache.clone());
        let err = dispatcher
            .dispatch(&checkout(&api(&server)), sale(2))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            SyncError::Api {
                status: 400,
                message: "Stock insuficiente".into()
            }
        );
        assert!(!cache.get(&keys::productos()).unwrap().is_stale());
    }

    #[tokio::test]
    async fn test_activate_sends_empty_object() {
        let server = MockServer::start().await;
        let id = "0b9c7d3e-1111-4a2b-9c3d-5e6f7a8b9c0d";
        Mock::given(method("PATCH"))
            .and(path(format!("/api/v1/admin/usuarios/{}/activate", id)))
            .and(body_json(json!({})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let value = activate_usuario(&api(&server))
            .execute(id.to_string())
            .await
            .unwrap();
        assert_eq!(value, json!({"ok": true}));
    }

    #[test]
    fn test_invalidation_sets() {
        let offline = ApiClient::new(
            RequestExecutor::new("http://localhost:8000", Duration::from_secs(5)).unwrap(),
            Arc::new(MemoryCredentialStore::new()),
        );

        assert_eq!(checkout(&offline).invalidates().len(), 4);
        assert_eq!(
            onboarding(&offline).invalidates(),
            &[
                QueryKey::from(["admin", "tiendas"]),
                QueryKey::from(["admin", "usuarios"])
            ]
        );
        assert_eq!(update_mi_tienda(&offline).invalidates(), &[QueryKey::from(["user"])]);
        assert_eq!(
            delete_producto(&offline).invalidates(),
            &[QueryKey::from(["productos"]), QueryKey::from(["dashboard"])]
        );
    }
}
