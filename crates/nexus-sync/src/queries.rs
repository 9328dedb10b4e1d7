//! # Query Catalog
//!
//! The reads the POS front end performs, as cache keys plus the request
//! that fills them.
//!
//! ```text
//! ┌──────────────────────────┬──────────────────────────────────────┬────────┬───────┐
//! │ Key                      │ Request                              │ stale  │ poll  │
//! ├──────────────────────────┼──────────────────────────────────────┼────────┼───────┤
//! │ ["productos"]            │ GET /api/v1/productos                │ 30 s   │   -   │
//! │ ["productos","scan",c]   │ GET /api/v1/ventas/scan/{c}          │ 30 s   │   -   │
//! │ ["ventas"]               │ GET /api/v1/ventas                   │ 30 s   │   -   │
//! │ ["dashboard","resumen"]  │ GET /api/v1/dashboard/resumen        │ 30 s   │ 60 s  │
//! │ ["dashboard","tiempo-…"] │ GET /api/v1/dashboard/ventas-tiempo… │ 10 s   │ 15 s  │
//! │ ["insights"]             │ GET /api/v1/insights                 │ 60 s   │ 60 s  │
//! │ ["user"]                 │ GET /api/v1/auth/me                  │ 5 min  │   -   │
//! │ ["admin","tiendas"]      │ GET /api/v1/admin/tiendas            │ 60 s   │   -   │
//! │ ["admin","usuarios"]     │ GET /api/v1/admin/usuarios           │ 60 s   │   -   │
//! └──────────────────────────┴──────────────────────────────────────┴────────┴───────┘
//! ```

use nexus_core::validation::validate_barcode;
use nexus_core::QueryKey;
use std::time::Duration;

use crate::api::ApiRequest;
use crate::cache::QueryOptions;
use crate::error::SyncResult;

const DEFAULT_STALE: Duration = Duration::from_secs(30);
const DEFAULT_RETAIN: Duration = Duration::from_secs(300);

/// A cacheable read: where it lives in the cache and how to fetch it.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub key: QueryKey,
    pub request: ApiRequest,
    pub options: QueryOptions,
    /// Background refresh interval, if any.
    pub poll: Option<Duration>,
    /// When set, the query is disabled while no token is stored.
    pub requires_auth: bool,
}

impl Query {
    /// A GET-style query with the catalog's default windows.
    pub fn new(key: QueryKey, request: ApiRequest) -> Self {
        Query {
            key,
            request,
            options: QueryOptions::new(DEFAULT_STALE, DEFAULT_RETAIN),
            poll: None,
            requires_auth: false,
        }
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_stale(mut self, stale: Duration) -> Self {
        self.options = QueryOptions::new(stale, self.options.retain());
        self
    }

    pub fn polling(mut self, interval: Duration) -> Self {
        self.poll = Some(interval);
        self
    }

    pub fn requiring_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }
}

// =============================================================================
// Keys
// =============================================================================

/// Cache keys and invalidation prefixes.
pub mod keys {
    use nexus_core::{query_key, QueryKey};

    pub fn productos() -> QueryKey {
        QueryKey::from(["productos"])
    }

    pub fn producto_scan(code: &str) -> QueryKey {
        query_key!["productos", "scan", code]
    }

    pub fn ventas() -> QueryKey {
        QueryKey::from(["ventas"])
    }

    /// Prefix of every dashboard view.
    pub fn dashboard() -> QueryKey {
        QueryKey::from(["dashboard"])
    }

    pub fn dashboard_resumen() -> QueryKey {
        QueryKey::from(["dashboard", "resumen"])
    }

    pub fn ventas_tiempo_real() -> QueryKey {
        QueryKey::from(["dashboard", "tiempo-real"])
    }

    pub fn insights() -> QueryKey {
        QueryKey::from(["insights"])
    }

    pub fn user() -> QueryKey {
        QueryKey::from(["user"])
    }

    pub fn admin_tiendas() -> QueryKey {
        QueryKey::from(["admin", "tiendas"])
    }

    pub fn admin_usuarios() -> QueryKey {
        QueryKey::from(["admin", "usuarios"])
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Product list for the inventory screen.
pub fn productos() -> Query {
    Query::new(keys::productos(), ApiRequest::get("/api/v1/productos"))
}

/// Lookup of one scanned code. Rejects malformed codes before any request.
pub fn producto_scan(code: &str) -> SyncResult<Query> {
    validate_barcode(code)?;
    Ok(Query::new(
        keys::producto_scan(code),
        ApiRequest::get(format!("/api/v1/ventas/scan/{}", code)),
    ))
}

/// Sales history.
pub fn ventas() -> Query {
    Query::new(keys::ventas(), ApiRequest::get("/api/v1/ventas"))
}

/// Daily summary shown on the dashboard, refreshed every minute.
pub fn dashboard_resumen() -> Query {
    Query::new(
        keys::dashboard_resumen(),
        ApiRequest::get("/api/v1/dashboard/resumen"),
    )
    .polling(Duration::from_secs(60))
}

/// Sales ticker.
pub fn ventas_tiempo_real() -> Query {
    Query::new(
        keys::ventas_tiempo_real(),
        ApiRequest::get("/api/v1/dashboard/ventas-tiempo-real"),
    )
    .with_stale(Duration::from_secs(10))
    .polling(Duration::from_secs(15))
}

/// Alerts feed.
pub fn insights() -> Query {
    Query::new(keys::insights(), ApiRequest::get("/api/v1/insights"))
        .with_stale(Duration::from_secs(60))
        .polling(Duration::from_secs(60))
}

/// The logged-in user. Disabled without a token.
pub fn current_user() -> Query {
    Query::new(keys::user(), ApiRequest::get("/api/v1/auth/me"))
        .with_options(QueryOptions::new(
            Duration::from_secs(5 * 60),
            Duration::from_secs(10 * 60),
        ))
        .requiring_auth()
}

pub fn admin_tiendas() -> Query {
    Query::new(keys::admin_tiendas(), ApiRequest::get("/api/v1/admin/tiendas"))
        .with_stale(Duration::from_secs(60))
}

pub fn admin_usuarios() -> Query {
    Query::new(keys::admin_usuarios(), ApiRequest::get("/api/v1/admin/usuarios"))
        .with_stale(Duration::from_secs(60))
}
