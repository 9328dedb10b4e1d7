//! # nexus-sync: Client-Side Data Sync for Nexus POS
//!
//! Keeps the POS views' copy of server data fresh and consistent with the
//! writes the cashier makes, and turns scanner keystrokes into barcodes.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Client Data Layer                                │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 QueryClient (per-session object)                 │  │
//! │  │                                                                  │  │
//! │  │  read_query / watch_query / prefetch / mutate / invalidate       │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │   QueryCache   │  │     Poller     │  │  MutationDispatcher    │    │
//! │  │                │  │                │  │                        │    │
//! │  │ stale / retain │  │ one ticker per │  │ write, then invalidate │    │
//! │  │ dedup, subs    │  │ key, shortest  │  │ every dependent prefix │    │
//! │  │ sweep          │  │ interval wins  │  │ (only on success)      │    │
//! │  └───────┬────────┘  └────────────────┘  └────────────────────────┘    │
//! │          │ fetchers                                                     │
//! │          ▼                                                              │
//! │  ┌────────────────┐  ┌────────────────┐                                │
//! │  │   ApiClient    │──│ RequestExecutor│──► HTTPS / JSON, bearer token  │
//! │  │ + credentials  │  │ 5 s timeout    │                                │
//! │  └────────────────┘  └────────────────┘                                │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │ ScanListener: key events ──► BarcodeDecoder ──► ScanEvent stream │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! ### Transport
//! - [`executor`] - One HTTP call with auth, timeout and error normalization
//! - [`api`] - Executor plus credential store, typed helpers
//! - [`credentials`] - Token storage (memory or file)
//!
//! ### Caching
//! - [`cache`] - Keyed store with freshness, dedup and subscriptions
//! - [`poller`] - Interval refresh of watched keys
//! - [`dispatcher`] - Mutations and their invalidation sets
//! - [`client`] - `QueryClient`, the facade over all of the above
//!
//! ### POS Catalog
//! - [`queries`] - Reads the POS performs
//! - [`mutations`] - Writes the POS performs
//! - [`session`] - Login / logout
//! - [`scanner`] - Async driver for the barcode decoder
//!
//! ### Support
//! - [`config`] - TOML configuration with env overrides
//! - [`error`] - `SyncError`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nexus_sync::{queries, QueryClient, Session, SyncConfig};
//!
//! let config = SyncConfig::load_or_default(None);
//! let client = QueryClient::from_config(&config)?;
//! let session = Session::new(client.clone());
//!
//! session.login(&credentials).await?;
//! let resumen: DashboardResumen = client.read_query(&queries::dashboard_resumen()).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod mutations;
pub mod poller;
pub mod queries;
pub mod scanner;
pub mod session;

// =============================================================================
// Re-exports
// =============================================================================

pub use api::{ApiClient, ApiRequest};
pub use cache::{CacheEntry, QueryCache, QueryOptions, QueryStatus, Subscription};
pub use client::{QueryClient, QueryObserver, SweeperHandle};
pub use config::SyncConfig;
pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use dispatcher::{MutationDescriptor, MutationDispatcher};
pub use error::{SyncError, SyncResult};
pub use executor::{Method, RequestExecutor};
pub use poller::{PollRegistration, Poller};
pub use queries::Query;
pub use scanner::{ScanListener, ScanSubscription, ScannerHandle};
pub use session::Session;
