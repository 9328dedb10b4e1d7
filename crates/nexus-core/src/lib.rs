//! # nexus-core: Pure Logic for the Nexus POS Client
//!
//! This crate holds the parts of the client data layer that need no I/O:
//! the hierarchical query keys the cache is indexed by, the barcode
//! scanner decoder, the API data transfer types and local validation.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Nexus POS Client                                 │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Views (web front end)                        │   │
//! │  │    Catalog ──► Checkout ──► Dashboard ──► Sales history         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          nexus-sync (executor, cache, poller, mutations)        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ nexus-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │ query_key │  │  scanner  │  │   types   │  │ validation│  │   │
//! │  │   │ QueryKey  │  │ Barcode   │  │ Producto  │  │  checkout │  │   │
//! │  │   │ prefixes  │  │ Decoder   │  │  Venta    │  │  barcode  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • NO CLOCK READS                         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`query_key`] - Hierarchical cache keys with prefix matching
//! - [`scanner`] - Barcode scanner keystroke decoder
//! - [`types`] - Remote API data types (products, sales, dashboard, auth)
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation run before a request is sent
//!
//! ## Example Usage
//!
//! ```rust
//! use nexus_core::QueryKey;
//!
//! let scan = QueryKey::from(["productos", "scan", "7790001"]);
//! let products = QueryKey::from(["productos"]);
//!
//! // Invalidating ["productos"] reaches every key below it.
//! assert!(scan.starts_with(&products));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod query_key;
pub mod scanner;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, ValidationError};
pub use query_key::{KeySegment, QueryKey};
pub use scanner::{BarcodeDecoder, EventTarget, Key, KeyEvent, ScanEvent, ScannerConfig, ScannerState};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items accepted in a single checkout.
pub const MAX_CHECKOUT_ITEMS: usize = 100;

/// Maximum quantity of a single line item.
///
/// Catches a mistyped quantity (1000 instead of 10) before it reaches the API.
pub const MAX_ITEM_QUANTITY: i64 = 999;
