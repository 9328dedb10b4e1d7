//! # Error Types
//!
//! Domain-specific error types for nexus-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  nexus-core errors (this file)                                         │
//! │  ├── CoreError        - Checkout / domain rule violations              │
//! │  └── ValidationError  - Single-field input failures                    │
//! │                                                                         │
//! │  nexus-sync errors (separate crate)                                    │
//! │  └── SyncError        - Timeout, Network, Api, Decode, Config          │
//! │                                                                         │
//! │  Flow: ValidationError → SyncError::Validation → view error toast      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Domain rule violations detected before any request is sent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// A checkout was attempted with no line items.
    #[error("Checkout requires at least one item")]
    EmptyCheckout,

    /// Too many line items in a single checkout.
    #[error("Checkout cannot have more than {max} items")]
    CheckoutTooLarge { max: usize },

    /// Unknown payment method string.
    #[error("Unknown payment method: {0}")]
    UnknownPaymentMethod(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;
