//! # Sync Error Types
//!
//! Error types for requests, cache reads and mutations.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Request      │  │  Configuration  │  │     Local               │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Timeout        │  │  InvalidConfig  │  │  Validation             │ │
//! │  │  Network        │  │  InvalidUrl     │  │  Unauthenticated        │ │
//! │  │  Api            │  │  ConfigLoad...  │  │  Internal               │ │
//! │  │  Decode         │  │  ConfigSave...  │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `SyncError` is `Clone` because a cache entry keeps the last error next to
//! the last good data, and every caller sharing an in-flight fetch gets its
//! own copy of the outcome.

use nexus_core::{CoreError, ValidationError};
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Every failure the data layer can surface to a view.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    // =========================================================================
    // Request Errors
    // =========================================================================
    /// The request did not complete within the executor's timeout.
    #[error("Request timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    /// Transport failure other than a timeout (DNS, refused, reset...).
    #[error("Network error: {0}")]
    Network(String),

    /// The API answered with a non-2xx status.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// A success response body was not the expected JSON.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid API URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Local Errors
    // =========================================================================
    /// Input rejected before any request was sent.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The operation needs a signed-in user.
    #[error("Not signed in")]
    Unauthenticated,

    /// Internal error (task join failure, body encoding...).
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Decode(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // The executor rewrites this with its own configured timeout
            SyncError::Timeout { after_ms: 0 }
        } else if err.is_decode() {
            SyncError::Decode(err.to_string())
        } else {
            SyncError::Network(err.to_string())
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

impl From<ValidationError> for SyncError {
    fn from(err: ValidationError) -> Self {
        SyncError::Validation(err.to_string())
    }
}

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(inner) => SyncError::Validation(inner.to_string()),
            other => SyncError::Validation(other.to_string()),
        }
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if a caller could reasonably retry the same request.
    ///
    /// The executor itself never retries; this is for callers that do.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Timeout { .. } | SyncError::Network(_) => true,
            SyncError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    /// Returns true when the API rejected the credentials (401/403).
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, SyncError::Unauthenticated)
            || matches!(self, SyncError::Api { status, .. } if *status == 401 || *status == 403)
    }

    /// Short name of the error kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Timeout { .. } => "timeout",
            SyncError::Network(_) => "network",
            SyncError::Api { .. } => "api",
            SyncError::Decode(_) => "decode",
            SyncError::InvalidConfig(_)
            | SyncError::InvalidUrl(_)
            | SyncError::ConfigLoadFailed(_)
            | SyncError::ConfigSaveFailed(_) => "config",
            SyncError::Validation(_) => "validation",
            SyncError::Unauthenticated => "unauthenticated",
            SyncError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::Timeout { after_ms: 5000 }.is_retryable());
        assert!(SyncError::Network("connection refused".into()).is_retryable());
        assert!(SyncError::Api {
            status: 503,
            message: "Service Unavailable".into()
        }
        .is_retryable());

        assert!(!SyncError::Api {
            status: 404,
            message: "Producto no encontrado".into()
        }
        .is_retryable());
        assert!(!SyncError::Decode("expected value".into()).is_retryable());
        assert!(!SyncError::Validation("cantidad must be positive".into()).is_retryable());
    }

    #[test]
    fn test_unauthorized() {
        assert!(SyncError::Api {
            status: 401,
            message: "Not authenticated".into()
        }
        .is_unauthorized());
        assert!(SyncError::Unauthenticated.is_unauthorized());
        assert!(!SyncError::Timeout { after_ms: 1 }.is_unauthorized());
    }

    #[test]
    fn test_api_error_displays_message_only() {
        let err = SyncError::Api {
            status: 400,
            message: "Stock insuficiente".into(),
        };
        assert_eq!(err.to_string(), "Stock insuficiente");
        assert_eq!(err.kind(), "api");
    }

    #[test]
    fn test_core_error_conversion() {
        let err: SyncError = CoreError::EmptyCheckout.into();
        assert!(matches!(err, SyncError::Validation(_)));

        let err: SyncError = CoreError::Validation(ValidationError::MustBePositive {
            field: "cantidad".into(),
        })
        .into();
        assert_eq!(err, SyncError::Validation("cantidad must be positive".into()));
    }

    #[test]
    fn test_config_errors() {
        assert!(SyncError::InvalidUrl("ftp://x".into()).is_config_error());
        assert!(!SyncError::Network("x".into()).is_config_error());
    }
}
