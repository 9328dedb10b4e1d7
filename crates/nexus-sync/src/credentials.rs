//! # Credential Store
//!
//! Where the bearer token lives between requests.
//!
//! The data layer only needs three operations; how the token is kept is up
//! to the implementation:
//!
//! ```text
//! ┌──────────────┐   get_token()    ┌───────────────────────────┐
//! │  ApiClient   │ ───────────────► │  dyn CredentialStore      │
//! │  Session     │   set_token()    │  ├── MemoryCredentialStore│
//! │              │   clear_token()  │  └── FileCredentialStore  │
//! └──────────────┘                  └───────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};

/// Opaque token storage.
pub trait CredentialStore: Send + Sync {
    /// Current token, if signed in.
    fn get_token(&self) -> Option<String>;

    /// Replaces the stored token.
    fn set_token(&self, token: &str);

    /// Forgets the stored token.
    fn clear_token(&self);
}

// =============================================================================
// In-Memory Store
// =============================================================================

/// Token held in process memory only.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    token: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with a token.
    pub fn with_token(token: impl Into<String>) -> Self {
        MemoryCredentialStore {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get_token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_token(&self, token: &str) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
    }

    fn clear_token(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

// =============================================================================
// File Store
// =============================================================================

/// Token persisted as a single line in a file.
///
/// I/O failures are logged and treated as "no token"; a broken token file
/// must never take the register down.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileCredentialStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn get_token(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                (!token.is_empty()).then(|| token.to_string())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Failed to read token file");
                None
            }
        }
    }

    fn set_token(&self, token: &str) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(path = ?parent, error = %e, "Failed to create token directory");
                return;
            }
        }

        match std::fs::write(&self.path, format!("{}\n", token.trim())) {
            Ok(()) => debug!(path = ?self.path, "Token saved"),
            Err(e) => warn!(path = ?self.path, error = %e, "Failed to write token file"),
        }
    }

    fn clear_token(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = ?self.path, "Token removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = ?self.path, error = %e, "Failed to remove token file"),
        }
    }
}
