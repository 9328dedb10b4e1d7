//! # Sync Configuration
//!
//! Configuration for the client data layer.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     NEXUS_API_URL=https://pos.example.com                              │
//! │     NEXUS_API_TIMEOUT_MS=5000                                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/pos/sync.toml (Linux)                                    │
//! │     ~/Library/Application Support/com.nexus.pos/sync.toml (macOS)      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     localhost API, 5 s timeout, 5 min retention                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [api]
//! base_url = "http://localhost:8000"
//! timeout_ms = 5000
//!
//! [cache]
//! stale_ms = 0
//! retain_ms = 300000
//! sweep_interval_secs = 60
//! refetch_on_invalidate = true
//!
//! [scanner]
//! min_length = 3
//! idle_timeout_ms = 100
//!
//! [auth]
//! token_file = "/var/lib/nexus/token"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use nexus_core::ScannerConfig;

use crate::cache::QueryOptions;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// API Settings
// =============================================================================

/// Where and how requests are sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL of the POS API. Endpoint paths are appended to it.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Hard wall-clock timeout for one request (milliseconds).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ApiSettings {
    /// Request timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// =============================================================================
// Cache Settings
// =============================================================================

/// Defaults for cache entries written without explicit options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Default staleness window (milliseconds). Zero means stale at once.
    #[serde(default)]
    pub stale_ms: u64,

    /// Default retention window (milliseconds).
    #[serde(default = "default_retain_ms")]
    pub retain_ms: u64,

    /// Interval between eviction sweeps (seconds).
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Refetch invalidated keys that still have subscribers.
    #[serde(default = "default_true")]
    pub refetch_on_invalidate: bool,
}

fn default_retain_ms() -> u64 {
    300_000
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            stale_ms: 0,
            retain_ms: default_retain_ms(),
            sweep_interval_secs: default_sweep_interval(),
            refetch_on_invalidate: true,
        }
    }
}

impl CacheSettings {
    /// Options applied to entries created by a direct `set`.
    pub fn default_options(&self) -> QueryOptions {
        QueryOptions::new(
            Duration::from_millis(self.stale_ms),
            Duration::from_millis(self.retain_ms),
        )
    }

    /// Sweep period as a `Duration`.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

// =============================================================================
// Scanner Settings
// =============================================================================

/// Barcode decoder tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerSettings {
    /// Minimum code length for Enter to commit.
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    /// Maximum gap between two characters of one scan (milliseconds).
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

fn default_min_length() -> usize {
    nexus_core::scanner::DEFAULT_MIN_LENGTH
}

fn default_idle_timeout_ms() -> u64 {
    nexus_core::scanner::DEFAULT_IDLE_TIMEOUT.as_millis() as u64
}

impl Default for ScannerSettings {
    fn default() -> Self {
        ScannerSettings {
            min_length: default_min_length(),
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

impl From<&ScannerSettings> for ScannerConfig {
    fn from(settings: &ScannerSettings) -> Self {
        ScannerConfig {
            min_length: settings.min_length,
            idle_timeout: Duration::from_millis(settings.idle_timeout_ms),
        }
    }
}

// =============================================================================
// Auth Settings
// =============================================================================

/// Credential storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSettings {
    /// File holding the access token. Defaults to the platform data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_file: Option<PathBuf>,
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete data layer configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub scanner: ScannerSettings,

    #[serde(default)]
    pub auth: AuthSettings,
}

impl SyncConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        let url = url::Url::parse(&self.api.base_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SyncError::InvalidUrl(format!(
                "API URL must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.api.timeout_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "timeout_ms must be greater than 0".into(),
            ));
        }

        if self.scanner.min_length == 0 {
            return Err(SyncError::InvalidConfig(
                "scanner min_length must be greater than 0".into(),
            ));
        }

        if self.cache.retain_ms < self.cache.stale_ms {
            return Err(SyncError::InvalidConfig(format!(
                "retain_ms ({}) must not be shorter than stale_ms ({})",
                self.cache.retain_ms, self.cache.stale_ms
            )));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("NEXUS_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.api.base_url = url;
        }

        if let Some(timeout) = lookup("NEXUS_API_TIMEOUT_MS") {
            match timeout.parse::<u64>() {
                Ok(ms) => self.api.timeout_ms = ms,
                Err(_) => warn!(value = %timeout, "Ignoring invalid NEXUS_API_TIMEOUT_MS"),
            }
        }

        if let Some(retain) = lookup("NEXUS_CACHE_RETAIN_MS") {
            match retain.parse::<u64>() {
                Ok(ms) => self.cache.retain_ms = ms,
                Err(_) => warn!(value = %retain, "Ignoring invalid NEXUS_CACHE_RETAIN_MS"),
            }
        }

        if let Some(min) = lookup("NEXUS_SCANNER_MIN_LENGTH") {
            match min.parse::<usize>() {
                Ok(n) => self.scanner.min_length = n,
                Err(_) => warn!(value = %min, "Ignoring invalid NEXUS_SCANNER_MIN_LENGTH"),
            }
        }

        if let Some(timeout) = lookup("NEXUS_SCANNER_TIMEOUT_MS") {
            match timeout.parse::<u64>() {
                Ok(ms) => self.scanner.idle_timeout_ms = ms,
                Err(_) => warn!(value = %timeout, "Ignoring invalid NEXUS_SCANNER_TIMEOUT_MS"),
            }
        }

        if let Some(path) = lookup("NEXUS_TOKEN_FILE") {
            self.auth.token_file = Some(PathBuf::from(path));
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "nexus", "pos")
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Token file to use: configured path, else the platform data dir.
    pub fn token_path(&self) -> Option<PathBuf> {
        self.auth
            .token_file
            .clone()
            .or_else(|| Self::project_dirs().map(|dirs| dirs.data_dir().join("token")))
    }

    /// Decoder tuning derived from `[scanner]`.
    pub fn scanner_config(&self) -> ScannerConfig {
        ScannerConfig::from(&self.scanner)
    }

    /// Request timeout.
    pub fn request_timeout(&self) -> Duration {
        self.api.timeout()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.api.timeout_ms, 5000);
        assert_eq!(config.cache.retain_ms, 300_000);
        assert!(config.cache.refetch_on_invalidate);
        assert_eq!(config.scanner_config(), ScannerConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::default();

        config.api.base_url = "ws://localhost:8000".into();
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        config.api.base_url = "not a url".into();
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        config.api.base_url = "https://pos.example.com".into();
        assert!(config.validate().is_ok());

        config.api.timeout_ms = 0;
        assert!(config.validate().is_err());
        config.api.timeout_ms = 5000;

        config.scanner.min_length = 0;
        assert!(config.validate().is_err());
        config.scanner.min_length = 3;

        config.cache.stale_ms = 60_000;
        config.cache.retain_ms = 30_000;
        assert!(matches!(config.validate(), Err(SyncError::InvalidConfig(_))));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("NEXUS_API_URL", "https://pos.example.com"),
            ("NEXUS_API_TIMEOUT_MS", "2500"),
            ("NEXUS_SCANNER_MIN_LENGTH", "not-a-number"),
            ("NEXUS_TOKEN_FILE", "/tmp/nexus-token"),
        ]
        .into_iter()
        .collect();

        let mut config = SyncConfig::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.api.base_url, "https://pos.example.com");
        assert_eq!(config.api.timeout_ms, 2500);
        assert_eq!(config.scanner.min_length, 3);
        assert_eq!(config.token_path(), Some(PathBuf::from("/tmp/nexus-token")));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: SyncConfig = toml::from_str(
            r#"
            [api]
            base_url = "https://pos.example.com"

            [scanner]
            min_length = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.api.timeout_ms, 5000);
        assert_eq!(config.scanner.min_length, 8);
        assert_eq!(config.scanner.idle_timeout_ms, 100);
        assert_eq!(config.cache.sweep_interval_secs, 60);
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("nexus-config-{}", uuid::Uuid::new_v4()));
        let path = dir.join("sync.toml");

        let mut config = SyncConfig::default();
        config.cache.stale_ms = 1000;
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[api]"));
        assert!(contents.contains("[cache]"));

        let loaded: SyncConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.cache.stale_ms, 1000);

        std::fs::remove_dir_all(dir).ok();
    }
}
