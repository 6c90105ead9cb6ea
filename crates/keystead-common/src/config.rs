//! Configuration types for Keystead
//!
//! All sections deserialize with defaults so a partial TOML file (or none
//! at all) yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Key manager configuration
    pub om: OmConfig,
    /// Security and block token configuration
    pub security: SecurityConfig,
    /// Local block allocator configuration
    pub scm: ScmConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Block tokens are issued only when security and block tokens are both on
    #[must_use]
    pub const fn block_tokens_enabled(&self) -> bool {
        self.security.enabled && self.security.block_token_enabled
    }
}

/// Key manager configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OmConfig {
    /// Identity passed to the block-location service as the allocation owner
    pub service_id: String,
    /// Path of the metadata database
    pub db_path: PathBuf,
    /// Block size requested by allocate-block, and the chunk size used when
    /// open-key carries no size hint (default: 256 MB)
    pub block_size: i64,
    /// Fall back to the open-key table when a key is not committed
    pub lookup_open_keys: bool,
}

impl Default for OmConfig {
    fn default() -> Self {
        Self {
            service_id: "om1".to_string(),
            db_path: PathBuf::from("/var/lib/keystead/om.redb"),
            block_size: 256 * 1024 * 1024,
            lookup_open_keys: true,
        }
    }
}

/// Security configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Master security switch
    pub enabled: bool,
    /// Issue block tokens on allocation
    pub block_token_enabled: bool,
    /// Block token lifetime in milliseconds (default: 1 day)
    pub block_token_expiry_ms: i64,
    /// File holding the hex-encoded 32-byte signing key seed
    pub signing_key_path: Option<PathBuf>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            block_token_enabled: false,
            block_token_expiry_ms: 24 * 60 * 60 * 1000,
            signing_key_path: None,
        }
    }
}

/// Local block allocator configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScmConfig {
    /// Start the allocator with chill mode engaged
    pub chill_mode: bool,
    /// Container id handed out by the local allocator
    pub container_id: i64,
}

impl Default for ScmConfig {
    fn default() -> Self {
        Self {
            chill_mode: false,
            container_id: 1,
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
