//! Gateway configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tiergate_core::CascadeSemantics;

/// File name of the tier list looked up in the home directory
pub const DEFAULT_BUCKETS_FILE: &str = ".tiergate.json";

/// Gateway server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Path of the JSON tier list
    pub buckets_path: PathBuf,
    /// How exists and delete combine tier answers
    pub cascade: CascadeSemantics,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
    /// Enable CORS
    pub cors_enabled: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8081,
            buckets_path: default_buckets_path(),
            cascade: CascadeSemantics::default(),
            max_body_size: 5 * 1024 * 1024 * 1024, // 5 GiB
            cors_enabled: true,
        }
    }
}

impl GatewayConfig {
    /// Get the bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// `~/.tiergate.json`, or the bare file name when no home directory is known
pub fn default_buckets_path() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(DEFAULT_BUCKETS_FILE)
}
