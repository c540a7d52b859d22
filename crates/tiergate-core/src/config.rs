//! Tier configuration records loaded once at startup

use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tiergate_store::TierPolicy;

/// Backend kind of a configured tier
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TierMode {
    /// Directory on the local filesystem
    #[default]
    Disk,
    /// Backblaze B2 bucket
    B2,
    /// Amazon S3 bucket
    S3,
    /// Volatile in-process storage
    Memory,
}

impl TierMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disk => "disk",
            Self::B2 => "b2",
            Self::S3 => "s3",
            Self::Memory => "memory",
        }
    }
}

impl FromStr for TierMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "local" | "disk" => Ok(Self::Disk),
            "backblaze" | "b2" => Ok(Self::B2),
            "aws" | "s3" => Ok(Self::S3),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(CoreError::Configuration(format!(
                "unknown storage backend: {}",
                other
            ))),
        }
    }
}

impl TryFrom<String> for TierMode {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TierMode> for String {
    fn from(mode: TierMode) -> Self {
        mode.as_str().to_string()
    }
}

impl fmt::Display for TierMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured backend, in file order
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    /// Backend kind
    #[serde(default, alias = "backend")]
    pub mode: TierMode,
    /// Root path (disk) or bucket name (b2, s3)
    #[serde(rename = "ref", alias = "name")]
    pub reference: String,
    /// Remote credential identifier
    #[serde(default, alias = "apiId", skip_serializing_if = "Option::is_none")]
    pub api_id: Option<String>,
    /// Remote credential secret
    #[serde(default, alias = "apiKey", skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Stores may be routed here
    #[serde(default)]
    pub upload: bool,
    /// Fast/local copy rather than authoritative
    #[serde(default)]
    pub cache: bool,
    /// S3 endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// S3 region override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl TierConfig {
    /// Create a config with no credentials and a read-only policy
    pub fn new(mode: TierMode, reference: impl Into<String>) -> Self {
        Self {
            mode,
            reference: reference.into(),
            ..Default::default()
        }
    }

    /// Set the writable flag
    pub fn upload(mut self, upload: bool) -> Self {
        self.upload = upload;
        self
    }

    /// Set the cache-role flag
    pub fn cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Attach explicit credentials
    pub fn with_credentials(
        mut self,
        api_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        self.api_id = Some(api_id.into());
        self.api_key = Some(api_key.into());
        self
    }

    /// Routing policy derived from this entry
    pub fn policy(&self) -> TierPolicy {
        TierPolicy::new(self.upload, self.cache)
    }
}

impl fmt::Debug for TierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TierConfig")
            .field("mode", &self.mode)
            .field("reference", &self.reference)
            .field("api_id", &self.api_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("upload", &self.upload)
            .field("cache", &self.cache)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .finish()
    }
}

/// Decode a JSON array of tier entries
pub fn parse_tier_configs(json: &str) -> Result<Vec<TierConfig>> {
    let configs: Vec<TierConfig> = serde_json::from_str(json)?;
    for (idx, config) in configs.iter().enumerate() {
        if config.reference.trim().is_empty() {
            return Err(CoreError::Configuration(format!(
                "tier #{} ({}) has an empty ref",
                idx, config.mode
            )));
        }
    }
    Ok(configs)
}

/// Read and decode a tier configuration file
pub fn load_tier_configs(path: impl AsRef<Path>) -> Result<Vec<TierConfig>> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|e| {
        CoreError::Configuration(format!(
            "unable to open tier config {}: {}",
            path.display(),
            e
        ))
    })?;
    parse_tier_configs(&json)
}
