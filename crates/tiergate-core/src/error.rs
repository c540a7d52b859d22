//! Error types for the tiergate-core crate

use thiserror::Error;
use tiergate_store::TierError;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Startup-time errors building the tier registry
#[derive(Error, Debug)]
pub enum CoreError {
    /// Bad or incomplete configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A tier could not be constructed
    #[error("tier {tier}: {source}")]
    Tier {
        tier: String,
        #[source]
        source: TierError,
    },
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Configuration(format!("invalid tier configuration: {}", err))
    }
}

/// The single failure outcome of a cascade
#[derive(Error, Debug)]
pub enum CascadeError {
    /// The deciding tier reported the key absent
    #[error("key not found: {key}")]
    NotFound { key: String },

    /// A backend failure surfaced from one tier
    #[error("tier {tier} failed: {source}")]
    Tier {
        tier: String,
        #[source]
        source: TierError,
    },

    /// Some tiers failed while the rest completed
    #[error("{} tier(s) failed: {}", failures.len(), summarize(failures))]
    Incomplete { failures: Vec<(String, TierError)> },
}

fn summarize(failures: &[(String, TierError)]) -> String {
    failures
        .iter()
        .map(|(tier, err)| format!("{} ({})", tier, err))
        .collect::<Vec<_>>()
        .join("; ")
}

impl CascadeError {
    pub(crate) fn from_tier(tier: &str, key: &str, source: TierError) -> Self {
        if source.is_not_found() {
            CascadeError::NotFound {
                key: key.to_string(),
            }
        } else {
            CascadeError::Tier {
                tier: tier.to_string(),
                source,
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CascadeError::NotFound { .. })
    }
}
