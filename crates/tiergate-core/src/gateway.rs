//! The cascade protocol: per-verb routing across the tier registry

use crate::error::CascadeError;
use crate::registry::TierRegistry;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tiergate_store::{ByteStream, TierError, TierKey};
use tracing::{debug, warn};

/// Result type for gateway operations
pub type CascadeResult<T> = std::result::Result<T, CascadeError>;

/// Operations the gateway routes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
    Fetch,
    Store,
    Exists,
    Delete,
    List,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Fetch => "fetch",
            Verb::Store => "store",
            Verb::Exists => "exists",
            Verb::Delete => "delete",
            Verb::List => "list",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How `exists` and `delete` combine per-tier answers.
///
/// `Literal` lets the last tier decide and aborts on the first failure.
/// `Corrected` treats `exists` as an OR over tiers and attempts `delete`
/// everywhere, reporting every failure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CascadeSemantics {
    #[default]
    Literal,
    Corrected,
}

impl FromStr for CascadeSemantics {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "literal" => Ok(Self::Literal),
            "corrected" => Ok(Self::Corrected),
            other => Err(format!(
                "unknown cascade semantics '{}', expected literal or corrected",
                other
            )),
        }
    }
}

impl fmt::Display for CascadeSemantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal => f.write_str("literal"),
            Self::Corrected => f.write_str("corrected"),
        }
    }
}

/// A successful fetch
pub struct Fetched {
    /// Descriptor of the tier that served the body
    pub tier: String,
    pub body: ByteStream,
}

impl fmt::Debug for Fetched {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetched")
            .field("tier", &self.tier)
            .finish_non_exhaustive()
    }
}

/// Outcome of a store
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreOutcome {
    /// The first writable tier accepted the payload
    Stored { tier: String },
    /// No tier is writable; nothing was written
    NoWritableTier,
}

/// Routes each verb across the registry
#[derive(Clone)]
pub struct Gateway {
    registry: Arc<TierRegistry>,
    semantics: CascadeSemantics,
}

impl Gateway {
    pub fn new(registry: Arc<TierRegistry>, semantics: CascadeSemantics) -> Self {
        Self {
            registry,
            semantics,
        }
    }

    pub fn registry(&self) -> &TierRegistry {
        &self.registry
    }

    pub fn semantics(&self) -> CascadeSemantics {
        self.semantics
    }

    /// First tier that can open the key serves it
    pub async fn fetch(&self, key: &TierKey) -> CascadeResult<Fetched> {
        let last = self.registry.last_index();
        let mut last_error = None;

        for (idx, tier) in self.registry.iter().enumerate() {
            match tier.fetch(key).await {
                Ok(body) => {
                    debug!(verb = %Verb::Fetch, key = %key, tier = tier.name(), "Hit");
                    return Ok(Fetched {
                        tier: tier.name().to_string(),
                        body,
                    });
                }
                Err(e) if e.is_not_found() => {
                    debug!(verb = %Verb::Fetch, key = %key, tier = tier.name(), "Miss");
                    if idx == last {
                        last_error = Some((tier.name().to_string(), e));
                    }
                }
                Err(e) => {
                    warn!(
                        verb = %Verb::Fetch,
                        key = %key,
                        tier = tier.name(),
                        error = %e,
                        "Tier failed, trying next tier"
                    );
                    if idx == last {
                        last_error = Some((tier.name().to_string(), e));
                    }
                }
            }
        }

        Err(match last_error {
            Some((tier, source)) => CascadeError::from_tier(&tier, key.as_str(), source),
            None => CascadeError::NotFound {
                key: key.to_string(),
            },
        })
    }

    /// Write to the first writable tier only
    pub async fn store(&self, key: &TierKey, data: Bytes) -> CascadeResult<StoreOutcome> {
        let Some(tier) = self.registry.iter().find(|t| t.policy().writable) else {
            warn!(verb = %Verb::Store, key = %key, "No writable tier configured, store ignored");
            return Ok(StoreOutcome::NoWritableTier);
        };

        tier.store(key, data)
            .await
            .map_err(|source| CascadeError::Tier {
                tier: tier.name().to_string(),
                source,
            })?;
        debug!(verb = %Verb::Store, key = %key, tier = tier.name(), "Stored");
        Ok(StoreOutcome::Stored {
            tier: tier.name().to_string(),
        })
    }

    pub async fn exists(&self, key: &TierKey) -> CascadeResult<bool> {
        match self.semantics {
            CascadeSemantics::Literal => self.exists_literal(key).await,
            CascadeSemantics::Corrected => self.exists_corrected(key).await,
        }
    }

    pub async fn delete(&self, key: &TierKey) -> CascadeResult<()> {
        match self.semantics {
            CascadeSemantics::Literal => self.delete_literal(key).await,
            CascadeSemantics::Corrected => self.delete_corrected(key).await,
        }
    }

    /// Union of keys across every listing-capable tier
    pub async fn list(&self, prefix: &str) -> CascadeResult<Vec<String>> {
        let last = self.registry.last_index();
        let mut keys = BTreeSet::new();

        for (idx, tier) in self.registry.iter().enumerate() {
            if !tier.supports_listing() {
                debug!(verb = %Verb::List, tier = tier.name(), "Tier cannot list, skipped");
                continue;
            }
            match tier.list(prefix).await {
                Ok(found) => keys.extend(found),
                Err(source) if idx == last && keys.is_empty() => {
                    return Err(CascadeError::Tier {
                        tier: tier.name().to_string(),
                        source,
                    });
                }
                Err(e) => {
                    warn!(
                        verb = %Verb::List,
                        prefix,
                        tier = tier.name(),
                        error = %e,
                        "Tier failed, skipping it"
                    );
                }
            }
        }

        Ok(keys.into_iter().collect())
    }

    async fn exists_literal(&self, key: &TierKey) -> CascadeResult<bool> {
        let mut present = false;
        for tier in self.registry.iter() {
            present = tier
                .exists(key)
                .await
                .map_err(|source| CascadeError::Tier {
                    tier: tier.name().to_string(),
                    source,
                })?;
        }
        Ok(present)
    }

    async fn exists_corrected(&self, key: &TierKey) -> CascadeResult<bool> {
        let last = self.registry.last_index();
        for (idx, tier) in self.registry.iter().enumerate() {
            match tier.exists(key).await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(source) if idx == last => {
                    return Err(CascadeError::Tier {
                        tier: tier.name().to_string(),
                        source,
                    });
                }
                Err(e) => {
                    warn!(
                        verb = %Verb::Exists,
                        key = %key,
                        tier = tier.name(),
                        error = %e,
                        "Tier failed, trying next tier"
                    );
                }
            }
        }
        Ok(false)
    }

    async fn delete_literal(&self, key: &TierKey) -> CascadeResult<()> {
        let last = self.registry.last_index();
        for (idx, tier) in self.registry.iter().enumerate() {
            if let Err(source) = tier.delete(key).await {
                // A miss at the last tier is a failure like any other
                if idx == last {
                    return Err(CascadeError::Tier {
                        tier: tier.name().to_string(),
                        source,
                    });
                }
                warn!(
                    verb = %Verb::Delete,
                    key = %key,
                    tier = tier.name(),
                    error = %source,
                    "Delete stopped early, later tiers untouched"
                );
                return Ok(());
            }
        }
        Ok(())
    }

    async fn delete_corrected(&self, key: &TierKey) -> CascadeResult<()> {
        let mut failures: Vec<(String, TierError)> = Vec::new();
        for tier in self.registry.iter() {
            match tier.delete(key).await {
                Ok(()) => debug!(verb = %Verb::Delete, key = %key, tier = tier.name(), "Deleted"),
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(
                        verb = %Verb::Delete,
                        key = %key,
                        tier = tier.name(),
                        error = %e,
                        "Delete failed"
                    );
                    failures.push((tier.name().to_string(), e));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CascadeError::Incomplete { failures })
        }
    }
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("registry", &self.registry)
            .field("semantics", &self.semantics)
            .finish()
    }
}
