//! Backend-agnostic object keys

use crate::{Result, TierError};
use std::fmt;

/// A relative, `/`-separated object key shared by every tier.
///
/// Leading and trailing separators are trimmed on construction. Empty
/// segments, `.`/`..` segments, backslashes and NUL bytes are rejected so a
/// key can never address anything outside a tier's root.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TierKey(String);

impl TierKey {
    /// Validate and normalize a raw key
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Err(TierError::InvalidKey("key is empty".to_string()));
        }
        if trimmed.contains('\0') || trimmed.contains('\\') {
            return Err(TierError::InvalidKey(format!(
                "key contains a forbidden character: {:?}",
                trimmed
            )));
        }
        for segment in trimmed.split('/') {
            match segment {
                "" => {
                    return Err(TierError::InvalidKey(format!(
                        "key contains an empty segment: {}",
                        trimmed
                    )))
                }
                "." | ".." => {
                    return Err(TierError::InvalidKey(format!(
                        "key contains a relative segment: {}",
                        trimmed
                    )))
                }
                _ => {}
            }
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments of the key
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Prefix matching everything nested beneath this key (`key/`)
    pub fn child_prefix(&self) -> String {
        format!("{}/", self.0)
    }
}

impl fmt::Display for TierKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TierKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for TierKey {
    type Error = TierError;

    fn try_from(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}
