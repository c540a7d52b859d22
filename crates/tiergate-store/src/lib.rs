//! # Tiergate Store
//!
//! Storage tiers for the Tiergate gateway.
//!
//! This crate provides:
//! - **StorageTier trait**: Uniform fetch, store, exists, delete and list
//! - **Disk tier**: A directory subtree on the local filesystem
//! - **B2 tier**: A Backblaze B2 bucket over the native HTTP API
//! - **S3 tier**: An Amazon S3 (or S3-compatible) bucket
//! - **Memory tier**: Volatile storage for development and tests
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               Tiered Gateway                │
//! ├─────────────────────────────────────────────┤
//! │             StorageTier Trait               │
//! ├──────────┬──────────┬──────────┬────────────┤
//! │ DiskTier │  B2Tier  │  S3Tier  │ MemoryTier │
//! ├──────────┴──────────┴──────────┴────────────┤
//! │      Filesystem / B2 API / S3 API           │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use tiergate_store::{DiskTier, StorageTier, TierKey, TierPolicy};
//!
//! let tier = DiskTier::new("/var/lib/tiergate", TierPolicy::writable()).await?;
//! let key = TierKey::parse("docs/readme.txt")?;
//! tier.store(&key, bytes::Bytes::from_static(b"hello")).await?;
//! let body = tier.fetch(&key).await?;
//! ```

pub mod b2;
pub mod disk;
pub mod error;
pub mod key;
pub mod memory;
pub mod s3;

pub use b2::{B2Config, B2Tier};
pub use disk::DiskTier;
pub use error::{Result, TierError};
pub use key::TierKey;
pub use memory::MemoryTier;
pub use s3::{S3Config, S3Tier};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};

/// Streamed object body handed back by `fetch`.
///
/// Dropping the stream releases the underlying file or connection.
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Static routing policy attached to a tier
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPolicy {
    /// The gateway may route stores to this tier
    pub writable: bool,
    /// Fast/local copy rather than authoritative storage
    pub cache_role: bool,
}

impl TierPolicy {
    pub fn new(writable: bool, cache_role: bool) -> Self {
        Self {
            writable,
            cache_role,
        }
    }

    /// Writable, authoritative
    pub fn writable() -> Self {
        Self::new(true, false)
    }

    /// Read-only, authoritative
    pub fn read_only() -> Self {
        Self::new(false, false)
    }
}

/// Trait for storage tier backends
#[async_trait]
pub trait StorageTier: Send + Sync {
    /// Human-readable descriptor, e.g. `disk:/var/lib/tiergate`
    fn name(&self) -> &str;

    /// Static policy for this tier
    fn policy(&self) -> TierPolicy;

    /// Open a readable stream for a key
    async fn fetch(&self, key: &TierKey) -> Result<ByteStream>;

    /// Write the full payload under a key, overwriting silently
    async fn store(&self, key: &TierKey, data: Bytes) -> Result<()>;

    /// Check if a key is present
    async fn exists(&self, key: &TierKey) -> Result<bool>;

    /// Remove a key and everything nested beneath it
    async fn delete(&self, key: &TierKey) -> Result<()>;

    /// Whether `list` is implemented
    fn supports_listing(&self) -> bool {
        true
    }

    /// Enumerate keys starting with `prefix`; an empty prefix lists everything
    async fn list(&self, _prefix: &str) -> Result<Vec<String>> {
        Err(TierError::Unsupported("list"))
    }
}

/// Drain a fetched stream into memory
pub async fn collect_bytes(stream: ByteStream) -> Result<Bytes> {
    let chunks: Vec<Bytes> = stream.try_collect().await?;
    Ok(chunks.concat().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_constructors() {
        assert!(TierPolicy::writable().writable);
        assert!(!TierPolicy::read_only().writable);
        assert_eq!(TierPolicy::default(), TierPolicy::new(false, false));
    }

    #[tokio::test]
    async fn test_collect_bytes_joins_chunks() {
        let chunks: Vec<std::io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"hello ")),
            Ok(Bytes::from_static(b"world")),
        ];
        let stream: ByteStream = Box::pin(futures::stream::iter(chunks));
        let body = collect_bytes(stream).await.unwrap();
        assert_eq!(body.as_ref(), b"hello world");
    }
}
