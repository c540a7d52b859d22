//! In-memory tier for testing and development

use crate::{ByteStream, Result, StorageTier, TierError, TierKey, TierPolicy};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use futures::StreamExt;
use std::sync::Arc;

/// A volatile tier backed by a concurrent map
#[derive(Clone)]
pub struct MemoryTier {
    name: String,
    policy: TierPolicy,
    objects: Arc<DashMap<String, Bytes>>,
}

impl MemoryTier {
    /// Create a new empty memory tier
    pub fn new(name: impl Into<String>, policy: TierPolicy) -> Self {
        Self {
            name: format!("memory:{}", name.into()),
            policy,
            objects: Arc::new(DashMap::new()),
        }
    }

    /// Get the number of objects stored
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if the tier is empty
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Get total size of all objects
    pub fn total_size(&self) -> u64 {
        self.objects.iter().map(|entry| entry.value().len() as u64).sum()
    }
}

#[async_trait]
impl StorageTier for MemoryTier {
    fn name(&self) -> &str {
        &self.name
    }

    fn policy(&self) -> TierPolicy {
        self.policy
    }

    async fn fetch(&self, key: &TierKey) -> Result<ByteStream> {
        let data = self
            .objects
            .get(key.as_str())
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TierError::NotFound(key.to_string()))?;
        Ok(futures::stream::once(async move { Ok::<_, std::io::Error>(data) }).boxed())
    }

    async fn store(&self, key: &TierKey, data: Bytes) -> Result<()> {
        self.objects.insert(key.to_string(), data);
        Ok(())
    }

    async fn exists(&self, key: &TierKey) -> Result<bool> {
        Ok(self.objects.contains_key(key.as_str()))
    }

    async fn delete(&self, key: &TierKey) -> Result<()> {
        let children = key.child_prefix();
        let before = self.objects.len();
        self.objects
            .retain(|k, _| k != key.as_str() && !k.starts_with(&children));
        if self.objects.len() == before {
            return Err(TierError::NotFound(key.to_string()));
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .objects
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect_bytes;

    fn key(raw: &str) -> TierKey {
        TierKey::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_memory_tier_basic() {
        let tier = MemoryTier::new("test", TierPolicy::writable());

        tier.store(&key("hello.txt"), Bytes::from_static(b"Hello, World!"))
            .await
            .unwrap();
        assert!(tier.exists(&key("hello.txt")).await.unwrap());

        let body = collect_bytes(tier.fetch(&key("hello.txt")).await.unwrap())
            .await
            .unwrap();
        assert_eq!(body.as_ref(), b"Hello, World!");
        assert_eq!(tier.total_size(), 13);
    }

    #[tokio::test]
    async fn test_memory_tier_not_found() {
        let tier = MemoryTier::new("test", TierPolicy::writable());
        assert!(matches!(tier.fetch(&key("nope")).await, Err(TierError::NotFound(_))));
        assert!(matches!(tier.delete(&key("nope")).await, Err(TierError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_memory_tier_delete_grouping() {
        let tier = MemoryTier::new("test", TierPolicy::writable());
        for k in ["dir/a", "dir/b/c", "dirty", "other"] {
            tier.store(&key(k), Bytes::from_static(b"x")).await.unwrap();
        }

        tier.delete(&key("dir")).await.unwrap();
        assert_eq!(tier.list("").await.unwrap(), vec!["dirty", "other"]);
    }

    #[tokio::test]
    async fn test_memory_tier_name_and_policy() {
        let tier = MemoryTier::new("scratch", TierPolicy::new(false, true));
        assert_eq!(tier.name(), "memory:scratch");
        assert!(tier.policy().cache_role);
        assert!(tier.is_empty());
    }
}
