//! Amazon S3 tier backed by `object_store`

use crate::{ByteStream, Result, StorageTier, TierError, TierKey, TierPolicy};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use std::sync::Arc;
use tracing::instrument;

/// Region used when neither configuration nor environment names one
pub const DEFAULT_REGION: &str = "us-east-1";

/// Configuration for an S3 bucket tier
#[derive(Clone)]
pub struct S3Config {
    /// Bucket name
    pub bucket: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// AWS region
    pub region: String,
    /// Custom endpoint for S3-compatible services
    pub endpoint: Option<String>,
}

impl S3Config {
    pub fn new(
        bucket: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// A tier backed by one S3 bucket
pub struct S3Tier {
    name: String,
    policy: TierPolicy,
    store: Arc<dyn ObjectStore>,
}

impl S3Tier {
    /// Build the S3 client for a bucket
    pub fn new(config: S3Config, policy: TierPolicy) -> Result<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_access_key_id(&config.access_key_id)
            .with_secret_access_key(&config.secret_access_key);

        if let Some(endpoint) = &config.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = builder
            .build()
            .map_err(|e| TierError::Configuration(format!("S3 client: {}", e)))?;

        Ok(Self::with_store(
            format!("s3:{}", config.bucket),
            Arc::new(store),
            policy,
        ))
    }

    /// Wrap an already constructed object store
    pub fn with_store(
        name: impl Into<String>,
        store: Arc<dyn ObjectStore>,
        policy: TierPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            policy,
            store,
        }
    }

    fn object_path(key: &TierKey) -> Result<ObjectPath> {
        ObjectPath::parse(key.as_str()).map_err(|e| TierError::InvalidKey(e.to_string()))
    }

    /// Every object nested beneath `dir`, or everything when `dir` is `None`
    async fn list_under(&self, dir: Option<&ObjectPath>) -> Result<Vec<String>> {
        let keys = self
            .store
            .list(dir)
            .map_ok(|meta| meta.location.to_string())
            .try_collect::<Vec<_>>()
            .await?;
        Ok(keys)
    }
}

#[async_trait]
impl StorageTier for S3Tier {
    fn name(&self) -> &str {
        &self.name
    }

    fn policy(&self) -> TierPolicy {
        self.policy
    }

    #[instrument(skip(self), fields(tier = %self.name))]
    async fn fetch(&self, key: &TierKey) -> Result<ByteStream> {
        let path = Self::object_path(key)?;
        let result = self.store.get(&path).await?;
        Ok(result.into_stream().map_err(std::io::Error::other).boxed())
    }

    #[instrument(skip(self, data), fields(tier = %self.name, size = data.len()))]
    async fn store(&self, key: &TierKey, data: Bytes) -> Result<()> {
        let path = Self::object_path(key)?;
        self.store.put(&path, PutPayload::from(data)).await?;
        Ok(())
    }

    async fn exists(&self, key: &TierKey) -> Result<bool> {
        let path = Self::object_path(key)?;
        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self), fields(tier = %self.name))]
    async fn delete(&self, key: &TierKey) -> Result<()> {
        let path = Self::object_path(key)?;
        let mut targets = self.list_under(Some(&path)).await?;
        if self.exists(key).await? {
            targets.push(key.to_string());
        }

        if targets.is_empty() {
            return Err(TierError::NotFound(key.to_string()));
        }

        for target in targets {
            let target = ObjectPath::parse(&target)
                .map_err(|e| TierError::InvalidKey(e.to_string()))?;
            self.store.delete(&target).await?;
        }
        Ok(())
    }

    #[instrument(skip(self), fields(tier = %self.name))]
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = prefix.trim_start_matches('/');

        // object_store lists by whole path segments; narrow by the directory
        // part, then filter on the full string prefix.
        let dir = match prefix.rfind('/') {
            Some(idx) if idx > 0 => Some(
                ObjectPath::parse(&prefix[..idx])
                    .map_err(|e| TierError::InvalidKey(e.to_string()))?,
            ),
            _ => None,
        };

        let mut keys: Vec<String> = self
            .list_under(dir.as_ref())
            .await?
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect_bytes;
    use object_store::memory::InMemory;

    fn tier() -> S3Tier {
        S3Tier::with_store("s3:test", Arc::new(InMemory::new()), TierPolicy::writable())
    }

    fn key(raw: &str) -> TierKey {
        TierKey::parse(raw).unwrap()
    }

    #[test]
    fn test_config_builders() {
        let config = S3Config::new("bucket", "AKIA", "shh")
            .with_region("eu-west-1")
            .with_endpoint("http://localhost:9000");
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:9000"));
        assert!(!format!("{:?}", config).contains("shh"));
    }

    #[test]
    fn test_new_builds_named_tier() {
        let config = S3Config::new("archive", "AKIA", "shh").with_endpoint("http://localhost:9000");
        let tier = S3Tier::new(config, TierPolicy::read_only()).unwrap();
        assert_eq!(tier.name(), "s3:archive");
        assert!(!tier.policy().writable);
    }

    #[tokio::test]
    async fn test_s3_roundtrip() {
        let tier = tier();
        tier.store(&key("docs/a.txt"), Bytes::from_static(b"hello"))
            .await
            .unwrap();

        assert!(tier.exists(&key("docs/a.txt")).await.unwrap());
        let body = collect_bytes(tier.fetch(&key("docs/a.txt")).await.unwrap())
            .await
            .unwrap();
        assert_eq!(body.as_ref(), b"hello");
    }

    #[tokio::test]
    async fn test_s3_missing_key() {
        let tier = tier();
        assert!(!tier.exists(&key("nope")).await.unwrap());
        assert!(matches!(tier.fetch(&key("nope")).await, Err(TierError::NotFound(_))));
        assert!(matches!(tier.delete(&key("nope")).await, Err(TierError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_s3_delete_removes_children_only() {
        let tier = tier();
        for k in ["dir/a", "dir/b/c", "dirty"] {
            tier.store(&key(k), Bytes::from_static(b"x")).await.unwrap();
        }

        tier.delete(&key("dir")).await.unwrap();
        assert_eq!(tier.list("").await.unwrap(), vec!["dirty"]);
    }

    #[tokio::test]
    async fn test_s3_list_by_string_prefix() {
        let tier = tier();
        for k in ["docs/a.txt", "docs/ab.txt", "docs/b.txt", "img/c.png"] {
            tier.store(&key(k), Bytes::from_static(b"x")).await.unwrap();
        }

        assert_eq!(tier.list("docs/a").await.unwrap(), vec!["docs/a.txt", "docs/ab.txt"]);
        assert_eq!(tier.list("d").await.unwrap().len(), 3);
        assert_eq!(tier.list("").await.unwrap().len(), 4);
    }
}
