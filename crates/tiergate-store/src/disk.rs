//! Local filesystem tier

use crate::{ByteStream, Result, StorageTier, TierError, TierKey, TierPolicy};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::instrument;

/// Read size for streamed fetches
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Marker embedded in in-flight temporary file names
const TEMP_MARKER: &str = ".tiergate-tmp-";

/// A tier rooted at a directory on the local filesystem
#[derive(Clone, Debug)]
pub struct DiskTier {
    name: String,
    root: PathBuf,
    policy: TierPolicy,
}

impl DiskTier {
    /// Create a disk tier, creating the root directory if absent
    pub async fn new(root: impl Into<PathBuf>, policy: TierPolicy) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            name: format!("disk:{}", root.display()),
            root,
            policy,
        })
    }

    /// Root directory of this tier
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &TierKey) -> PathBuf {
        key.segments().fold(self.root.clone(), |path, segment| path.join(segment))
    }

    fn temp_path_for(path: &Path) -> PathBuf {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!(
            "{}{}{}",
            file_name,
            TEMP_MARKER,
            uuid::Uuid::new_v4().simple()
        ))
    }
}

fn not_found_or(err: std::io::Error, key: &TierKey) -> TierError {
    if err.kind() == ErrorKind::NotFound {
        TierError::NotFound(key.to_string())
    } else {
        TierError::Io(err)
    }
}

fn file_stream(file: File) -> ByteStream {
    futures::stream::try_unfold(file, |mut file| async move {
        let mut buf = BytesMut::with_capacity(READ_CHUNK_SIZE);
        let read = file.read_buf(&mut buf).await?;
        let next = if read == 0 {
            None
        } else {
            Some((buf.freeze(), file))
        };
        Ok::<_, std::io::Error>(next)
    })
    .boxed()
}

#[async_trait]
impl StorageTier for DiskTier {
    fn name(&self) -> &str {
        &self.name
    }

    fn policy(&self) -> TierPolicy {
        self.policy
    }

    #[instrument(skip(self), fields(tier = %self.name))]
    async fn fetch(&self, key: &TierKey) -> Result<ByteStream> {
        let path = self.path_for(key);
        let metadata = fs::metadata(&path).await.map_err(|e| not_found_or(e, key))?;
        if !metadata.is_file() {
            return Err(TierError::NotFound(key.to_string()));
        }
        let file = File::open(&path).await.map_err(|e| not_found_or(e, key))?;
        Ok(file_stream(file))
    }

    #[instrument(skip(self, data), fields(tier = %self.name, size = data.len()))]
    async fn store(&self, key: &TierKey, data: Bytes) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write beside the target and rename so readers never see a partial file
        let temp = Self::temp_path_for(&path);
        let written = async {
            let mut file = File::create(&temp).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            fs::rename(&temp, &path).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&temp).await;
            return Err(TierError::Io(e));
        }
        Ok(())
    }

    async fn exists(&self, key: &TierKey) -> Result<bool> {
        match fs::metadata(self.path_for(key)).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(TierError::Io(e)),
        }
    }

    #[instrument(skip(self), fields(tier = %self.name))]
    async fn delete(&self, key: &TierKey) -> Result<()> {
        let path = self.path_for(key);
        let metadata = fs::metadata(&path).await.map_err(|e| not_found_or(e, key))?;
        if metadata.is_dir() {
            fs::remove_dir_all(&path).await?;
        } else {
            fs::remove_file(&path).await?;
        }
        Ok(())
    }

    #[instrument(skip(self), fields(tier = %self.name))]
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let root = self.root.clone();
        let prefix = prefix.trim_start_matches('/').to_string();

        tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
            let mut keys = Vec::new();
            for entry in walkdir::WalkDir::new(&root).min_depth(1) {
                let entry = entry.map_err(|e| {
                    TierError::Io(std::io::Error::other(e.to_string()))
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                if entry.file_name().to_string_lossy().contains(TEMP_MARKER) {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(&root) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(&prefix) {
                    keys.push(key);
                }
            }
            keys.sort();
            Ok(keys)
        })
        .await
        .map_err(|e| TierError::Io(std::io::Error::other(e.to_string())))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect_bytes;

    async fn tier() -> (tempfile::TempDir, DiskTier) {
        let dir = tempfile::tempdir().unwrap();
        let tier = DiskTier::new(dir.path().join("root"), TierPolicy::writable())
            .await
            .unwrap();
        (dir, tier)
    }

    fn key(raw: &str) -> TierKey {
        TierKey::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_disk_store_fetch_roundtrip() {
        let (_dir, tier) = tier().await;

        tier.store(&key("test"), Bytes::from_static(b"ABC123")).await.unwrap();
        assert!(tier.exists(&key("test")).await.unwrap());

        let body = collect_bytes(tier.fetch(&key("test")).await.unwrap()).await.unwrap();
        assert_eq!(body.as_ref(), b"ABC123");

        tier.delete(&key("test")).await.unwrap();
        assert!(!tier.exists(&key("test")).await.unwrap());
    }

    #[tokio::test]
    async fn test_disk_creates_root_and_parents() {
        let (_dir, tier) = tier().await;
        assert!(tier.root().is_dir());

        tier.store(&key("a/b/c.txt"), Bytes::from_static(b"nested"))
            .await
            .unwrap();
        assert!(tier.root().join("a").join("b").join("c.txt").is_file());
    }

    #[tokio::test]
    async fn test_disk_overwrite() {
        let (_dir, tier) = tier().await;
        tier.store(&key("k"), Bytes::from_static(b"one")).await.unwrap();
        tier.store(&key("k"), Bytes::from_static(b"two")).await.unwrap();

        let body = collect_bytes(tier.fetch(&key("k")).await.unwrap()).await.unwrap();
        assert_eq!(body.as_ref(), b"two");
    }

    #[tokio::test]
    async fn test_disk_fetch_large_file_streams_in_chunks() {
        let (_dir, tier) = tier().await;
        let data: Vec<u8> = (0..(READ_CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        tier.store(&key("big.bin"), Bytes::from(data.clone())).await.unwrap();

        let chunks: Vec<Bytes> = futures::TryStreamExt::try_collect(
            tier.fetch(&key("big.bin")).await.unwrap(),
        )
        .await
        .unwrap();
        assert!(chunks.len() > 1);
        assert_eq!(chunks.concat(), data);
    }

    #[tokio::test]
    async fn test_disk_missing_key() {
        let (_dir, tier) = tier().await;
        assert!(matches!(tier.fetch(&key("nope")).await, Err(TierError::NotFound(_))));
        assert!(matches!(tier.delete(&key("nope")).await, Err(TierError::NotFound(_))));
        assert!(!tier.exists(&key("nope")).await.unwrap());
    }

    #[tokio::test]
    async fn test_disk_fetch_directory_is_not_found() {
        let (_dir, tier) = tier().await;
        tier.store(&key("dir/file"), Bytes::from_static(b"x")).await.unwrap();
        assert!(matches!(tier.fetch(&key("dir")).await, Err(TierError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_disk_delete_directory_removes_children() {
        let (_dir, tier) = tier().await;
        tier.store(&key("dir/one"), Bytes::from_static(b"1")).await.unwrap();
        tier.store(&key("dir/sub/two"), Bytes::from_static(b"2")).await.unwrap();

        tier.delete(&key("dir")).await.unwrap();
        assert!(!tier.exists(&key("dir/one")).await.unwrap());
        assert!(!tier.exists(&key("dir/sub/two")).await.unwrap());
    }

    #[tokio::test]
    async fn test_disk_list_by_prefix() {
        let (_dir, tier) = tier().await;
        for k in ["docs/a.txt", "docs/b.txt", "img/c.png"] {
            tier.store(&key(k), Bytes::from_static(b"x")).await.unwrap();
        }

        assert_eq!(tier.list("").await.unwrap(), vec!["docs/a.txt", "docs/b.txt", "img/c.png"]);
        assert_eq!(tier.list("docs/").await.unwrap(), vec!["docs/a.txt", "docs/b.txt"]);
        assert_eq!(tier.list("img/c").await.unwrap(), vec!["img/c.png"]);
        assert!(tier.list("zzz").await.unwrap().is_empty());
    }
}
