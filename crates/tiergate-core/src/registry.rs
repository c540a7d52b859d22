//! Ordered, immutable set of storage tiers

use crate::config::{TierConfig, TierMode};
use crate::{CoreError, Result};
use std::sync::Arc;
use tiergate_store::{
    s3::DEFAULT_REGION, B2Config, B2Tier, DiskTier, MemoryTier, S3Config, S3Tier, StorageTier,
    TierError, TierPolicy,
};
use tracing::info;

/// Snapshot of one tier for startup logs and diagnostics
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TierDescriptor {
    pub index: usize,
    pub name: String,
    pub policy: TierPolicy,
}

/// The ordered tier list consulted by every cascade.
///
/// Built once at startup and never mutated. Cloning shares the same tiers.
#[derive(Clone)]
pub struct TierRegistry {
    tiers: Arc<[Arc<dyn StorageTier>]>,
}

impl TierRegistry {
    /// Wrap already constructed tiers, in cascade order
    pub fn from_tiers(tiers: Vec<Arc<dyn StorageTier>>) -> Result<Self> {
        if tiers.is_empty() {
            return Err(CoreError::Configuration(
                "at least one storage tier must be configured".to_string(),
            ));
        }
        Ok(Self {
            tiers: tiers.into(),
        })
    }

    /// Construct every configured tier in file order.
    ///
    /// `env` resolves credentials that the configuration leaves out, normally
    /// `|name| std::env::var(name).ok()`.
    pub async fn from_configs<F>(configs: &[TierConfig], env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut tiers: Vec<Arc<dyn StorageTier>> = Vec::with_capacity(configs.len());
        for config in configs {
            let tier = build_tier(config, &env).await?;
            info!(
                tier = tier.name(),
                writable = tier.policy().writable,
                cache = tier.policy().cache_role,
                "Storage tier ready"
            );
            tiers.push(tier);
        }
        Self::from_tiers(tiers)
    }

    /// Build from the process environment
    pub async fn from_configs_with_process_env(configs: &[TierConfig]) -> Result<Self> {
        Self::from_configs(configs, |name| std::env::var(name).ok()).await
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn StorageTier>> {
        self.tiers.iter()
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    /// Always false for a constructed registry
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Position of the tier whose answer decides a cascade
    pub fn last_index(&self) -> usize {
        self.tiers.len() - 1
    }

    pub fn descriptors(&self) -> Vec<TierDescriptor> {
        self.tiers
            .iter()
            .enumerate()
            .map(|(index, tier)| TierDescriptor {
                index,
                name: tier.name().to_string(),
                policy: tier.policy(),
            })
            .collect()
    }
}

impl std::fmt::Debug for TierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.tiers.iter().map(|t| t.name()))
            .finish()
    }
}

fn credential<F>(explicit: &Option<String>, env: &F, var: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    explicit
        .clone()
        .filter(|v| !v.is_empty())
        .or_else(|| env(var).filter(|v| !v.is_empty()))
}

fn missing_credentials(config: &TierConfig, vars: &str) -> CoreError {
    CoreError::Configuration(format!(
        "{} tier {} has no credentials; set api_id/api_key or {}",
        config.mode, config.reference, vars
    ))
}

async fn build_tier<F>(config: &TierConfig, env: &F) -> Result<Arc<dyn StorageTier>>
where
    F: Fn(&str) -> Option<String>,
{
    let policy = config.policy();
    let reference = config.reference.as_str();
    let wrap = |source: TierError| CoreError::Tier {
        tier: format!("{}:{}", config.mode, reference),
        source,
    };

    let tier: Arc<dyn StorageTier> = match config.mode {
        TierMode::Disk => Arc::new(DiskTier::new(reference, policy).await.map_err(wrap)?),
        TierMode::Memory => Arc::new(MemoryTier::new(reference, policy)),
        TierMode::B2 => {
            let key_id = credential(&config.api_id, env, "B2_ACCOUNT_ID");
            let app_key = credential(&config.api_key, env, "B2_ACCOUNT_KEY");
            let (Some(key_id), Some(app_key)) = (key_id, app_key) else {
                return Err(missing_credentials(config, "B2_ACCOUNT_ID/B2_ACCOUNT_KEY"));
            };
            let mut b2 = B2Config::new(key_id, app_key, reference);
            if let Some(endpoint) = &config.endpoint {
                b2 = b2.with_api_url(endpoint.clone());
            }
            Arc::new(B2Tier::new(b2, policy).await.map_err(wrap)?)
        }
        TierMode::S3 => {
            let access = credential(&config.api_id, env, "AWS_ACCESS_KEY_ID");
            let secret = credential(&config.api_key, env, "AWS_SECRET_ACCESS_KEY");
            let (Some(access), Some(secret)) = (access, secret) else {
                return Err(missing_credentials(
                    config,
                    "AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY",
                ));
            };
            let region = config
                .region
                .clone()
                .or_else(|| env("AWS_REGION"))
                .or_else(|| env("AWS_DEFAULT_REGION"))
                .unwrap_or_else(|| DEFAULT_REGION.to_string());
            let mut s3 = S3Config::new(reference, access, secret).with_region(region);
            if let Some(endpoint) = &config.endpoint {
                s3 = s3.with_endpoint(endpoint.clone());
            }
            Arc::new(S3Tier::new(s3, policy).map_err(wrap)?)
        }
    };
    Ok(tier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_tier_configs;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[tokio::test]
    async fn test_empty_registry_rejected() {
        assert!(matches!(
            TierRegistry::from_tiers(Vec::new()),
            Err(CoreError::Configuration(_))
        ));
        assert!(TierRegistry::from_configs(&[], no_env).await.is_err());
    }

    #[tokio::test]
    async fn test_builds_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("cache");
        let configs = vec![
            TierConfig::new(TierMode::Disk, root.to_string_lossy()).cache(true),
            TierConfig::new(TierMode::Memory, "scratch").upload(true),
        ];

        let registry = TierRegistry::from_configs(&configs, no_env).await.unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.last_index(), 1);
        assert!(root.is_dir());

        let descriptors = registry.descriptors();
        assert!(descriptors[0].name.starts_with("disk:"));
        assert_eq!(descriptors[0].policy, TierPolicy::new(false, true));
        assert_eq!(descriptors[1].name, "memory:scratch");
        assert!(descriptors[1].policy.writable);
    }

    #[tokio::test]
    async fn test_b2_without_credentials_is_configuration_error() {
        let configs = parse_tier_configs(r#"[{"mode": "b2", "ref": "photos"}]"#).unwrap();
        let err = TierRegistry::from_configs(&configs, no_env).await.unwrap_err();
        assert!(matches!(err, CoreError::Configuration(msg) if msg.contains("B2_ACCOUNT_ID")));
    }

    #[tokio::test]
    async fn test_s3_without_credentials_is_configuration_error() {
        let configs = parse_tier_configs(r#"[{"mode": "s3", "ref": "archive"}]"#).unwrap();
        let err = TierRegistry::from_configs(&configs, no_env).await.unwrap_err();
        assert!(matches!(err, CoreError::Configuration(msg) if msg.contains("AWS_ACCESS_KEY_ID")));
    }

    #[tokio::test]
    async fn test_s3_credentials_from_env() {
        let env: HashMap<&str, &str> = [
            ("AWS_ACCESS_KEY_ID", "AKIA"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("AWS_REGION", "eu-central-1"),
        ]
        .into_iter()
        .collect();
        let configs = parse_tier_configs(
            r#"[{"mode": "s3", "ref": "archive", "endpoint": "http://localhost:9000"}]"#,
        )
        .unwrap();

        let registry = TierRegistry::from_configs(&configs, |name| {
            env.get(name).map(|v| v.to_string())
        })
        .await
        .unwrap();
        assert_eq!(registry.descriptors()[0].name, "s3:archive");
    }

    #[test]
    fn test_explicit_credentials_win() {
        let explicit = Some("from-config".to_string());
        let env = |_: &str| Some("from-env".to_string());
        assert_eq!(credential(&explicit, &env, "X").as_deref(), Some("from-config"));
        assert_eq!(credential(&None, &env, "X").as_deref(), Some("from-env"));
        assert_eq!(credential(&Some(String::new()), &no_env, "X"), None);
    }

    #[tokio::test]
    async fn test_identical_config_builds_identical_registry() {
        let dir = tempfile::tempdir().unwrap();
        let json = format!(
            r#"[{{"mode": "disk", "ref": "{}", "upload": true}}, {{"mode": "memory", "ref": "m"}}]"#,
            dir.path().join("d").display()
        );
        let configs = parse_tier_configs(&json).unwrap();

        let first = TierRegistry::from_configs(&configs, no_env).await.unwrap();
        let second = TierRegistry::from_configs(&configs, no_env).await.unwrap();
        assert_eq!(first.descriptors(), second.descriptors());
    }
}
