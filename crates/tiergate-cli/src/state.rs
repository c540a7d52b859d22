//! Application state

use crate::config::GatewayConfig;
use std::sync::Arc;
use tiergate_core::{load_tier_configs, Gateway, TierRegistry};
use tracing::{info, warn};

/// Application state shared across handlers
pub struct AppState {
    /// Gateway configuration
    pub config: GatewayConfig,
    /// Cascade router over the tier registry
    pub gateway: Gateway,
}

impl AppState {
    /// Load the tier list and construct every tier
    pub async fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        info!(path = %config.buckets_path.display(), "Loading tier configuration");
        let configs = load_tier_configs(&config.buckets_path)?;
        let registry = TierRegistry::from_configs_with_process_env(&configs).await?;

        if !registry.iter().any(|t| t.policy().writable) {
            warn!("No tier is writable; stores will be accepted and discarded");
        }

        Ok(Self::with_registry(config, registry))
    }

    /// Use an already built registry
    pub fn with_registry(config: GatewayConfig, registry: TierRegistry) -> Self {
        info!(
            tiers = registry.len(),
            cascade = %config.cascade,
            "Tier registry ready"
        );
        let gateway = Gateway::new(Arc::new(registry), config.cascade);
        Self { config, gateway }
    }
}
