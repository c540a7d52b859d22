//! Server startup and lifecycle

use crate::{routes, AppState, GatewayConfig};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Run the gateway server until Ctrl-C
pub async fn run_server(config: GatewayConfig) -> anyhow::Result<()> {
    run_server_with_shutdown(config, shutdown_signal()).await
}

/// Run server with graceful shutdown
pub async fn run_server_with_shutdown(
    config: GatewayConfig,
    shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(config.clone()).await?);
    let registry = state.gateway.registry();
    let tiers = registry.len();
    let upload_tier = registry
        .descriptors()
        .into_iter()
        .find(|d| d.policy.writable)
        .map(|d| d.name);
    let app = routes::create_router(state.clone());

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;

    info!(
        tiers,
        cascade = %config.cascade,
        upload_tier = upload_tier.as_deref().unwrap_or("none"),
        "Tiergate listening on http://{}",
        listener.local_addr()?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Gateway shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test(tokio::test)]
    async fn test_server_starts_and_shuts_down() {
        let dir = tempfile::tempdir().unwrap();
        let buckets_path = dir.path().join("tiers.json");
        std::fs::write(
            &buckets_path,
            r#"[{"mode": "memory", "ref": "scratch", "upload": true}]"#,
        )
        .unwrap();

        let config = GatewayConfig {
            port: 0,
            buckets_path,
            ..Default::default()
        };
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tx.send(()).unwrap();

        run_server_with_shutdown(config, async move {
            let _ = rx.await;
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_server_fails_on_missing_tier_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = GatewayConfig {
            port: 0,
            buckets_path: dir.path().join("absent.json"),
            ..Default::default()
        };

        let result = run_server_with_shutdown(config, async {}).await;
        assert!(result.is_err());
    }
}
