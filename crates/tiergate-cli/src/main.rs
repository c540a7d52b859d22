//! Tiergate - tiered storage HTTP gateway

use clap::Parser;
use std::path::PathBuf;
use tiergate_cli::{config::default_buckets_path, run_server, GatewayConfig};
use tiergate_core::CascadeSemantics;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "tiergate")]
#[command(about = "HTTP gateway over an ordered list of storage tiers")]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1", env = "TIERGATE_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8081", env = "TIERGATE_PORT")]
    port: u16,

    /// JSON tier list [default: ~/.tiergate.json]
    #[arg(short, long, visible_alias = "config", env = "TIERGATE_BUCKETS")]
    buckets: Option<PathBuf>,

    /// How exists and delete combine tier answers (literal or corrected)
    #[arg(long, default_value = "literal", env = "TIERGATE_CASCADE")]
    cascade: CascadeSemantics,

    /// Maximum request body size in bytes
    #[arg(long, default_value_t = 5 * 1024 * 1024 * 1024, env = "TIERGATE_MAX_BODY_SIZE")]
    max_body_size: usize,

    /// Disable CORS headers
    #[arg(long)]
    no_cors: bool,

    /// Enable debug logging
    #[arg(short, long, env = "TIERGATE_DEBUG")]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!(
                "tiergate_cli={0},tiergate_core={0},tiergate_store={0},tower_http=debug",
                log_level
            )
            .into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Tiergate on {}:{}", args.host, args.port);

    let config = GatewayConfig {
        host: args.host,
        port: args.port,
        buckets_path: args.buckets.unwrap_or_else(default_buckets_path),
        cascade: args.cascade,
        max_body_size: args.max_body_size,
        cors_enabled: !args.no_cors,
    };

    run_server(config).await
}
