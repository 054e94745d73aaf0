//! Upchunk server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use upchunk_core::config::AppConfig;
use upchunk_server::{AppState, create_router};
use upchunk_storage::ChunkStore;

/// Upchunk - resumable chunked upload server
#[derive(Parser, Debug)]
#[command(name = "upchunkd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "UPCHUNK_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Upchunk server v{}", env!("CARGO_PKG_VERSION"));

    // Config file is optional; env vars and built-in defaults can provide everything.
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    if config_path.exists() {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("UPCHUNK_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    let storage = upchunk_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;

    // Verify storage connectivity before accepting requests so configuration
    // errors surface at startup instead of on the first upload.
    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!("Storage backend initialized");

    let registry = upchunk_registry::from_config(&config.registry)
        .await
        .context("failed to initialize registry")?;
    registry
        .health_check()
        .await
        .context("registry health check failed")?;
    tracing::info!("Upload registry initialized");

    let state = AppState::new(config.clone(), ChunkStore::new(storage), registry);
    let app = create_router(state);

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
