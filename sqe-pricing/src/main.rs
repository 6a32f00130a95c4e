//! sqe-pricing - Quote pricing worker
//!
//! Loads configuration, opens the shared database, wires the inference
//! client into the pricing pipeline and serves the job API until shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sqe_common::config::{default_config_path, load_toml_config, RootFolderInitializer, RootFolderResolver};
use sqe_common::events::EventBus;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sqe_pricing::db::SqliteQuoteRepository;
use sqe_pricing::inference::{DisabledInferenceClient, HttpInferenceClient, InferenceClient};
use sqe_pricing::{AppState, PipelineConfig, PricingPipeline};

const MODULE_NAME: &str = "sqe-pricing";

/// Command-line arguments for sqe-pricing
#[derive(Parser, Debug)]
#[command(name = "sqe-pricing")]
#[command(about = "Quote pricing worker for the service quote estimator")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides TOML)
    #[arg(short, long, env = "SQE_PRICING_PORT")]
    port: Option<u16>,

    /// Root folder holding the database
    #[arg(short, long, env = "SQE_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "SQE_PRICING_CONFIG")]
    config: Option<PathBuf>,

    /// Extraction timeout in seconds (overrides database and TOML)
    #[arg(long, env = "SQE_INFERENCE_TIMEOUT_SECS")]
    inference_timeout_secs: Option<u64>,

    /// Client-side extraction quota per minute (overrides TOML)
    #[arg(long, env = "SQE_INFERENCE_RATE_PER_MINUTE")]
    inference_rate_per_minute: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args
        .config
        .clone()
        .or_else(|| default_config_path(MODULE_NAME));
    let toml_config = match &config_path {
        Some(path) => load_toml_config(path).context("Failed to load configuration")?,
        None => Default::default(),
    };

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting sqe-pricing (Quote Pricing) worker");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Root folder: CLI/ENV → TOML → OS default
    let mut resolver = RootFolderResolver::new(MODULE_NAME).with_cli_arg(args.root_folder.clone());
    if let Some(path) = config_path {
        resolver = resolver.with_config_path(path);
    }
    let initializer = RootFolderInitializer::new(resolver.resolve());
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = sqe_pricing::db::init_database_pool(&db_path)
        .await
        .context("Failed to open database")?;

    let inference_settings = sqe_pricing::config::resolve_inference_settings(
        &db_pool,
        &toml_config,
        args.inference_timeout_secs,
        args.inference_rate_per_minute,
    )
    .await
    .context("Failed to resolve inference settings")?;

    let inference: Arc<dyn InferenceClient> = match &inference_settings.endpoint {
        Some(endpoint) => {
            info!(
                "Inference endpoint: {} (timeout {}s, {} req/min)",
                endpoint,
                inference_settings.timeout.as_secs(),
                inference_settings.requests_per_minute
            );
            Arc::new(
                HttpInferenceClient::new(
                    endpoint.clone(),
                    inference_settings.api_key.clone(),
                    inference_settings.timeout,
                    inference_settings.requests_per_minute,
                )
                .context("Failed to build inference client")?,
            )
        }
        None => {
            warn!("No inference endpoint configured; quotes will be priced from form answers only");
            Arc::new(DisabledInferenceClient)
        }
    };

    let event_bus = EventBus::new(100);
    let pipeline = PricingPipeline::new(
        PipelineConfig {
            extraction_timeout: inference_settings.timeout,
        },
        Arc::new(SqliteQuoteRepository::new(db_pool)),
        inference,
        event_bus,
    );

    let app = sqe_pricing::build_router(AppState::new(Arc::new(pipeline)));

    let port = args.port.unwrap_or(toml_config.worker.port);
    let bind_ip: std::net::IpAddr = toml_config
        .worker
        .bind_address
        .parse()
        .with_context(|| format!("Invalid bind address '{}'", toml_config.worker.bind_address))?;
    let addr = SocketAddr::new(bind_ip, port);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
