//! Tumora Server
//!
//! Serves brain MRI tumor classification over HTTP. The model artifact is
//! fetched on first use when it is not already on disk.

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::PathBuf;
use tokio::signal;
use tracing::{info, warn};

use tumora_server::{create_router, AppState, Overrides, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "tumora-server")]
#[command(about = "Brain MRI tumor classification service", long_about = None)]
struct Cli {
    /// Configuration file path (optional)
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Listen address
    #[arg(short = 'l', long)]
    listen: Option<String>,

    /// Listen port
    #[arg(short = 'P', long)]
    port: Option<u16>,

    /// Remote model artifact URL
    #[arg(long, env = "TUMORA_MODEL_URL")]
    model_url: Option<String>,

    /// Local model artifact path
    #[arg(long, env = "TUMORA_MODEL_PATH")]
    model_path: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            listen: self.listen.clone(),
            port: self.port,
            model_url: self.model_url.clone(),
            model_path: self.model_path.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    info!("Starting Tumora server");

    let config = ServerConfig::load(&cli.config, &cli.overrides())?;
    info!("Configuration loaded successfully");
    info!("Model: {} at {}", config.model.name, config.model.local_path.display());
    info!("Model source: {:?}", config.model.source);

    let metrics_handle = init_metrics()?;

    let addr = config.bind_addr()?;
    let preload = config.preload_model;
    let state = AppState::new(config, metrics_handle)?;

    if preload {
        state.spawn_preload();
    }

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    let shutdown = async {
        shutdown_signal().await;
        warn!("Shutdown signal received, stopping server...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("tumora=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tumora=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "tumora_predictions_total",
        "Total number of completed predictions by label"
    );
    metrics::describe_counter!("tumora_errors_total", "Total number of failed requests by code");
    metrics::describe_histogram!(
        "tumora_prediction_latency_us",
        metrics::Unit::Microseconds,
        "Forward pass latency in microseconds"
    );
    metrics::describe_counter!(
        "tumora_model_downloads_total",
        "Number of model artifact downloads attempted"
    );
    metrics::describe_counter!(
        "tumora_model_load_failures_total",
        "Number of failed model loads by code"
    );

    info!("Metrics exporter initialized");
    Ok(handle)
}
