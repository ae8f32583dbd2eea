//! Shared application state

use crate::config::ServerConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tracing::{info, warn};
use tumora_classifier::TumorDetector;

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<ServerConfig>,

    /// Provider, preprocessing and prediction for uploaded scans
    pub detector: TumorDetector,

    /// Prometheus metrics handle for rendering
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    /// Build state with the production model provider
    pub fn new(config: ServerConfig, metrics_handle: PrometheusHandle) -> anyhow::Result<Self> {
        let detector = TumorDetector::from_config(config.model.clone())?;
        Ok(Self::with_detector(config, detector, metrics_handle))
    }

    /// Build state around an existing detector
    pub fn with_detector(
        config: ServerConfig,
        detector: TumorDetector,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        Self {
            config: Arc::new(config),
            detector,
            metrics_handle,
        }
    }

    /// Load the model in the background so the first upload does not wait
    pub fn spawn_preload(&self) -> tokio::task::JoinHandle<()> {
        let provider = Arc::clone(self.detector.provider());
        tokio::spawn(async move {
            info!("Preloading model '{}'", provider.config().name);
            if !provider.ensure_model().await.is_ready() {
                warn!("Model preload failed; predictions will report the model as unavailable");
            }
        })
    }
}
