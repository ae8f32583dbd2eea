//! Model provider: download-if-absent, deserialize once, hand out the handle
//!
//! The provider is an owned value constructed with its collaborators (a
//! [`ModelFetcher`] and a [`ModelLoader`]) and shared behind an `Arc`. The
//! first `ensure_model` call performs the load; every later call returns a
//! clone of the same [`ModelHandle`].

use crate::classifier::{ImageModel, ModelHandle, ModelStatus};
use crate::fetcher::{partial_path, ModelFetcher, RemoteFetcher};
use crate::model_config::ModelConfig;
use crate::model_loader::{ModelLoader, OnnxLoader};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use tumora_core::{Error, Result};

/// Owns the model configuration and the cached handle
pub struct ModelProvider {
    config: ModelConfig,
    fetcher: Arc<dyn ModelFetcher>,
    loader: Arc<dyn ModelLoader>,
    handle: OnceCell<ModelHandle>,
}

impl ModelProvider {
    /// Create a provider with explicit collaborators.
    ///
    /// The configuration is validated here, so a provider never holds an
    /// out-of-range threshold or scale.
    pub fn new(
        config: ModelConfig,
        fetcher: Arc<dyn ModelFetcher>,
        loader: Arc<dyn ModelLoader>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            fetcher,
            loader,
            handle: OnceCell::new(),
        })
    }

    /// Create a provider wired to the remote fetcher and the ONNX loader
    pub fn from_config(config: ModelConfig) -> Result<Self> {
        Self::new(
            config,
            Arc::new(RemoteFetcher::new()?),
            Arc::new(OnnxLoader),
        )
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Handle from a previous `ensure_model`, without triggering a load
    pub fn cached(&self) -> Option<ModelHandle> {
        self.handle.get().cloned()
    }

    /// Current status for reporting
    pub fn status(&self) -> ModelStatus {
        self.handle
            .get()
            .map(ModelHandle::status)
            .unwrap_or_else(ModelStatus::not_loaded)
    }

    /// Get the model handle, loading it on first use.
    ///
    /// Never fails: a download or deserialization failure yields the
    /// `Unavailable` sentinel, which is cached like a successful load.
    pub async fn ensure_model(&self) -> ModelHandle {
        self.handle
            .get_or_init(|| async {
                match self.try_load().await {
                    Ok(model) => {
                        info!("Model '{}' loaded successfully", self.config.name);
                        ModelHandle::Ready(model)
                    }
                    Err(e) => {
                        warn!("Model '{}' unavailable: {}", self.config.name, e);
                        metrics::counter!("tumora_model_load_failures_total", "code" => e.kind().code())
                            .increment(1);
                        ModelHandle::unavailable(&e)
                    }
                }
            })
            .await
            .clone()
    }

    /// Ensure the artifact and deserialize it, bypassing the cache.
    ///
    /// Returns `Download`, `Integrity` or `Deserialization` errors as-is.
    pub async fn try_load(&self) -> Result<Arc<dyn ImageModel>> {
        let path = self.ensure_artifact().await?;

        let loader = Arc::clone(&self.loader);
        let input_shape = self.config.input_shape();
        tokio::task::spawn_blocking(move || loader.load(&path, input_shape))
            .await
            .map_err(|e| Error::internal(format!("Model load task failed: {}", e)))?
    }

    /// Make sure the artifact exists at the local path, fetching it if absent
    pub async fn ensure_artifact(&self) -> Result<PathBuf> {
        let path = self.config.local_path.clone();

        if tokio::fs::try_exists(&path).await? {
            debug!("Using existing model artifact at {}", path.display());
            self.verify_integrity(&path).await?;
            return Ok(path);
        }

        info!(
            "Model artifact not found at {}, fetching with '{}'",
            path.display(),
            self.fetcher.name()
        );
        metrics::counter!("tumora_model_downloads_total").increment(1);

        let timeout = self.config.download_timeout();
        let fetched = tokio::time::timeout(timeout, self.fetcher.fetch(&self.config.source, &path))
            .await
            .unwrap_or_else(|_| {
                Err(Error::download(format!(
                    "Download timed out after {}s",
                    timeout.as_secs()
                )))
            });

        if let Err(e) = fetched {
            let _ = tokio::fs::remove_file(partial_path(&path)).await;
            return Err(e);
        }

        if !tokio::fs::try_exists(&path).await? {
            return Err(Error::download(format!(
                "Fetcher '{}' finished without writing {}",
                self.fetcher.name(),
                path.display()
            )));
        }

        // A freshly fetched artifact that fails verification is not kept
        if let Err(e) = self.verify_integrity(&path).await {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e);
        }

        Ok(path)
    }

    async fn verify_integrity(&self, path: &Path) -> Result<()> {
        let Some(expected) = &self.config.sha256 else {
            return Ok(());
        };

        let actual = sha256_file(path.to_path_buf()).await?;
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(Error::Integrity {
                expected: expected.to_ascii_lowercase(),
                actual,
            });
        }

        debug!("Artifact digest verified: {}", actual);
        Ok(())
    }
}

/// Hex SHA-256 of a file, computed off the async runtime
pub async fn sha256_file(path: PathBuf) -> Result<String> {
    tokio::task::spawn_blocking(move || -> Result<String> {
        let mut file = std::fs::File::open(&path)?;
        let mut hasher = Sha256::new();
        std::io::copy(&mut file, &mut hasher)?;
        Ok(format!("{:x}", hasher.finalize()))
    })
    .await
    .map_err(|e| Error::internal(format!("Digest task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sha256_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.onnx");
        std::fs::write(&path, b"abc").unwrap();

        let digest = sha256_file(path).await.unwrap();
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_status_before_load() {
        let provider = ModelProvider::from_config(ModelConfig::default()).unwrap();
        assert!(provider.cached().is_none());
        assert_eq!(provider.status().state, "not_loaded");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let fetcher: Arc<dyn ModelFetcher> = Arc::new(RemoteFetcher::new().unwrap());

        for config in [
            ModelConfig::default().with_threshold(1.5),
            ModelConfig::default().with_threshold(f32::NAN),
        ] {
            let err = ModelProvider::new(config, Arc::clone(&fetcher), Arc::new(OnnxLoader))
                .err()
                .unwrap();
            assert_eq!(err.kind(), tumora_core::ErrorKind::Config);
        }

        let mut config = ModelConfig::default();
        config.preprocessing.scale = 100.0;
        assert!(ModelProvider::new(config, fetcher, Arc::new(OnnxLoader)).is_err());
    }
}
