//! Detection pipeline: model handle, preprocessing and prediction in one call

use crate::model_config::ModelConfig;
use crate::predict::Predictor;
use crate::preprocess::Preprocessor;
use crate::provider::ModelProvider;
use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;
use tumora_core::{Error, Prediction, Result};

/// Classifies uploaded scans against the provider's model
#[derive(Clone)]
pub struct TumorDetector {
    provider: Arc<ModelProvider>,
    preprocessor: Arc<Preprocessor>,
    predictor: Predictor,
}

impl TumorDetector {
    /// Build a detector using the provider's preprocessing and threshold settings
    pub fn new(provider: Arc<ModelProvider>) -> Self {
        let config = provider.config();
        let preprocessor = Arc::new(Preprocessor::new(config.preprocessing.clone()));
        let predictor = Predictor::from_validated(config.inference.threshold);

        Self {
            provider,
            preprocessor,
            predictor,
        }
    }

    /// Build a detector with the production fetcher and loader
    pub fn from_config(config: ModelConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(ModelProvider::from_config(config)?)))
    }

    pub fn provider(&self) -> &Arc<ModelProvider> {
        &self.provider
    }

    pub fn threshold(&self) -> f32 {
        self.predictor.threshold()
    }

    /// Classify one uploaded image.
    ///
    /// An unavailable model is reported before the image is decoded.
    pub async fn detect(&self, image: Bytes) -> Result<Prediction> {
        let handle = self.provider.ensure_model().await;
        handle.model()?;

        debug!("Classifying upload of {} bytes", image.len());

        let preprocessor = Arc::clone(&self.preprocessor);
        let predictor = self.predictor;
        tokio::task::spawn_blocking(move || {
            let tensor = preprocessor.preprocess(&image)?;
            predictor.predict(&handle, &tensor)
        })
        .await
        .map_err(|e| Error::internal(format!("Detection task failed: {}", e)))?
    }
}
