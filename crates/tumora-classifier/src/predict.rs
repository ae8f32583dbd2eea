//! Prediction stage: forward pass plus fixed-threshold decision

use crate::classifier::ModelHandle;
use crate::preprocess::InputTensor;
use std::time::Instant;
use tracing::debug;
use tumora_core::{Error, Prediction, Result, DEFAULT_THRESHOLD};

/// Runs a tensor through a model handle and labels the score
#[derive(Debug, Clone, Copy)]
pub struct Predictor {
    threshold: f32,
}

impl Predictor {
    /// Create a predictor, rejecting thresholds outside [0, 1]
    pub fn new(threshold: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::config(format!(
                "Threshold must be between 0.0 and 1.0, got {}",
                threshold
            )));
        }
        Ok(Self { threshold })
    }

    /// Threshold already checked by `ModelConfig::validate`
    pub(crate) fn from_validated(threshold: f32) -> Self {
        debug_assert!((0.0..=1.0).contains(&threshold));
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Classify one tensor.
    ///
    /// Fails with `ModelUnavailable` before touching the tensor when the
    /// handle is the unavailable sentinel, and with `ShapeMismatch` when the
    /// tensor does not match the model's declared input.
    pub fn predict(&self, handle: &ModelHandle, tensor: &InputTensor) -> Result<Prediction> {
        let model = handle.model()?;

        let expected = model.input_shape();
        let actual = tensor.shape();
        if actual != expected {
            return Err(Error::shape_mismatch(&expected, &actual));
        }

        let start = Instant::now();
        let score = model.infer(tensor)?;

        if !(0.0..=1.0).contains(&score) {
            return Err(Error::inference(format!(
                "Expected a sigmoid probability in [0, 1], got {}",
                score
            )));
        }

        let prediction = Prediction::from_score(score, self.threshold)
            .with_latency_us(start.elapsed().as_micros() as u64);

        debug!(
            "Model '{}' scored {:.4} -> {} in {}us",
            model.name(),
            score,
            prediction.label,
            prediction.latency_us
        );

        Ok(prediction)
    }
}

impl Default for Predictor {
    fn default() -> Self {
        Self::from_validated(DEFAULT_THRESHOLD)
    }
}

/// Predict with the default 0.5 threshold
pub fn predict(handle: &ModelHandle, tensor: &InputTensor) -> Result<Prediction> {
    Predictor::default().predict(handle, tensor)
}
