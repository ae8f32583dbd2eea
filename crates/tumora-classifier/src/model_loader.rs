//! Model deserialization for tract-based ONNX classifiers

use crate::classifier::ImageModel;
use crate::preprocess::InputTensor;
use std::path::Path;
use std::sync::Arc;
use tract_onnx::prelude::*;
use tracing::{debug, info};
use tumora_core::{Error, Result};

/// Model file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// ONNX graph (the only format that can be executed)
    Onnx,
}

impl ModelFormat {
    /// Determine the format from the artifact's extension.
    ///
    /// Files without an extension are treated as ONNX and left for the
    /// parser to reject.
    pub fn detect(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            None | Some("onnx") => Ok(Self::Onnx),
            Some("h5") | Some("hdf5") | Some("keras") => Err(Error::deserialization(format!(
                "Keras model {} is not loadable; export it to ONNX first",
                path.display()
            ))),
            Some(other) => Err(Error::deserialization(format!(
                "Unsupported model format '.{}' for {}",
                other,
                path.display()
            ))),
        }
    }
}

/// Trait for turning an artifact on disk into a runnable model
pub trait ModelLoader: Send + Sync {
    /// Deserialize the artifact at `path` for inputs of `input_shape`
    fn load(&self, path: &Path, input_shape: [usize; 4]) -> Result<Arc<dyn ImageModel>>;
}

/// Loads ONNX graphs with tract
#[derive(Debug, Clone, Copy, Default)]
pub struct OnnxLoader;

impl ModelLoader for OnnxLoader {
    fn load(&self, path: &Path, input_shape: [usize; 4]) -> Result<Arc<dyn ImageModel>> {
        ModelFormat::detect(path)?;

        info!("Loading ONNX model from: {}", path.display());

        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| model.with_input_fact(0, f32::fact(input_shape).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| {
                Error::deserialization(format!("Failed to load {}: {:#}", path.display(), e))
            })?;

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("onnx-model")
            .to_string();

        info!("Model '{}' ready, input shape {:?}", name, input_shape);

        Ok(Arc::new(OnnxModel {
            plan,
            name,
            input_shape,
        }))
    }
}

/// Optimized tract plan for a sigmoid binary classifier
pub struct OnnxModel {
    plan: SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>,
    name: String,
    input_shape: [usize; 4],
}

impl ImageModel for OnnxModel {
    fn infer(&self, input: &InputTensor) -> Result<f32> {
        let tensor: Tensor = input.as_array().clone().into();

        let outputs = self
            .plan
            .run(tvec!(tensor.into_tvalue()))
            .map_err(|e| Error::inference(format!("Forward pass failed: {:#}", e)))?;

        let output = outputs
            .first()
            .ok_or_else(|| Error::inference("Model produced no outputs"))?;

        let view = output
            .to_array_view::<f32>()
            .map_err(|e| Error::inference(format!("Expected f32 output: {:#}", e)))?;

        debug!("Model output shape: {:?}", view.shape());

        single_value(view.iter().copied(), view.shape())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn input_shape(&self) -> [usize; 4] {
        self.input_shape
    }
}

/// Extract the only element of a `[1, 1]`-like output
fn single_value(mut values: impl Iterator<Item = f32>, shape: &[usize]) -> Result<f32> {
    match (values.next(), values.next()) {
        (Some(value), None) => Ok(value),
        _ => Err(Error::inference(format!(
            "Expected a single sigmoid output, got shape {:?}",
            shape
        ))),
    }
}
