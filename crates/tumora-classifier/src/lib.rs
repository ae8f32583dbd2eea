//! Tumora Classifier
//!
//! Binary brain MRI tumor classification on CPU.
//!
//! The crate is organized as three stages plus the glue between them:
//! - Model provider: download-if-absent, deserialize once, cache the handle
//! - Preprocessing: any JPEG/PNG into a `[1, 224, 224, 3]` tensor in [0, 1]
//! - Prediction: one forward pass, sigmoid score against a fixed threshold
//!
//! [`TumorDetector`] chains them for callers that only hold image bytes.

pub mod classifier;
pub mod fetcher;
pub mod model_config;
pub mod model_loader;
pub mod pipeline;
pub mod predict;
pub mod preprocess;
pub mod provider;

pub use classifier::{ImageModel, ModelHandle, ModelStatus};
pub use fetcher::{HttpFetcher, HubFetcher, ModelFetcher, RemoteFetcher};
pub use model_config::{InferenceConfig, ModelConfig, ModelSource, PreprocessConfig, ResizeFilter};
pub use model_loader::{ModelFormat, ModelLoader, OnnxLoader, OnnxModel};
pub use pipeline::TumorDetector;
pub use predict::{predict, Predictor};
pub use preprocess::{preprocess, InputTensor, Preprocessor};
pub use provider::ModelProvider;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::{ImageModel, ModelHandle};
    pub use crate::model_config::{ModelConfig, ModelSource};
    pub use crate::pipeline::TumorDetector;
    pub use crate::predict::Predictor;
    pub use crate::preprocess::{InputTensor, Preprocessor};
    pub use crate::provider::ModelProvider;
    pub use tumora_core::{Error, ErrorKind, Label, Prediction, Result};
}
