//! Model trait and the handle passed to the prediction stage

use crate::preprocess::InputTensor;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tumora_core::{Error, ErrorKind, Result};

/// Trait for a loaded binary image classifier
pub trait ImageModel: Send + Sync {
    /// Run one forward pass and return the sigmoid output
    fn infer(&self, input: &InputTensor) -> Result<f32>;

    /// Get the model name
    fn name(&self) -> &str;

    /// NHWC input shape the model accepts
    fn input_shape(&self) -> [usize; 4];
}

/// Outcome of obtaining the model, cached for the provider's lifetime
#[derive(Clone)]
pub enum ModelHandle {
    /// Model loaded and ready for inference
    Ready(Arc<dyn ImageModel>),

    /// Loading failed; every prediction against this handle fails fast
    Unavailable { kind: ErrorKind, reason: String },
}

impl ModelHandle {
    /// Build the unavailable sentinel from the load error
    pub fn unavailable(error: &Error) -> Self {
        Self::Unavailable {
            kind: error.kind(),
            reason: error.to_string(),
        }
    }

    /// Check if the model can be used
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Borrow the loaded model, or fail with `ModelUnavailable`
    pub fn model(&self) -> Result<&Arc<dyn ImageModel>> {
        match self {
            Self::Ready(model) => Ok(model),
            Self::Unavailable { reason, .. } => Err(Error::model_unavailable(reason.clone())),
        }
    }

    /// Whether both handles refer to the same loaded model instance
    pub fn same_model(&self, other: &ModelHandle) -> bool {
        match (self, other) {
            (Self::Ready(a), Self::Ready(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Serializable summary for status endpoints
    pub fn status(&self) -> ModelStatus {
        match self {
            Self::Ready(model) => ModelStatus {
                state: "ready",
                name: Some(model.name().to_string()),
                input_shape: Some(model.input_shape()),
                error: None,
            },
            Self::Unavailable { kind, reason } => ModelStatus {
                state: "unavailable",
                name: None,
                input_shape: None,
                error: Some(format!("{}: {}", kind.code(), reason)),
            },
        }
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(model) => f.debug_tuple("Ready").field(&model.name()).finish(),
            Self::Unavailable { kind, reason } => f
                .debug_struct("Unavailable")
                .field("kind", kind)
                .field("reason", reason)
                .finish(),
        }
    }
}

/// Model status information
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_shape: Option<[usize; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ModelStatus {
    /// Status before the first load attempt
    pub fn not_loaded() -> Self {
        Self {
            state: "not_loaded",
            name: None,
            input_shape: None,
            error: None,
        }
    }
}
