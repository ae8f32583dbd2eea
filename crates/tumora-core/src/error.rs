//! Error types for Tumora

use serde::Serialize;

/// Result type alias using Tumora's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Tumora operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The model artifact could not be fetched from its remote source
    #[error("download error: {0}")]
    Download(String),

    /// The local model artifact is corrupt or in an unrecognized format
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// The downloaded artifact does not match the configured digest
    #[error("integrity error: expected sha256 {expected}, got {actual}")]
    Integrity { expected: String, actual: String },

    /// The model handle is the unavailable sentinel
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// The uploaded bytes are not a decodable image
    #[error("decode error: {0}")]
    Decode(String),

    /// The input tensor does not match the model's input contract
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// The forward pass failed or produced an unusable output
    #[error("inference error: {0}")]
    Inference(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new download error
    pub fn download(msg: impl Into<String>) -> Self {
        Self::Download(msg.into())
    }

    /// Create a new deserialization error
    pub fn deserialization(msg: impl Into<String>) -> Self {
        Self::Deserialization(msg.into())
    }

    /// Create a new model-unavailable error
    pub fn model_unavailable(msg: impl Into<String>) -> Self {
        Self::ModelUnavailable(msg.into())
    }

    /// Create a new decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new shape mismatch error
    pub fn shape_mismatch(expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// Create a new inference error
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Download(_) => ErrorKind::Download,
            Self::Deserialization(_) => ErrorKind::Deserialization,
            Self::Integrity { .. } => ErrorKind::Integrity,
            Self::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
            Self::Decode(_) => ErrorKind::Decode,
            Self::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
            Self::Inference(_) => ErrorKind::Inference,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Fieldless mirror of [`Error`], cheap to copy into handles and responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Download,
    Deserialization,
    Integrity,
    ModelUnavailable,
    Decode,
    ShapeMismatch,
    Inference,
    Config,
    Io,
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Download => "DOWNLOAD_ERROR",
            Self::Deserialization => "DESERIALIZATION_ERROR",
            Self::Integrity => "INTEGRITY_ERROR",
            Self::ModelUnavailable => "MODEL_UNAVAILABLE",
            Self::Decode => "DECODE_ERROR",
            Self::ShapeMismatch => "SHAPE_MISMATCH",
            Self::Inference => "INFERENCE_ERROR",
            Self::Config => "CONFIG_ERROR",
            Self::Io => "IO_ERROR",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// Whether this kind can only arise while obtaining the model
    pub fn is_model_load(&self) -> bool {
        matches!(
            self,
            Self::Download | Self::Deserialization | Self::Integrity
        )
    }
}
