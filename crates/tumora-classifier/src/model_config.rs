//! Model configuration structures

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tumora_core::{Error, Result, DEFAULT_THRESHOLD};

/// Configuration for the single classifier model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name
    #[serde(default = "default_name")]
    pub name: String,

    /// Where to fetch the artifact from when it is not present locally
    #[serde(default)]
    pub source: ModelSource,

    /// Local artifact path, checked before any download
    #[serde(default = "default_local_path")]
    pub local_path: PathBuf,

    /// Upper bound on the whole download, in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    /// Expected SHA-256 of the artifact (hex). No check when absent.
    #[serde(default)]
    pub sha256: Option<String>,

    /// Image preprocessing settings
    #[serde(default)]
    pub preprocessing: PreprocessConfig,

    /// Inference settings
    #[serde(default)]
    pub inference: InferenceConfig,
}

/// Model source configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelSource {
    /// Plain HTTP(S) download. Google Drive share links are accepted.
    Url { url: String },

    /// Download from HuggingFace Hub
    HuggingFace {
        repo: String,
        #[serde(default = "default_revision")]
        revision: String,
        filename: String,
    },

    /// No remote; the artifact must already exist at `local_path`
    #[default]
    Local,
}

/// Preprocessing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Target width in pixels
    #[serde(default = "default_side")]
    pub width: u32,

    /// Target height in pixels
    #[serde(default = "default_side")]
    pub height: u32,

    /// Divisor applied to 8-bit intensities
    #[serde(default = "default_scale")]
    pub scale: f32,

    /// Resampling filter for the stretch-to-fit resize
    #[serde(default)]
    pub filter: ResizeFilter,
}

/// Resampling filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    #[default]
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Inference configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Classification threshold; scores strictly above it are positive
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

fn default_name() -> String {
    "tumor-detection".to_string()
}

fn default_local_path() -> PathBuf {
    PathBuf::from("models/tumor_detection_model.onnx")
}

fn default_download_timeout_secs() -> u64 {
    300
}

fn default_revision() -> String {
    "main".to_string()
}

fn default_side() -> u32 {
    224
}

/// Largest 8-bit channel value
const MAX_INTENSITY: f32 = 255.0;

fn default_scale() -> f32 {
    MAX_INTENSITY
}

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            source: ModelSource::default(),
            local_path: default_local_path(),
            download_timeout_secs: default_download_timeout_secs(),
            sha256: None,
            preprocessing: PreprocessConfig::default(),
            inference: InferenceConfig::default(),
        }
    }
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            width: default_side(),
            height: default_side(),
            scale: default_scale(),
            filter: ResizeFilter::default(),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
        }
    }
}

impl PreprocessConfig {
    /// NHWC shape of the tensor this configuration produces
    pub fn output_shape(&self) -> [usize; 4] {
        [1, self.height as usize, self.width as usize, 3]
    }
}

impl ModelConfig {
    /// Create a configuration that downloads from `url` into `local_path`
    pub fn from_url(url: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            source: ModelSource::Url { url: url.into() },
            local_path: local_path.into(),
            ..Default::default()
        }
    }

    /// Create a configuration for an artifact that is already on disk
    pub fn from_local(local_path: impl Into<PathBuf>) -> Self {
        Self {
            local_path: local_path.into(),
            ..Default::default()
        }
    }

    /// Load and validate a model configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: ModelConfig = serde_yaml::from_str(&contents)
            .map_err(|e| Error::config(format!("Failed to parse model config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the download timeout
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Set the expected artifact digest
    pub fn with_sha256(mut self, digest: impl Into<String>) -> Self {
        self.sha256 = Some(digest.into());
        self
    }

    /// Set the classification threshold
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.inference.threshold = threshold;
        self
    }

    /// Download timeout as a duration
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Input shape the model is expected to accept
    pub fn input_shape(&self) -> [usize; 4] {
        self.preprocessing.output_shape()
    }

    /// Reject configurations that cannot produce a valid pipeline
    pub fn validate(&self) -> Result<()> {
        let pre = &self.preprocessing;
        if pre.width == 0 || pre.height == 0 {
            return Err(Error::config(format!(
                "Input size must be non-zero, got {}x{}",
                pre.width, pre.height
            )));
        }

        // Smaller divisors push 8-bit intensities above 1.0
        if !pre.scale.is_finite() || pre.scale < MAX_INTENSITY {
            return Err(Error::config(format!(
                "Normalization scale must be at least {}, got {}",
                MAX_INTENSITY, pre.scale
            )));
        }

        if !(0.0..=1.0).contains(&self.inference.threshold) {
            return Err(Error::config(format!(
                "Threshold must be between 0.0 and 1.0, got {}",
                self.inference.threshold
            )));
        }

        if self.download_timeout_secs == 0 {
            return Err(Error::config("Download timeout must be at least one second"));
        }

        if let Some(digest) = &self.sha256 {
            if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(Error::config(format!(
                    "sha256 must be 64 hex characters, got '{}'",
                    digest
                )));
            }
        }

        match &self.source {
            ModelSource::Url { url } => {
                crate::fetcher::resolve_download_url(url)?;
            }
            ModelSource::HuggingFace { repo, filename, .. } => {
                if repo.is_empty() || filename.is_empty() {
                    return Err(Error::config(
                        "HuggingFace source needs both repo and filename",
                    ));
                }
            }
            ModelSource::Local => {}
        }

        Ok(())
    }
}
