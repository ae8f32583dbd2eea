//! Core types for Tumora

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default decision boundary applied to the model's sigmoid output
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// One of the two outcomes the classifier can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    /// Score strictly above the threshold
    TumorDetected,
    /// Score at or below the threshold
    NoTumor,
}

impl Label {
    /// Map a raw score to a label. Scores equal to the threshold are negative.
    pub fn from_score(score: f32, threshold: f32) -> Self {
        if score > threshold {
            Self::TumorDetected
        } else {
            Self::NoTumor
        }
    }

    /// Whether this is the positive category
    pub fn is_positive(&self) -> bool {
        matches!(self, Self::TumorDetected)
    }

    /// Metric-friendly identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TumorDetected => "tumor_detected",
            Self::NoTumor => "no_tumor",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TumorDetected => f.write_str("tumor detected"),
            Self::NoTumor => f.write_str("no tumor"),
        }
    }
}

/// Result of a single forward pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Classification label
    pub label: Label,

    /// Raw sigmoid output (0.0-1.0)
    pub confidence: f32,

    /// Inference latency in microseconds
    pub latency_us: u64,
}

impl Prediction {
    /// Create a prediction by thresholding a raw score
    pub fn from_score(score: f32, threshold: f32) -> Self {
        Self {
            label: Label::from_score(score, threshold),
            confidence: score,
            latency_us: 0,
        }
    }

    /// Attach the measured latency
    pub fn with_latency_us(mut self, latency_us: u64) -> Self {
        self.latency_us = latency_us;
        self
    }
}
