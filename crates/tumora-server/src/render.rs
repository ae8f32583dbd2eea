//! User-facing text for predictions and failures
//!
//! The classifier crates report labels and error kinds only; every sentence a
//! person reads is chosen here.

use serde::Serialize;
use tumora_core::{ErrorKind, Label, Prediction};

/// Reminder attached to every result
pub const DISCLAIMER: &str =
    "This result is an AI prediction, not a medical diagnosis. Please consult a specialist.";

/// Text shown alongside a prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedResult {
    pub title: &'static str,
    pub message: &'static str,
    pub advice: &'static str,
}

/// Render a prediction for display
pub fn render_prediction(prediction: &Prediction) -> RenderedResult {
    match prediction.label {
        Label::TumorDetected => RenderedResult {
            title: "Tumor detected",
            message: "We are truly sorry about what you are going through, but you are not alone. \
                      The support of the people around you will give you strength at every step \
                      toward recovery.",
            advice: "Please consult a neurologist as soon as possible for further examination.",
        },
        Label::NoTumor => RenderedResult {
            title: "No tumor",
            message: "The scan shows no indication of a tumor.",
            advice: "If you still experience worrying symptoms, consult a doctor for further \
                     examination.",
        },
    }
}

/// Short message for a failed request, by error kind
pub fn render_error(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Decode => "The uploaded file is not a valid image",
        ErrorKind::ModelUnavailable
        | ErrorKind::Download
        | ErrorKind::Deserialization
        | ErrorKind::Integrity => "The model is not available right now",
        ErrorKind::ShapeMismatch | ErrorKind::Inference => "The image could not be analyzed",
        ErrorKind::Config | ErrorKind::Io | ErrorKind::Internal => "Internal server error",
    }
}
