//! HTTP routes and handlers

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::Serialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use tumora_core::{ErrorKind, Label};

use crate::render::{render_error, render_prediction, DISCLAIMER};
use crate::state::AppState;

/// Content types accepted for the uploaded scan
const ACCEPTED_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png"];

pub fn create_router(state: AppState) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/api/model", get(model_status))
        .route("/api/predict", post(predict))
        .fallback(fallback)
        // Overflow surfaces as a multipart stream error, rendered as PAYLOAD_TOO_LARGE
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn metrics(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}

async fn model_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let provider = state.detector.provider();
    let status = provider.status();

    Json(json!({
        "status": status.state,
        "name": status.name.unwrap_or_else(|| provider.config().name.clone()),
        "input_shape": status.input_shape.unwrap_or_else(|| provider.config().input_shape()),
        "threshold": state.detector.threshold(),
        "error": status.error,
    }))
}

/// Successful classification response
#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub request_id: String,
    pub label: Label,
    pub confidence: f32,
    pub title: &'static str,
    pub message: &'static str,
    pub advice: &'static str,
    pub disclaimer: &'static str,
    pub latency_us: u64,
}

async fn predict(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>, AppError> {
    let request_id = uuid::Uuid::new_v4().to_string();
    let mut multipart = multipart.map_err(|e| AppError::InvalidRequest(e.body_text()))?;

    let image = read_upload(&mut multipart).await?;
    debug!("Processing upload: request_id={}, bytes={}", request_id, image.len());

    let prediction = state.detector.detect(image).await?;

    metrics::counter!("tumora_predictions_total", "label" => prediction.label.as_str())
        .increment(1);
    metrics::histogram!("tumora_prediction_latency_us").record(prediction.latency_us as f64);

    info!(
        "Prediction complete: request_id={}, label={}, confidence={:.4}, latency={}us",
        request_id, prediction.label, prediction.confidence, prediction.latency_us
    );

    let rendered = render_prediction(&prediction);
    Ok(Json(PredictResponse {
        request_id,
        label: prediction.label,
        confidence: prediction.confidence,
        title: rendered.title,
        message: rendered.message,
        advice: rendered.advice,
        disclaimer: DISCLAIMER,
        latency_us: prediction.latency_us,
    }))
}

/// Pull the `file` field out of the multipart body
async fn read_upload(multipart: &mut Multipart) -> Result<Bytes, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            debug!("Ignoring multipart field {:?}", field.name());
            continue;
        }

        // A part without a content type is left to the decoder
        if let Some(content_type) = field.content_type() {
            let essence = content_type
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            if !ACCEPTED_TYPES.contains(&essence.as_str()) {
                return Err(AppError::UnsupportedMedia(content_type.to_string()));
            }
        }

        return Ok(field.bytes().await?);
    }

    Err(AppError::InvalidRequest(
        "Missing multipart field 'file'".to_string(),
    ))
}

async fn fallback() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": {
                "code": "NOT_FOUND",
                "message": "Not found",
            }
        })),
    )
}

/// Error handling
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Detection(#[from] tumora_core::Error),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("unsupported media type: {0}")]
    UnsupportedMedia(String),

    #[error("upload exceeds the size limit")]
    PayloadTooLarge,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Detection(e) => status_for_kind(e.kind()),
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::UnsupportedMedia(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Detection(e) => e.kind().code(),
            AppError::InvalidRequest(_) => "INVALID_REQUEST",
            AppError::UnsupportedMedia(_) => "UNSUPPORTED_MEDIA_TYPE",
            AppError::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
        }
    }

    fn user_message(&self) -> String {
        match self {
            AppError::Detection(e) => render_error(e.kind()).to_string(),
            AppError::InvalidRequest(msg) => msg.clone(),
            AppError::UnsupportedMedia(_) => "Please upload a JPEG or PNG image".to_string(),
            AppError::PayloadTooLarge => "The uploaded file is too large".to_string(),
        }
    }
}

/// HTTP status for each classifier error kind
pub fn status_for_kind(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Decode => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::ModelUnavailable
        | ErrorKind::Download
        | ErrorKind::Deserialization
        | ErrorKind::Integrity => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::ShapeMismatch
        | ErrorKind::Inference
        | ErrorKind::Config
        | ErrorKind::Io
        | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge
        } else {
            AppError::InvalidRequest(err.body_text())
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        metrics::counter!("tumora_errors_total", "code" => code).increment(1);
        warn!("Request failed: {} ({})", self, status);

        let body = json!({
            "error": {
                "code": code,
                "message": self.user_message(),
            }
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tumora_core::Error;

    #[test]
    fn test_status_per_kind() {
        assert_eq!(
            AppError::from(Error::decode("x")).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        for err in [
            Error::model_unavailable("x"),
            Error::download("x"),
            Error::deserialization("x"),
            Error::Integrity {
                expected: "a".into(),
                actual: "b".into(),
            },
        ] {
            assert_eq!(AppError::from(err).status_code(), StatusCode::SERVICE_UNAVAILABLE);
        }
        assert_eq!(
            AppError::from(Error::shape_mismatch(&[1, 224, 224, 3], &[1, 3, 224, 224])).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::UnsupportedMedia("text/csv".into()).status_code(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(AppError::PayloadTooLarge.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::from(Error::decode("x")).error_code(), "DECODE_ERROR");
        assert_eq!(
            AppError::InvalidRequest("missing".into()).error_code(),
            "INVALID_REQUEST"
        );
    }
}
