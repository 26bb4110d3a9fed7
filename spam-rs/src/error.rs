//! Error types for spam-rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Result type alias for spam-rs operations
pub type Result<T> = std::result::Result<T, SpamError>;

/// Spam classification error types
#[derive(Error, Debug)]
pub enum SpamError {
    /// Text was empty after trimming whitespace
    #[error("Input text is empty")]
    EmptyInput,

    /// Client supplied no usable payload
    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    /// Request body exceeded the configured limit
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// OCR succeeded but produced only whitespace
    #[error("No text found in image")]
    NoTextFound,

    /// OCR vendor failed or answered with an unexpected shape
    #[error("OCR vendor error: {0}")]
    VendorError(String),

    /// Model or vectorizer failed to load at startup
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Inference failed for a loaded model
    #[error("Inference error: {0}")]
    Inference(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Anything else
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SpamError {
    /// HTTP status reported at the request boundary
    pub fn status_code(&self) -> StatusCode {
        match self {
            SpamError::EmptyInput | SpamError::UnsupportedInput(_) | SpamError::NoTextFound => {
                StatusCode::BAD_REQUEST
            }
            SpamError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            SpamError::VendorError(_)
            | SpamError::ModelUnavailable(_)
            | SpamError::Inference(_)
            | SpamError::Config(_)
            | SpamError::Io(_)
            | SpamError::Json(_)
            | SpamError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error body
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(msg: &str) -> Self {
        Self {
            error: msg.to_string(),
        }
    }
}

impl IntoResponse for SpamError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!("Request failed ({}): {}", status, self);
        } else {
            warn!("Request rejected ({}): {}", status, self);
        }

        (status, Json(ApiError::new(&self.to_string()))).into_response()
    }
}
