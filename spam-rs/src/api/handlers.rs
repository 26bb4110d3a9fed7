//! API request handlers

use axum::{
    extract::{
        multipart::{Multipart, MultipartError, MultipartRejection},
        rejection::JsonRejection,
        State,
    },
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::classifier::{ClassificationResult, Label, TextClassifier};
use crate::error::{Result, SpamError};
use crate::fusion::{Channel, ScoreFusion};
use crate::ocr::ImageTextExtractor;

/// Shared application state, read-only after startup
pub struct AppState {
    pub classifier: Arc<dyn TextClassifier>,
    pub extractor: Arc<dyn ImageTextExtractor>,
    pub fusion: ScoreFusion,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub classifier: String,
    pub model_ready: bool,
}

/// POST /predict body
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub text: Option<String>,
}

/// POST /predict response
#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub label: Label,
    pub confidence: f64,
}

/// POST /predict-image response
#[derive(Debug, Serialize)]
pub struct PredictImageResponse {
    pub label: Label,
    pub confidence: f64,
    pub text: String,
}

/// POST /analyze-all response
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub final_label: Label,
    pub total_score: f64,
    pub text: Option<String>,
    pub text_score: f64,
    pub text_label: Option<Label>,
    pub text_confidence: Option<f64>,
    pub image_text: Option<String>,
    pub image_score: f64,
    pub image_label: Option<Label>,
    pub image_confidence: Option<f64>,
}

/// Fields read from a multipart upload
#[derive(Debug, Default)]
struct FormInput {
    text: Option<String>,
    image: Option<Vec<u8>>,
}

fn multipart_status_error(status: StatusCode, body_text: String) -> SpamError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        SpamError::PayloadTooLarge(body_text)
    } else {
        SpamError::UnsupportedInput(format!("Malformed multipart body: {}", body_text))
    }
}

fn multipart_error(e: MultipartError) -> SpamError {
    multipart_status_error(e.status(), e.body_text())
}

fn multipart_rejection(e: MultipartRejection) -> SpamError {
    multipart_status_error(e.status(), e.body_text())
}

/// Fail before any OCR call when no model is loaded
fn ensure_classifier_ready(state: &AppState) -> Result<()> {
    if state.classifier.is_ready() {
        return Ok(());
    }
    Err(SpamError::ModelUnavailable(format!(
        "{} classifier is not loaded",
        state.classifier.backend_name()
    )))
}

async fn read_form(multipart: std::result::Result<Multipart, MultipartRejection>) -> Result<FormInput> {
    let mut multipart = multipart.map_err(multipart_rejection)?;
    let mut form = FormInput::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(|s| s.to_string());

        match name.as_deref() {
            Some("text") => {
                form.text = Some(field.text().await.map_err(multipart_error)?);
            }
            Some("image") => {
                form.image = Some(field.bytes().await.map_err(multipart_error)?.to_vec());
            }
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }

    Ok(form)
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let model_ready = state.classifier.is_ready();

    Json(HealthResponse {
        status: if model_ready { "healthy" } else { "degraded" },
        service: "spam-rs",
        version: env!("CARGO_PKG_VERSION"),
        classifier: state.classifier.backend_name().to_string(),
        model_ready,
    })
}

/// POST /predict - classify a JSON text payload
pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>> {
    let Json(payload) = payload
        .map_err(|e| SpamError::UnsupportedInput(format!("Invalid JSON body: {}", e.body_text())))?;

    let text = payload.text.unwrap_or_default();
    let result = state.classifier.classify(&text).await?;

    info!("Predict: {} ({:.3})", result.label, result.confidence);

    Ok(Json(PredictResponse {
        label: result.label,
        confidence: result.confidence,
    }))
}

/// POST /predict-image - OCR an uploaded image and classify its text
pub async fn predict_image(
    State(state): State<Arc<AppState>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictImageResponse>> {
    let form = read_form(multipart).await?;

    let image = form
        .image
        .filter(|i| !i.is_empty())
        .ok_or_else(|| SpamError::UnsupportedInput("No image uploaded".to_string()))?;

    ensure_classifier_ready(&state)?;
    let text = state.extractor.extract(&image).await?;
    let result = state.classifier.classify(&text).await?;

    info!(
        "Predict image: {} chars of OCR text -> {} ({:.3})",
        text.chars().count(),
        result.label,
        result.confidence
    );

    Ok(Json(PredictImageResponse {
        label: result.label,
        confidence: result.confidence,
        text,
    }))
}

/// POST /analyze-all - fuse the text field and the image's OCR text
pub async fn analyze_all(
    State(state): State<Arc<AppState>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalyzeResponse>> {
    let form = read_form(multipart).await?;

    let text = form.text.filter(|t| !t.trim().is_empty());
    let image = form.image.filter(|i| !i.is_empty());

    if text.is_none() && image.is_none() {
        return Err(SpamError::UnsupportedInput(
            "Provide a text field, an image, or both".to_string(),
        ));
    }

    ensure_classifier_ready(&state)?;

    let classify_text = async {
        match &text {
            Some(t) => state.classifier.classify(t).await.map(Some),
            None => Ok(None),
        }
    };

    let extract_image = async {
        match &image {
            Some(bytes) => match state.extractor.extract(bytes).await {
                Ok(extracted) => Ok(Some(extracted)),
                Err(SpamError::NoTextFound) => {
                    info!("Analyze: image contained no text, image channel absent");
                    Ok(None)
                }
                Err(e) => Err(e),
            },
            None => Ok(None),
        }
    };

    let (text_result, image_text) = tokio::join!(classify_text, extract_image);
    let text_result = text_result?;
    let image_text = image_text?;

    let image_result: Option<ClassificationResult> = match &image_text {
        Some(t) => Some(state.classifier.classify(t).await?),
        None => None,
    };

    if text_result.is_none() && image_result.is_none() {
        return Err(SpamError::UnsupportedInput(
            "No usable text in request or image".to_string(),
        ));
    }

    let fused = state.fusion.fuse(text_result.as_ref(), image_result.as_ref());
    let text_channel = fused.channel(Channel::Text);
    let image_channel = fused.channel(Channel::Image);

    info!(
        "Analyze: final {} (total {:.2}, text {:?}, image {:?})",
        fused.final_label,
        fused.total_score,
        text_channel.and_then(|c| c.label),
        image_channel.and_then(|c| c.label)
    );

    Ok(Json(AnalyzeResponse {
        final_label: fused.final_label,
        total_score: fused.total_score,
        text_score: text_channel.map(|c| c.weighted_score).unwrap_or(0.0),
        text_label: text_channel.and_then(|c| c.label),
        text_confidence: text_channel.map(|c| c.confidence),
        image_score: image_channel.map(|c| c.weighted_score).unwrap_or(0.0),
        image_label: image_channel.and_then(|c| c.label),
        image_confidence: image_channel.map(|c| c.confidence),
        text,
        image_text,
    }))
}
