//! OCR.space vendor client
//!
//! Uploads the image as multipart form data together with the API key and a
//! language hint. The call is bounded by the client timeout and never
//! retried.

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{clean_text, ensure_image, sniff_image_type, ImageTextExtractor};
use crate::config::OcrConfig;
use crate::error::{Result, SpamError};

/// OCR.space API client
pub struct OcrSpaceClient {
    endpoint: String,
    api_key: Option<String>,
    language: String,
    engine: u8,
    client: reqwest::Client,
}

/// Vendor response body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrSpaceResponse {
    #[serde(default)]
    parsed_results: Option<Vec<ParsedResult>>,
    is_errored_on_processing: bool,
    /// Either a string or a list of strings
    #[serde(default)]
    error_message: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParsedResult {
    #[serde(default)]
    parsed_text: Option<String>,
}

impl OcrSpaceClient {
    pub fn new(config: &OcrConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| SpamError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            language: config.language.clone(),
            engine: config.engine,
            client,
        })
    }

    /// Interpret a vendor response body
    pub fn parse_response(body: &str) -> Result<String> {
        let response: OcrSpaceResponse = serde_json::from_str(body)
            .map_err(|e| SpamError::VendorError(format!("Unexpected OCR response: {}", e)))?;

        if response.is_errored_on_processing {
            let message = match response.error_message {
                Some(serde_json::Value::String(s)) => s,
                Some(serde_json::Value::Array(items)) => items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
                _ => "unknown processing error".to_string(),
            };
            return Err(SpamError::VendorError(message));
        }

        let first = response
            .parsed_results
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| SpamError::VendorError("OCR response has no parsed results".to_string()))?;

        clean_text(first.parsed_text.as_deref().unwrap_or(""))
    }
}

#[async_trait::async_trait]
impl ImageTextExtractor for OcrSpaceClient {
    async fn extract(&self, image: &[u8]) -> Result<String> {
        ensure_image(image)?;

        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SpamError::VendorError("OCR API key not configured".to_string()))?;

        let extension = sniff_image_type(image).unwrap_or("png");
        let file = Part::bytes(image.to_vec()).file_name(format!("upload.{}", extension));

        let form = Form::new()
            .text("apikey", api_key.to_string())
            .text("language", self.language.clone())
            .text("OCREngine", self.engine.to_string())
            .text("filetype", extension.to_uppercase())
            .part("file", file);

        debug!(
            "OCR: Uploading {} bytes ({}) to {}",
            image.len(),
            extension,
            self.endpoint
        );

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SpamError::VendorError(format!("OCR request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SpamError::VendorError(format!("Failed to read OCR response: {}", e)))?;

        if !status.is_success() {
            warn!("OCR: Request failed with status {}: {}", status, body);
            return Err(SpamError::VendorError(format!(
                "OCR request failed: {} - {}",
                status, body
            )));
        }

        Self::parse_response(&body)
    }

    fn name(&self) -> &str {
        "ocr_space"
    }
}
