//! Image text extraction (OCR)

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{OcrBackend, OcrConfig};
use crate::error::{Result, SpamError};

pub mod mock;
pub mod ocr_space;

pub use mock::MockOcr;
pub use ocr_space::OcrSpaceClient;

/// Image text extractor trait
#[async_trait::async_trait]
pub trait ImageTextExtractor: Send + Sync {
    /// Extract text from an image payload
    async fn extract(&self, image: &[u8]) -> Result<String>;

    /// Extractor name for logs
    fn name(&self) -> &str;
}

/// Reject an empty upload before any vendor call
pub fn ensure_image(image: &[u8]) -> Result<()> {
    if image.is_empty() {
        return Err(SpamError::UnsupportedInput("Image payload is empty".to_string()));
    }
    Ok(())
}

/// Trim OCR output, failing when nothing but whitespace was recognized
pub fn clean_text(raw: &str) -> Result<String> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(SpamError::NoTextFound);
    }
    Ok(text.to_string())
}

/// Guess the image format from its magic bytes
pub fn sniff_image_type(image: &[u8]) -> Option<&'static str> {
    match image {
        [0x89, b'P', b'N', b'G', ..] => Some("png"),
        [0xFF, 0xD8, 0xFF, ..] => Some("jpg"),
        [b'G', b'I', b'F', b'8', ..] => Some("gif"),
        [b'B', b'M', ..] => Some("bmp"),
        [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => Some("tif"),
        [b'%', b'P', b'D', b'F', ..] => Some("pdf"),
        _ => None,
    }
}

/// Build the configured extractor
pub fn build_extractor(config: &OcrConfig) -> Result<Arc<dyn ImageTextExtractor>> {
    match config.backend {
        OcrBackend::OcrSpace => {
            if config.api_key.is_none() {
                warn!(
                    "No OCR API key configured; image requests will fail until {} is set",
                    crate::config::OCR_API_KEY_ENV
                );
            }
            let client = OcrSpaceClient::new(config)?;
            info!("OCR extractor: {} ({})", client.name(), config.endpoint);
            Ok(Arc::new(client))
        }
        OcrBackend::Mock => {
            info!("OCR extractor: mock");
            Ok(Arc::new(MockOcr::new()))
        }
    }
}
