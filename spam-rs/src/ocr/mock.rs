//! Mock OCR for testing
//!
//! Treats UTF-8 payloads as the text "printed" on the image so tests and
//! local runs can drive the image channel without a vendor account.

use super::{clean_text, ensure_image, ImageTextExtractor};
use crate::error::{Result, SpamError};
use tracing::debug;

enum Behavior {
    /// Echo UTF-8 payloads, fall back to a canned text
    Echo,
    /// Always fail like a vendor-side error
    Fail(String),
}

/// Mock OCR implementation
pub struct MockOcr {
    behavior: Behavior,
}

impl MockOcr {
    pub fn new() -> Self {
        Self {
            behavior: Behavior::Echo,
        }
    }

    /// Extractor that reports a vendor processing error for every image
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            behavior: Behavior::Fail(message.into()),
        }
    }
}

impl Default for MockOcr {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ImageTextExtractor for MockOcr {
    async fn extract(&self, image: &[u8]) -> Result<String> {
        ensure_image(image)?;

        match &self.behavior {
            Behavior::Echo => {
                let text = std::str::from_utf8(image).unwrap_or("mock ocr text");
                debug!("MockOcr: extracted {} chars", text.chars().count());
                clean_text(text)
            }
            Behavior::Fail(message) => Err(SpamError::VendorError(message.clone())),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
