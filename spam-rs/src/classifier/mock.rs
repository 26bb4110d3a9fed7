//! Mock classifier for development and testing
//!
//! Counts well-known spam phrases instead of running a model.

use super::{ensure_text, ClassificationResult, TextClassifier};
use crate::error::Result;
use tracing::debug;

const DEFAULT_KEYWORDS: &[&str] = &[
    "免費", "免费", "中獎", "中奖", "優惠", "优惠", "限時", "限时", "贈送", "赠送", "點擊", "点击",
    "加line", "加微信", "貸款", "贷款", "free", "winner", "click here", "act now",
];

/// Mock classifier implementation for testing
pub struct MockClassifier {
    keywords: Vec<String>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self::with_keywords(DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect())
    }

    pub fn with_keywords(keywords: Vec<String>) -> Self {
        Self {
            keywords: keywords.into_iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// Number of keyword occurrences in the text
    fn count_hits(&self, text: &str) -> usize {
        let text_lower = text.to_lowercase();
        self.keywords
            .iter()
            .map(|k| text_lower.matches(k.as_str()).count())
            .sum()
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TextClassifier for MockClassifier {
    async fn classify(&self, text: &str) -> Result<ClassificationResult> {
        ensure_text(text)?;
        let hits = self.count_hits(text);
        let probability = (0.05 + 0.3 * hits as f64).min(0.99);

        debug!("MockClassifier: {} keyword hits", hits);

        Ok(ClassificationResult::from_probability(probability))
    }

    fn backend_name(&self) -> &str {
        "mock"
    }
}
