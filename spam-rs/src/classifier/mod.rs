//! Text classifier abstraction

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::{ClassifierBackend, ClassifierConfig};
use crate::error::{Result, SpamError};

pub mod classical;
pub mod mock;
pub mod onnx;
pub mod transformer;
pub mod vectorizer;

pub use classical::{ClassicalClassifier, LinearModel};
pub use mock::MockClassifier;
pub use onnx::{OnnxClassifier, OnnxModel, ScoreKind};
pub use transformer::TransformerClassifier;
pub use vectorizer::Vectorizer;

/// Spam probability above which a text is labeled spam
pub const SPAM_PROBABILITY_THRESHOLD: f64 = 0.5;

/// Classification label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Spam,
    Ham,
    Unknown,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Spam => "spam",
            Label::Ham => "ham",
            Label::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier output for one text source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: Label,
    /// Spam-class probability in [0, 1]
    pub confidence: f64,
}

impl ClassificationResult {
    /// Label a spam probability; out-of-range values are clamped
    pub fn from_probability(probability: f64) -> Self {
        let confidence = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };

        let label = if confidence > SPAM_PROBABILITY_THRESHOLD {
            Label::Spam
        } else {
            Label::Ham
        };

        Self { label, confidence }
    }
}

/// Text classifier trait
#[async_trait::async_trait]
pub trait TextClassifier: Send + Sync {
    /// Classify a text
    async fn classify(&self, text: &str) -> Result<ClassificationResult>;

    /// Backend name for logs and health output
    fn backend_name(&self) -> &str;

    /// Whether the backend loaded successfully
    fn is_ready(&self) -> bool {
        true
    }
}

/// Reject empty and whitespace-only input. Backends classify the text
/// untrimmed, as the vectorizer saw it during training.
pub fn ensure_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(SpamError::EmptyInput);
    }
    Ok(())
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

pub(crate) fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Stand-in for a backend that failed to load
pub struct UnavailableClassifier {
    backend: String,
    reason: String,
}

impl UnavailableClassifier {
    pub fn new(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait::async_trait]
impl TextClassifier for UnavailableClassifier {
    async fn classify(&self, text: &str) -> Result<ClassificationResult> {
        ensure_text(text)?;
        Err(SpamError::ModelUnavailable(self.reason.clone()))
    }

    fn backend_name(&self) -> &str {
        &self.backend
    }

    fn is_ready(&self) -> bool {
        false
    }
}

/// Build the configured classifier.
///
/// Load failures are logged and yield an [`UnavailableClassifier`] so the
/// service keeps running in degraded mode.
pub fn load_classifier(config: &ClassifierConfig) -> Arc<dyn TextClassifier> {
    let loaded: Result<Arc<dyn TextClassifier>> = match config.backend {
        ClassifierBackend::Vectorizer => {
            ClassicalClassifier::load(&config.vectorizer_path, &config.model_path)
                .map(|c| Arc::new(c) as Arc<dyn TextClassifier>)
        }
        ClassifierBackend::Onnx => OnnxClassifier::load(&config.vectorizer_path, &config.onnx)
            .map(|c| Arc::new(c) as Arc<dyn TextClassifier>),
        ClassifierBackend::Transformer => TransformerClassifier::load(&config.transformer)
            .map(|c| Arc::new(c) as Arc<dyn TextClassifier>),
        ClassifierBackend::Mock => Ok(Arc::new(MockClassifier::new())),
    };

    match loaded {
        Ok(classifier) => {
            info!("Classifier loaded: {}", classifier.backend_name());
            classifier
        }
        Err(e) => {
            let backend = config.backend.as_str();
            error!("Failed to load {} classifier: {}", backend, e);
            Arc::new(UnavailableClassifier::new(backend, e.to_string()))
        }
    }
}
