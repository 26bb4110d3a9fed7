//! Vectorizer + classical linear model backend
//!
//! Evaluates logistic regression or multinomial naive Bayes weights exported
//! to JSON, without the ONNX runtime. Use the `onnx` backend for converted
//! scikit-learn pipelines; this one covers deployments that ship plain weight
//! files.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::vectorizer::{Features, Vectorizer};
use super::{ensure_text, sigmoid, ClassificationResult, TextClassifier};
use crate::error::{Result, SpamError};

/// Exported model weights, tagged by model family
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinearModel {
    /// Binary logistic regression
    LogisticRegression { coef: Vec<f64>, intercept: f64 },
    /// Multinomial naive Bayes, classes ordered [ham, spam]
    MultinomialNb {
        class_log_prior: [f64; 2],
        feature_log_prob: [Vec<f64>; 2],
    },
}

impl LinearModel {
    /// Load from a JSON artifact file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SpamError::ModelUnavailable(format!("Failed to read model {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            SpamError::ModelUnavailable(format!("Failed to parse model {}: {}", path.display(), e))
        })
    }

    /// Number of input features the model expects
    pub fn dimension(&self) -> Result<usize> {
        match self {
            LinearModel::LogisticRegression { coef, .. } => Ok(coef.len()),
            LinearModel::MultinomialNb {
                feature_log_prob, ..
            } => {
                let [ham, spam] = feature_log_prob;
                if ham.len() != spam.len() {
                    return Err(SpamError::ModelUnavailable(format!(
                        "Naive Bayes class feature counts differ ({} vs {})",
                        ham.len(),
                        spam.len()
                    )));
                }
                Ok(ham.len())
            }
        }
    }

    /// Spam-class probability for a feature vector
    pub fn spam_probability(&self, features: &Features) -> f64 {
        match self {
            LinearModel::LogisticRegression { coef, intercept } => {
                let z: f64 = intercept + features.iter().map(|(&i, x)| coef[i] * x).sum::<f64>();
                sigmoid(z)
            }
            LinearModel::MultinomialNb {
                class_log_prior,
                feature_log_prob,
            } => {
                let jll = |class: usize| {
                    class_log_prior[class]
                        + features
                            .iter()
                            .map(|(&i, x)| feature_log_prob[class][i] * x)
                            .sum::<f64>()
                };
                let (ham, spam) = (jll(0), jll(1));
                let max = ham.max(spam);
                let log_total = max + ((ham - max).exp() + (spam - max).exp()).ln();
                (spam - log_total).exp()
            }
        }
    }
}

struct Inner {
    vectorizer: Vectorizer,
    model: LinearModel,
}

/// Vectorizer + linear model classifier
pub struct ClassicalClassifier {
    inner: Arc<Inner>,
    backend_name: String,
}

impl ClassicalClassifier {
    /// Pair a vectorizer with a model, checking dimensions agree
    pub fn new(vectorizer: Vectorizer, model: LinearModel) -> Result<Self> {
        let model_dim = model.dimension()?;
        if model_dim != vectorizer.dimension() {
            return Err(SpamError::ModelUnavailable(format!(
                "Model expects {} features but vectorizer produces {}",
                model_dim,
                vectorizer.dimension()
            )));
        }

        let backend_name = match model {
            LinearModel::LogisticRegression { .. } => "vectorizer/logistic_regression",
            LinearModel::MultinomialNb { .. } => "vectorizer/multinomial_nb",
        }
        .to_string();

        Ok(Self {
            inner: Arc::new(Inner { vectorizer, model }),
            backend_name,
        })
    }

    /// Load both artifacts from disk
    pub fn load(vectorizer_path: &Path, model_path: &Path) -> Result<Self> {
        info!(
            "Loading vectorizer from {} and model from {}",
            vectorizer_path.display(),
            model_path.display()
        );

        let vectorizer = Vectorizer::from_file(vectorizer_path)?;
        let model = LinearModel::from_file(model_path)?;
        Self::new(vectorizer, model)
    }
}

impl Inner {
    fn predict(&self, text: &str) -> ClassificationResult {
        let features = self.vectorizer.transform(text);
        let probability = self.model.spam_probability(&features);
        debug!(
            "Classical: {} active features, spam probability {:.4}",
            features.len(),
            probability
        );
        ClassificationResult::from_probability(probability)
    }
}

#[async_trait::async_trait]
impl TextClassifier for ClassicalClassifier {
    async fn classify(&self, text: &str) -> Result<ClassificationResult> {
        ensure_text(text)?;
        let text = text.to_string();
        let inner = Arc::clone(&self.inner);

        tokio::task::spawn_blocking(move || inner.predict(&text))
            .await
            .map_err(|e| SpamError::Internal(format!("Inference task failed: {}", e)))
    }

    fn backend_name(&self) -> &str {
        &self.backend_name
    }
}
