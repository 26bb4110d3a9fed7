//! ONNX Runtime backend
//!
//! Runs exported classifiers in-process. [`OnnxClassifier`] feeds vectorizer
//! features to a converted scikit-learn pipeline (skl2onnx with
//! `zipmap=False`, so class probabilities come back as a plain tensor).
//! [`OnnxModel`] is shared with the transformer backend.

use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::{DynValue, Tensor};
use std::fmt::Display;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::vectorizer::{Features, Vectorizer};
use super::{ensure_text, sigmoid, softmax, ClassificationResult, TextClassifier};
use crate::config::OnnxConfig;
use crate::error::{Result, SpamError};

/// How the selected model output encodes class scores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreKind {
    /// Already normalized class probabilities
    Probabilities,
    /// Raw logits, normalized with softmax (or sigmoid for a single column)
    Logits,
}

fn session_error(e: impl Display) -> SpamError {
    SpamError::ModelUnavailable(format!("Failed to build ONNX session: {}", e))
}

fn inference_error(e: impl Display) -> SpamError {
    SpamError::Inference(format!("ONNX inference failed: {}", e))
}

/// ONNX session with its input names and the resolved score output
pub struct OnnxModel {
    session: Mutex<Session>,
    inputs: Vec<String>,
    output: usize,
    kind: ScoreKind,
}

impl OnnxModel {
    /// Load a model file and resolve the named score output
    pub fn load(path: &Path, output: &str, kind: ScoreKind, intra_threads: usize) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            SpamError::ModelUnavailable(format!("Failed to read model {}: {}", path.display(), e))
        })?;

        let session = Session::builder()
            .map_err(session_error)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(session_error)?
            .with_intra_threads(intra_threads)
            .map_err(session_error)?
            .commit_from_memory(&bytes)
            .map_err(session_error)?;

        let inputs: Vec<String> = session.inputs.iter().map(|i| i.name.clone()).collect();
        let outputs: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();

        let output_index = outputs.iter().position(|name| name == output).ok_or_else(|| {
            SpamError::ModelUnavailable(format!(
                "Model {} has no output '{}' (outputs: {:?})",
                path.display(),
                output,
                outputs
            ))
        })?;

        info!(
            "ONNX model {} loaded: inputs {:?}, scores from '{}'",
            path.display(),
            inputs,
            output
        );

        Ok(Self {
            session: Mutex::new(session),
            inputs,
            output: output_index,
            kind,
        })
    }

    /// Declared input names, in graph order
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn kind(&self) -> ScoreKind {
        self.kind
    }

    /// Run one example and return the flattened score output
    pub fn run(&self, inputs: Vec<(String, DynValue)>) -> Result<Vec<f32>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| SpamError::Internal("ONNX session lock poisoned".to_string()))?;

        let outputs = session.run(inputs).map_err(inference_error)?;
        let scores = outputs[self.output]
            .try_extract_array::<f32>()
            .map_err(inference_error)?;

        let values: Vec<f32> = scores.iter().copied().collect();
        Ok(values)
    }

    /// Spam probability from one example's scores
    pub fn spam_probability(&self, scores: &[f32], spam_index: usize) -> Result<f64> {
        spam_probability(scores, self.kind, spam_index)
    }
}

/// Turn one example's class scores into the spam probability.
///
/// A single column is the spam score itself (binary heads exported with one
/// output unit).
pub fn spam_probability(scores: &[f32], kind: ScoreKind, spam_index: usize) -> Result<f64> {
    let scores: Vec<f64> = scores.iter().map(|&s| f64::from(s)).collect();

    match (scores.as_slice(), kind) {
        ([], _) => Err(SpamError::Inference("Model returned no scores".to_string())),
        ([single], ScoreKind::Probabilities) => Ok(*single),
        ([single], ScoreKind::Logits) => Ok(sigmoid(*single)),
        (all, kind) => {
            let probabilities = match kind {
                ScoreKind::Probabilities => all.to_vec(),
                ScoreKind::Logits => softmax(all),
            };
            probabilities.get(spam_index).copied().ok_or_else(|| {
                SpamError::Inference(format!(
                    "Spam class index {} out of range for {} classes",
                    spam_index,
                    probabilities.len()
                ))
            })
        }
    }
}

/// Dense single-row input from sparse features
fn dense_row(features: &Features, dimension: usize) -> Array2<f32> {
    let mut row = Array2::<f32>::zeros((1, dimension));
    for (&index, &value) in features {
        row[[0, index]] = value as f32;
    }
    row
}

struct Inner {
    vectorizer: Vectorizer,
    model: OnnxModel,
    input: String,
    spam_index: usize,
}

impl Inner {
    fn predict(&self, text: &str) -> Result<ClassificationResult> {
        let features = self.vectorizer.transform(text);
        let row = dense_row(&features, self.vectorizer.dimension());
        let tensor = Tensor::from_array(row).map_err(inference_error)?.into_dyn();

        let scores = self.model.run(vec![(self.input.clone(), tensor)])?;
        let probability = self.model.spam_probability(&scores, self.spam_index)?;

        debug!(
            "ONNX: {} active features, spam probability {:.4}",
            features.len(),
            probability
        );

        Ok(ClassificationResult::from_probability(probability))
    }
}

/// Vectorizer + ONNX classifier
pub struct OnnxClassifier {
    inner: Arc<Inner>,
}

impl OnnxClassifier {
    /// Pair a vectorizer with a loaded model taking a single feature input
    pub fn new(vectorizer: Vectorizer, model: OnnxModel, spam_index: usize) -> Result<Self> {
        let input = match model.inputs() {
            [only] => only.clone(),
            other => {
                return Err(SpamError::ModelUnavailable(format!(
                    "Expected a single feature input, model declares {:?}",
                    other
                )))
            }
        };

        Ok(Self {
            inner: Arc::new(Inner {
                vectorizer,
                model,
                input,
                spam_index,
            }),
        })
    }

    /// Load the vectorizer artifact and the ONNX model
    pub fn load(vectorizer_path: &Path, config: &OnnxConfig) -> Result<Self> {
        info!(
            "Loading vectorizer from {} and ONNX model from {}",
            vectorizer_path.display(),
            config.model_path.display()
        );

        let vectorizer = Vectorizer::from_file(vectorizer_path)?;
        let model = OnnxModel::load(
            &config.model_path,
            &config.output,
            ScoreKind::Probabilities,
            config.intra_threads,
        )?;
        Self::new(vectorizer, model, config.spam_index)
    }
}

#[async_trait::async_trait]
impl TextClassifier for OnnxClassifier {
    async fn classify(&self, text: &str) -> Result<ClassificationResult> {
        ensure_text(text)?;
        let text = text.to_string();
        let inner = Arc::clone(&self.inner);

        tokio::task::spawn_blocking(move || inner.predict(&text))
            .await
            .map_err(|e| SpamError::Internal(format!("Inference task failed: {}", e)))?
    }

    fn backend_name(&self) -> &str {
        "onnx"
    }
}
