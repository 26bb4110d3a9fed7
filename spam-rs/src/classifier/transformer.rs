//! Transformer sequence-classification backend
//!
//! Runs a fine-tuned BERT classifier exported to ONNX in-process. Text is
//! tokenized with the model's `tokenizer.json`, truncated to `max_length`,
//! and softmax is applied to the returned logits.

use ndarray::Array2;
use ort::value::Tensor;
use std::sync::Arc;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

use super::onnx::{OnnxModel, ScoreKind};
use super::{ensure_text, ClassificationResult, TextClassifier};
use crate::config::TransformerConfig;
use crate::error::{Result, SpamError};

/// Graph inputs the tokenizer can fill
const SUPPORTED_INPUTS: [&str; 3] = ["input_ids", "attention_mask", "token_type_ids"];

struct Inner {
    tokenizer: Tokenizer,
    model: OnnxModel,
    spam_index: usize,
}

/// In-process transformer classifier
pub struct TransformerClassifier {
    inner: Arc<Inner>,
}

impl TransformerClassifier {
    /// Pair a tokenizer with a loaded sequence-classification model
    pub fn new(tokenizer: Tokenizer, model: OnnxModel, spam_index: usize) -> Result<Self> {
        if !model.inputs().iter().any(|name| name == "input_ids") {
            return Err(SpamError::ModelUnavailable(format!(
                "Model has no input_ids input (inputs: {:?})",
                model.inputs()
            )));
        }

        if let Some(name) = model
            .inputs()
            .iter()
            .find(|name| !SUPPORTED_INPUTS.contains(&name.as_str()))
        {
            return Err(SpamError::ModelUnavailable(format!(
                "Unsupported model input '{}'",
                name
            )));
        }

        Ok(Self {
            inner: Arc::new(Inner {
                tokenizer,
                model,
                spam_index,
            }),
        })
    }

    /// Load the tokenizer and the ONNX model
    pub fn load(config: &TransformerConfig) -> Result<Self> {
        info!(
            "Loading tokenizer from {} and transformer from {}",
            config.tokenizer_path.display(),
            config.model_path.display()
        );

        let mut tokenizer = Tokenizer::from_file(&config.tokenizer_path).map_err(|e| {
            SpamError::ModelUnavailable(format!(
                "Failed to load tokenizer {}: {}",
                config.tokenizer_path.display(),
                e
            ))
        })?;

        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_length,
                ..Default::default()
            }))
            .map_err(|e| SpamError::ModelUnavailable(format!("Invalid truncation: {}", e)))?;

        let model = OnnxModel::load(
            &config.model_path,
            &config.output,
            ScoreKind::Logits,
            config.intra_threads,
        )?;

        Self::new(tokenizer, model, config.spam_index)
    }
}

impl Inner {
    fn predict(&self, text: &str) -> Result<ClassificationResult> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| SpamError::Inference(format!("Tokenization failed: {}", e)))?;
        let length = encoding.get_ids().len();

        let mut inputs = Vec::with_capacity(self.model.inputs().len());
        for name in self.model.inputs() {
            let values = match name.as_str() {
                "input_ids" => encoding.get_ids(),
                "attention_mask" => encoding.get_attention_mask(),
                _ => encoding.get_type_ids(),
            };

            let array = Array2::from_shape_vec(
                (1, length),
                values.iter().map(|&v| i64::from(v)).collect(),
            )
            .map_err(|e| SpamError::Inference(format!("Bad {} shape: {}", name, e)))?;

            let tensor = Tensor::from_array(array)
                .map_err(|e| SpamError::Inference(format!("Bad {} tensor: {}", name, e)))?;
            inputs.push((name.clone(), tensor.into_dyn()));
        }

        let logits = self.model.run(inputs)?;
        let probability = self.model.spam_probability(&logits, self.spam_index)?;

        debug!(
            "Transformer: {} tokens, spam probability {:.4}",
            length, probability
        );

        Ok(ClassificationResult::from_probability(probability))
    }
}

#[async_trait::async_trait]
impl TextClassifier for TransformerClassifier {
    async fn classify(&self, text: &str) -> Result<ClassificationResult> {
        ensure_text(text)?;
        let text = text.to_string();
        let inner = Arc::clone(&self.inner);

        tokio::task::spawn_blocking(move || inner.predict(&text))
            .await
            .map_err(|e| SpamError::Internal(format!("Inference task failed: {}", e)))?
    }

    fn backend_name(&self) -> &str {
        "transformer"
    }
}
