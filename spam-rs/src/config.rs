//! Configuration for spam-rs
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `SPAM_RS__<SECTION>__<KEY>` environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SpamError};
use crate::fusion::FusionConfig;

/// Environment variable holding the OCR vendor API key
pub const OCR_API_KEY_ENV: &str = "OCR_SPACE_API_KEY";

/// Main service configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub fusion: FusionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0:5000")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Maximum accepted request body, uploads included
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Which text classifier to load at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierBackend {
    /// Vectorizer + linear model weights from JSON artifacts
    Vectorizer,
    /// Vectorizer + converted scikit-learn model run by ONNX Runtime
    Onnx,
    /// Fine-tuned BERT sequence classifier run by ONNX Runtime
    Transformer,
    /// Keyword classifier for development
    Mock,
}

impl ClassifierBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierBackend::Vectorizer => "vectorizer",
            ClassifierBackend::Onnx => "onnx",
            ClassifierBackend::Transformer => "transformer",
            ClassifierBackend::Mock => "mock",
        }
    }
}

/// Text classifier configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_classifier_backend")]
    pub backend: ClassifierBackend,
    /// Path to the JSON linear model artifact (vectorizer backend)
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    /// Path to the vectorizer artifact (vectorizer and onnx backends)
    #[serde(default = "default_vectorizer_path")]
    pub vectorizer_path: PathBuf,
    #[serde(default)]
    pub onnx: OnnxConfig,
    #[serde(default)]
    pub transformer: TransformerConfig,
}

/// Converted scikit-learn model
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OnnxConfig {
    #[serde(default = "default_onnx_model_path")]
    pub model_path: PathBuf,
    /// Output holding class probabilities
    #[serde(default = "default_probability_output")]
    pub output: String,
    /// Column of the spam class
    #[serde(default = "default_spam_index")]
    pub spam_index: usize,
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
}

/// Exported BERT sequence classifier
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransformerConfig {
    #[serde(default = "default_transformer_model_path")]
    pub model_path: PathBuf,
    /// HuggingFace `tokenizer.json` matching the model
    #[serde(default = "default_tokenizer_path")]
    pub tokenizer_path: PathBuf,
    /// Token limit, longer texts are truncated
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    /// Output holding the logits
    #[serde(default = "default_logits_output")]
    pub output: String,
    /// Column of the spam class (LABEL_1 for a two-label head)
    #[serde(default = "default_spam_index")]
    pub spam_index: usize,
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
}

/// Which OCR service to call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrBackend {
    /// OCR.space compatible vendor API
    OcrSpace,
    /// Canned extractor for development
    Mock,
}

/// OCR vendor configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OcrConfig {
    #[serde(default = "default_ocr_backend")]
    pub backend: OcrBackend,
    /// Vendor endpoint
    #[serde(default = "default_ocr_endpoint")]
    pub endpoint: String,
    /// API key; falls back to the OCR_SPACE_API_KEY environment variable
    #[serde(default)]
    pub api_key: Option<String>,
    /// Language hint sent with every request
    #[serde(default = "default_ocr_language")]
    pub language: String,
    /// Vendor OCR engine selector
    #[serde(default = "default_ocr_engine")]
    pub engine: u8,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_listen_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024 // 10MB
}

fn default_classifier_backend() -> ClassifierBackend {
    ClassifierBackend::Onnx
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/spam_detector_model.json")
}

fn default_vectorizer_path() -> PathBuf {
    PathBuf::from("models/vectorizer.json")
}

fn default_onnx_model_path() -> PathBuf {
    PathBuf::from("models/spam_detector_model.onnx")
}

fn default_probability_output() -> String {
    "probabilities".to_string()
}

fn default_spam_index() -> usize {
    1
}

fn default_intra_threads() -> usize {
    1
}

fn default_transformer_model_path() -> PathBuf {
    PathBuf::from("models/bert/model.onnx")
}

fn default_tokenizer_path() -> PathBuf {
    PathBuf::from("models/bert/tokenizer.json")
}

fn default_max_length() -> usize {
    512
}

fn default_logits_output() -> String {
    "logits".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_ocr_backend() -> OcrBackend {
    OcrBackend::OcrSpace
}

fn default_ocr_endpoint() -> String {
    "https://api.ocr.space/parse/image".to_string()
}

fn default_ocr_language() -> String {
    "cht".to_string()
}

fn default_ocr_engine() -> u8 {
    2
}

fn default_log_level() -> String {
    "spam_rs=info,tower_http=info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            backend: default_classifier_backend(),
            model_path: default_model_path(),
            vectorizer_path: default_vectorizer_path(),
            onnx: OnnxConfig::default(),
            transformer: TransformerConfig::default(),
        }
    }
}

impl Default for OnnxConfig {
    fn default() -> Self {
        Self {
            model_path: default_onnx_model_path(),
            output: default_probability_output(),
            spam_index: default_spam_index(),
            intra_threads: default_intra_threads(),
        }
    }
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            model_path: default_transformer_model_path(),
            tokenizer_path: default_tokenizer_path(),
            max_length: default_max_length(),
            output: default_logits_output(),
            spam_index: default_spam_index(),
            intra_threads: default_intra_threads(),
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            backend: default_ocr_backend(),
            endpoint: default_ocr_endpoint(),
            api_key: None,
            language: default_ocr_language(),
            engine: default_ocr_engine(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load layered configuration: defaults, optional file, environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path));
        }

        let settings = builder
            .add_source(
                ::config::Environment::with_prefix("SPAM_RS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| SpamError::Config(format!("Failed to load config: {}", e)))?;

        let mut config: Config = settings
            .try_deserialize()
            .map_err(|e| SpamError::Config(format!("Failed to parse config: {}", e)))?;

        if config.ocr.api_key.is_none() {
            config.ocr.api_key = std::env::var(OCR_API_KEY_ENV).ok().filter(|k| !k.is_empty());
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.max_body_bytes == 0 {
            return Err(SpamError::Config("server.max_body_bytes must be > 0".to_string()));
        }

        if self.ocr.timeout_seconds == 0 {
            return Err(SpamError::Config("ocr.timeout_seconds must be at least one".to_string()));
        }

        let transformer = &self.classifier.transformer;
        if transformer.max_length < 2 {
            return Err(SpamError::Config(
                "classifier.transformer.max_length must leave room for special tokens".to_string(),
            ));
        }

        if self.classifier.onnx.intra_threads == 0 || transformer.intra_threads == 0 {
            return Err(SpamError::Config("intra_threads must be > 0".to_string()));
        }

        if self.ocr.backend == OcrBackend::OcrSpace {
            url::Url::parse(&self.ocr.endpoint).map_err(|e| {
                SpamError::Config(format!("Invalid OCR endpoint '{}': {}", self.ocr.endpoint, e))
            })?;
        }

        self.fusion.validate()
    }
}
