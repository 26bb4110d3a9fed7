//! spam-rs: spam classification for text and images
//!
//! Classifies short (mostly Chinese) texts as spam or ham, extracts text from
//! uploaded images through an OCR vendor, and fuses both channels into one
//! decision.
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! listen_addr = "0.0.0.0:5000"
//!
//! [classifier]
//! backend = "onnx"
//! vectorizer_path = "models/vectorizer.json"
//!
//! [classifier.onnx]
//! model_path = "models/spam_detector_model.onnx"
//!
//! [ocr]
//! language = "cht"
//! timeout_seconds = 30
//!
//! [fusion.image]
//! high = 1.5
//! mid = 0.75
//! ```
//!
//! # Modules
//!
//! - [`classifier`]: text classifier trait and backends
//! - [`ocr`]: image text extraction
//! - [`fusion`]: channel weighting and fused decision
//! - [`api`]: HTTP router and handlers
//! - [`config`]: layered configuration
//! - [`error`]: error types

pub mod api;
pub mod classifier;
pub mod config;
pub mod error;
pub mod fusion;
pub mod ocr;

pub use classifier::{ClassificationResult, Label, TextClassifier};
pub use config::Config;
pub use error::{Result, SpamError};
pub use fusion::{FusionResult, ScoreFusion};
pub use ocr::ImageTextExtractor;
