//! Bag-of-words / TF-IDF vectorizer
//!
//! Loads an exported vocabulary (and optional IDF weights) from JSON and
//! turns raw text into a sparse feature vector. Character n-grams are the
//! usual choice for Chinese text since it has no word separators.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

use crate::error::{Result, SpamError};

/// Sparse feature vector keyed by vocabulary index
pub type Features = BTreeMap<usize, f64>;

/// Word token pattern: two or more word characters
const TOKEN_PATTERN: &str = r"(?u)\b\w\w+\b";

/// How text is split into terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Analyzer {
    /// Character n-grams
    Char,
    /// Word n-grams
    Word,
}

/// Vector normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Norm {
    L1,
    L2,
}

/// On-disk vectorizer artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorizerArtifact {
    #[serde(default = "default_analyzer")]
    pub analyzer: Analyzer,
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),
    #[serde(default = "default_lowercase")]
    pub lowercase: bool,
    pub vocabulary: HashMap<String, usize>,
    /// Present for TF-IDF vectorizers
    #[serde(default)]
    pub idf: Option<Vec<f64>>,
    #[serde(default)]
    pub sublinear_tf: bool,
    #[serde(default)]
    pub norm: Option<Norm>,
}

fn default_analyzer() -> Analyzer {
    Analyzer::Word
}

fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

fn default_lowercase() -> bool {
    true
}

/// Loaded vectorizer, read-only after construction
#[derive(Debug)]
pub struct Vectorizer {
    analyzer: Analyzer,
    min_n: usize,
    max_n: usize,
    lowercase: bool,
    vocabulary: HashMap<String, usize>,
    idf: Option<Vec<f64>>,
    sublinear_tf: bool,
    norm: Option<Norm>,
    token_pattern: Regex,
    whitespace: Regex,
}

impl Vectorizer {
    /// Load from a JSON artifact file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SpamError::ModelUnavailable(format!(
                "Failed to read vectorizer {}: {}",
                path.display(),
                e
            ))
        })?;

        let artifact: VectorizerArtifact = serde_json::from_str(&content).map_err(|e| {
            SpamError::ModelUnavailable(format!(
                "Failed to parse vectorizer {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_artifact(artifact)
    }

    /// Build from a parsed artifact, validating its shape
    pub fn from_artifact(artifact: VectorizerArtifact) -> Result<Self> {
        let (min_n, max_n) = artifact.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(SpamError::ModelUnavailable(format!(
                "Invalid ngram_range ({}, {})",
                min_n, max_n
            )));
        }

        let size = artifact.vocabulary.len();
        if size == 0 {
            return Err(SpamError::ModelUnavailable("Vocabulary is empty".to_string()));
        }

        if let Some((term, index)) = artifact.vocabulary.iter().find(|(_, &i)| i >= size) {
            return Err(SpamError::ModelUnavailable(format!(
                "Vocabulary index {} for '{}' out of range (size {})",
                index, term, size
            )));
        }

        if let Some(idf) = &artifact.idf {
            if idf.len() != size {
                return Err(SpamError::ModelUnavailable(format!(
                    "IDF length {} does not match vocabulary size {}",
                    idf.len(),
                    size
                )));
            }
        }

        let token_pattern =
            Regex::new(TOKEN_PATTERN).map_err(|e| SpamError::Internal(e.to_string()))?;
        let whitespace = Regex::new(r"\s+").map_err(|e| SpamError::Internal(e.to_string()))?;

        debug!(
            "Vectorizer: {:?} analyzer, ngram ({}, {}), {} terms, tfidf={}",
            artifact.analyzer,
            min_n,
            max_n,
            size,
            artifact.idf.is_some()
        );

        Ok(Self {
            analyzer: artifact.analyzer,
            min_n,
            max_n,
            lowercase: artifact.lowercase,
            vocabulary: artifact.vocabulary,
            idf: artifact.idf,
            sublinear_tf: artifact.sublinear_tf,
            norm: artifact.norm,
            token_pattern,
            whitespace,
        })
    }

    /// Number of features produced
    pub fn dimension(&self) -> usize {
        self.vocabulary.len()
    }

    /// Split text into terms according to the analyzer
    pub fn analyze(&self, text: &str) -> Vec<String> {
        let text = if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        match self.analyzer {
            Analyzer::Char => self.char_ngrams(&text),
            Analyzer::Word => self.word_ngrams(&text),
        }
    }

    fn char_ngrams(&self, text: &str) -> Vec<String> {
        let normalized = self.whitespace.replace_all(text, " ");
        let chars: Vec<char> = normalized.chars().collect();
        let mut terms = Vec::new();

        for n in self.min_n..=self.max_n.min(chars.len()) {
            for window in chars.windows(n) {
                terms.push(window.iter().collect());
            }
        }

        terms
    }

    fn word_ngrams(&self, text: &str) -> Vec<String> {
        let tokens: Vec<&str> = self.token_pattern.find_iter(text).map(|m| m.as_str()).collect();
        let mut terms = Vec::new();

        for n in self.min_n..=self.max_n.min(tokens.len()) {
            for window in tokens.windows(n) {
                terms.push(window.join(" "));
            }
        }

        terms
    }

    /// Convert text into a sparse feature vector
    pub fn transform(&self, text: &str) -> Features {
        let mut features = Features::new();

        for term in self.analyze(text) {
            if let Some(&index) = self.vocabulary.get(&term) {
                *features.entry(index).or_insert(0.0) += 1.0;
            }
        }

        for (index, value) in features.iter_mut() {
            if self.sublinear_tf {
                *value = 1.0 + value.ln();
            }
            if let Some(idf) = &self.idf {
                *value *= idf[*index];
            }
        }

        if let Some(norm) = self.norm {
            let length = match norm {
                Norm::L1 => features.values().map(|v| v.abs()).sum::<f64>(),
                Norm::L2 => features.values().map(|v| v * v).sum::<f64>().sqrt(),
            };
            if length > 0.0 {
                for value in features.values_mut() {
                    *value /= length;
                }
            }
        }

        features
    }
}
