//! Score fusion
//!
//! Turns the per-channel classifier confidence into a banded weighted score
//! and combines the text and image channels into one decision.
//!
//! A single labeled channel passes its label through unchanged, so an absent
//! channel never votes "ham" against a confident spam signal. When both
//! channels are labeled, the summed weighted score is compared against
//! `combined_threshold`.

use serde::{Deserialize, Deserializer, Serialize};

use crate::classifier::{ClassificationResult, Label};
use crate::error::{Result, SpamError};

/// Input modality contributing to fusion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Text,
    Image,
}

/// Score contributed by each confidence band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelWeights {
    /// Score when confidence > high_confidence
    pub high: f64,
    /// Score when spam_confidence < confidence <= high_confidence
    pub mid: f64,
}

impl ChannelWeights {
    pub fn new(high: f64, mid: f64) -> Self {
        Self { high, mid }
    }
}

/// Weights as written in config; unset fields keep the channel default
#[derive(Debug, Default, Deserialize)]
struct WeightOverrides {
    high: Option<f64>,
    mid: Option<f64>,
}

impl WeightOverrides {
    fn over(self, defaults: ChannelWeights) -> ChannelWeights {
        ChannelWeights {
            high: self.high.unwrap_or(defaults.high),
            mid: self.mid.unwrap_or(defaults.mid),
        }
    }
}

fn text_weights<'de, D>(deserializer: D) -> std::result::Result<ChannelWeights, D::Error>
where
    D: Deserializer<'de>,
{
    WeightOverrides::deserialize(deserializer).map(|w| w.over(default_text_weights()))
}

fn image_weights<'de, D>(deserializer: D) -> std::result::Result<ChannelWeights, D::Error>
where
    D: Deserializer<'de>,
{
    WeightOverrides::deserialize(deserializer).map(|w| w.over(default_image_weights()))
}

/// Fusion thresholds and channel weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    #[serde(default = "default_text_weights", deserialize_with = "text_weights")]
    pub text: ChannelWeights,
    #[serde(default = "default_image_weights", deserialize_with = "image_weights")]
    pub image: ChannelWeights,
    /// Confidence above which a channel scores `high`
    #[serde(default = "default_high_confidence")]
    pub high_confidence: f64,
    /// Confidence above which a channel is labeled spam
    #[serde(default = "default_spam_confidence")]
    pub spam_confidence: f64,
    /// Total score at or above which two labeled channels fuse to spam
    #[serde(default = "default_combined_threshold")]
    pub combined_threshold: f64,
}

fn default_text_weights() -> ChannelWeights {
    ChannelWeights::new(1.0, 0.5)
}

fn default_image_weights() -> ChannelWeights {
    ChannelWeights::new(1.5, 0.75)
}

fn default_high_confidence() -> f64 {
    0.75
}

fn default_spam_confidence() -> f64 {
    0.5
}

fn default_combined_threshold() -> f64 {
    1.5
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            text: default_text_weights(),
            image: default_image_weights(),
            high_confidence: default_high_confidence(),
            spam_confidence: default_spam_confidence(),
            combined_threshold: default_combined_threshold(),
        }
    }
}

impl FusionConfig {
    /// Validate weights and thresholds
    pub fn validate(&self) -> Result<()> {
        for (name, weights) in [("text", &self.text), ("image", &self.image)] {
            if !(weights.mid >= 0.0 && weights.high >= weights.mid && weights.high.is_finite()) {
                return Err(SpamError::Config(format!(
                    "fusion.{} weights must satisfy 0 <= mid <= high (got high={}, mid={})",
                    name, weights.high, weights.mid
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.spam_confidence)
            || !(0.0..=1.0).contains(&self.high_confidence)
            || self.spam_confidence > self.high_confidence
        {
            return Err(SpamError::Config(format!(
                "fusion thresholds must satisfy 0 <= spam_confidence <= high_confidence <= 1 (got {}, {})",
                self.spam_confidence, self.high_confidence
            )));
        }

        if !(self.combined_threshold >= 0.0 && self.combined_threshold.is_finite()) {
            return Err(SpamError::Config(
                "fusion.combined_threshold must be non-negative".to_string(),
            ));
        }

        Ok(())
    }

    fn weights(&self, channel: Channel) -> &ChannelWeights {
        match channel {
            Channel::Text => &self.text,
            Channel::Image => &self.image,
        }
    }
}

/// Banded contribution of one present channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelScore {
    pub source: Channel,
    /// Band label; `None` only if the classifier itself had no opinion
    pub label: Option<Label>,
    pub weighted_score: f64,
    /// Spam probability the score was derived from
    pub confidence: f64,
}

/// Final decision for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionResult {
    pub final_label: Label,
    pub total_score: f64,
    pub per_channel: Vec<ChannelScore>,
}

impl FusionResult {
    /// Score for a channel, if it was present
    pub fn channel(&self, channel: Channel) -> Option<&ChannelScore> {
        self.per_channel.iter().find(|c| c.source == channel)
    }
}

/// Fusion engine
#[derive(Debug, Clone, Default)]
pub struct ScoreFusion {
    config: FusionConfig,
}

impl ScoreFusion {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Band one classification result into a channel score
    pub fn score_channel(
        &self,
        channel: Channel,
        result: Option<&ClassificationResult>,
    ) -> Option<ChannelScore> {
        let result = result?;
        let weights = self.config.weights(channel);
        let p = result.confidence;

        let (weighted_score, label) = if result.label == Label::Unknown {
            (0.0, None)
        } else if p > self.config.high_confidence {
            (weights.high, Some(Label::Spam))
        } else if p > self.config.spam_confidence {
            (weights.mid, Some(Label::Spam))
        } else {
            (0.0, Some(Label::Ham))
        };

        Some(ChannelScore {
            source: channel,
            label,
            weighted_score,
            confidence: p,
        })
    }

    /// Combine the text and image channels
    pub fn fuse(
        &self,
        text: Option<&ClassificationResult>,
        image: Option<&ClassificationResult>,
    ) -> FusionResult {
        let per_channel: Vec<ChannelScore> = [
            self.score_channel(Channel::Text, text),
            self.score_channel(Channel::Image, image),
        ]
        .into_iter()
        .flatten()
        .collect();

        let total_score: f64 = per_channel.iter().map(|c| c.weighted_score).sum();
        let labels: Vec<Label> = per_channel.iter().filter_map(|c| c.label).collect();

        let final_label = match labels.as_slice() {
            [] => Label::Unknown,
            [only] => *only,
            _ if total_score >= self.config.combined_threshold => Label::Spam,
            _ => Label::Ham,
        };

        FusionResult {
            final_label,
            total_score,
            per_channel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(p: f64) -> ClassificationResult {
        ClassificationResult::from_probability(p)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_banding_per_probability() {
        let fusion = ScoreFusion::default();

        for p in [0.76, 0.9, 1.0] {
            let score = fusion.score_channel(Channel::Text, Some(&result(p))).unwrap();
            assert_eq!(score.weighted_score, 1.0);
            assert_eq!(score.label, Some(Label::Spam));
        }

        for p in [0.51, 0.6, 0.75] {
            let score = fusion.score_channel(Channel::Text, Some(&result(p))).unwrap();
            assert_eq!(score.weighted_score, 0.5);
            assert_eq!(score.label, Some(Label::Spam));
        }

        for p in [0.0, 0.2, 0.5] {
            let score = fusion.score_channel(Channel::Text, Some(&result(p))).unwrap();
            assert_eq!(score.weighted_score, 0.0);
            assert_eq!(score.label, Some(Label::Ham));
        }
    }

    #[test]
    fn test_image_channel_uses_image_weights() {
        let fusion = ScoreFusion::default();

        let high = fusion.score_channel(Channel::Image, Some(&result(0.8))).unwrap();
        assert_eq!(high.weighted_score, 1.5);

        let mid = fusion.score_channel(Channel::Image, Some(&result(0.7))).unwrap();
        assert_eq!(mid.weighted_score, 0.75);
    }

    #[test]
    fn test_absent_channel_contributes_nothing() {
        let fusion = ScoreFusion::default();
        assert!(fusion.score_channel(Channel::Image, None).is_none());
    }

    #[test]
    fn test_both_high_is_spam() {
        let fusion = ScoreFusion::default();
        let fused = fusion.fuse(Some(&result(0.9)), Some(&result(0.9)));

        assert!(approx(fused.total_score, 2.5));
        assert_eq!(fused.final_label, Label::Spam);
        assert_eq!(fused.per_channel.len(), 2);
    }

    #[test]
    fn test_mid_text_and_ham_image_is_ham() {
        let fusion = ScoreFusion::default();
        let fused = fusion.fuse(Some(&result(0.6)), Some(&result(0.4)));

        assert!(approx(fused.total_score, 0.5));
        assert_eq!(fused.final_label, Label::Ham);
        assert_eq!(fused.channel(Channel::Image).unwrap().label, Some(Label::Ham));
        assert_eq!(fused.channel(Channel::Image).unwrap().weighted_score, 0.0);
    }

    #[test]
    fn test_swapping_channels_changes_total() {
        let fusion = ScoreFusion::default();

        let a = fusion.fuse(Some(&result(0.9)), Some(&result(0.6)));
        let b = fusion.fuse(Some(&result(0.6)), Some(&result(0.9)));

        assert!(approx(a.total_score, 1.75));
        assert!(approx(b.total_score, 2.0));
        assert_ne!(a.total_score, b.total_score);
    }

    #[test]
    fn test_single_text_channel_passes_label_through() {
        let fusion = ScoreFusion::default();

        // 0.5 total is below the combined threshold, label still spam
        let fused = fusion.fuse(Some(&result(0.6)), None);
        assert_eq!(fused.final_label, Label::Spam);
        assert!(approx(fused.total_score, 0.5));
        assert!(fused.channel(Channel::Image).is_none());

        let fused = fusion.fuse(Some(&result(0.1)), None);
        assert_eq!(fused.final_label, Label::Ham);
    }

    #[test]
    fn test_single_image_channel_passes_label_through() {
        let fusion = ScoreFusion::default();
        let fused = fusion.fuse(None, Some(&result(0.7)));

        assert_eq!(fused.final_label, Label::Spam);
        assert!(approx(fused.total_score, 0.75));
    }

    #[test]
    fn test_no_channels_is_unknown() {
        let fusion = ScoreFusion::default();
        let fused = fusion.fuse(None, None);

        assert_eq!(fused.final_label, Label::Unknown);
        assert_eq!(fused.total_score, 0.0);
        assert!(fused.per_channel.is_empty());
    }

    #[test]
    fn test_custom_weights() {
        let config = FusionConfig {
            text: ChannelWeights::new(2.0, 1.0),
            image: ChannelWeights::new(2.0, 1.0),
            combined_threshold: 3.0,
            ..FusionConfig::default()
        };
        let fusion = ScoreFusion::new(config);

        let fused = fusion.fuse(Some(&result(0.9)), Some(&result(0.6)));
        assert!(approx(fused.total_score, 3.0));
        assert_eq!(fused.final_label, Label::Spam);
    }

    #[test]
    fn test_validate_rejects_inverted_weights() {
        let config = FusionConfig {
            image: ChannelWeights::new(0.5, 1.0),
            ..FusionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let config = FusionConfig {
            spam_confidence: 0.8,
            high_confidence: 0.7,
            ..FusionConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(FusionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_nan() {
        let nan_weight = FusionConfig {
            text: ChannelWeights::new(f64::NAN, 0.5),
            ..FusionConfig::default()
        };
        assert!(nan_weight.validate().is_err());

        let nan_mid = FusionConfig {
            image: ChannelWeights::new(1.5, f64::NAN),
            ..FusionConfig::default()
        };
        assert!(nan_mid.validate().is_err());

        let nan_threshold = FusionConfig {
            combined_threshold: f64::NAN,
            ..FusionConfig::default()
        };
        assert!(nan_threshold.validate().is_err());

        let nan_confidence = FusionConfig {
            high_confidence: f64::NAN,
            ..FusionConfig::default()
        };
        assert!(nan_confidence.validate().is_err());
    }

    #[test]
    fn test_partial_weights_keep_channel_defaults() {
        let config: FusionConfig = toml::from_str("[text]\nhigh = 2.0\n\n[image]\nmid = 1.0").unwrap();

        assert_eq!(config.text, ChannelWeights::new(2.0, 0.5));
        assert_eq!(config.image, ChannelWeights::new(1.5, 1.0));
        assert!(config.validate().is_ok());

        let config: FusionConfig = toml::from_str("combined_threshold = 2.0").unwrap();
        assert_eq!(config.text, ChannelWeights::new(1.0, 0.5));
        assert_eq!(config.image, ChannelWeights::new(1.5, 0.75));
    }
}
