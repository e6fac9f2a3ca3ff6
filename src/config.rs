//! Learner configuration.
//!
//! All tunables are plain typed fields validated once at construction time.
//! Every section has a `Default` impl carrying the standard defaults, so a
//! working learner is `RuleSet::new(RulestreamConfig::default())`.

use serde::{Deserialize, Serialize};

use crate::error::RulestreamError;
use crate::voting::WeightPolicy;

/// Which estimator a rule reports predictions from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionMode {
    /// Use whichever of the two estimators currently has the lower error.
    /// Falls back to the target mean until the perceptron has warmed up.
    Adaptive,
    /// Always use the online linear model.
    Perceptron,
    /// Always use the running mean of the target.
    TargetMean,
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulestreamConfig {
    /// Hoeffding bound parameter. The allowable error in a split decision;
    /// values closer to 0 take longer to decide.
    pub split_confidence: f64,

    /// Threshold below which a split is forced to break ties.
    pub tie_threshold: f64,

    /// Number of instances a rule observes between split attempts.
    pub grace_period: u64,

    /// First-match-wins evaluation when true; all covering rules vote when
    /// false.
    pub ordered: bool,

    /// Estimator selection policy.
    pub prediction: PredictionMode,

    /// Percentage of attributes each rule observes for split induction,
    /// in (0, 100]. 100 means every numeric attribute.
    pub attributes_percentage: f64,

    /// Seed for the perceptron weight initialization and the per-rule
    /// attribute sub-sampling. Fixed seed plus fixed instance order gives an
    /// identical model.
    pub seed: u64,

    #[serde(default)]
    pub drift: DriftConfig,

    #[serde(default)]
    pub anomaly: AnomalyConfig,

    #[serde(default)]
    pub perceptron: PerceptronConfig,

    /// How covering rules are weighted when voting.
    #[serde(default)]
    pub voting: WeightPolicy,
}

impl Default for RulestreamConfig {
    fn default() -> Self {
        Self {
            split_confidence: 0.000_000_1,
            tie_threshold: 0.05,
            grace_period: 200,
            ordered: false,
            prediction: PredictionMode::Adaptive,
            attributes_percentage: 100.0,
            seed: 1,
            drift: DriftConfig::default(),
            anomaly: AnomalyConfig::default(),
            perceptron: PerceptronConfig::default(),
            voting: WeightPolicy::default(),
        }
    }
}

/// Page-Hinckley drift detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftConfig {
    /// Enable per-rule drift detection. Disabled rules are never pruned.
    pub enabled: bool,
    /// Sensitivity margin subtracted from every deviation.
    pub alpha: f64,
    /// Trigger level (lambda). The gap between the cumulative deviation sum
    /// and its running minimum must exceed this to signal drift.
    pub threshold: f64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            alpha: 0.005,
            threshold: 35.0,
        }
    }
}

/// Anomaly screening settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Enable per-instance anomaly screening.
    pub enabled: bool,
    /// Instances a rule must accumulate before screening kicks in.
    pub min_instances: u64,
    /// Per-attribute probability below which an attribute counts as
    /// surprising.
    pub univariate_threshold: f64,
    /// Overall score at or above which the instance is suppressed.
    pub multivariate_threshold: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_instances: 30,
            univariate_threshold: 0.10,
            multivariate_threshold: 0.99,
        }
    }
}

/// Online linear model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerceptronConfig {
    /// Base learning ratio.
    pub learning_ratio: f64,
    /// Decay applied per seen instance unless the ratio is constant.
    pub learning_ratio_decay: f64,
    /// Keep the learning ratio constant instead of decaying it.
    pub constant_learning_ratio: bool,
    /// Fading factor for the accumulated absolute error.
    pub fading_factor: f64,
}

impl Default for PerceptronConfig {
    fn default() -> Self {
        Self {
            learning_ratio: 0.025,
            learning_ratio_decay: 0.001,
            constant_learning_ratio: false,
            fading_factor: 0.99,
        }
    }
}

impl RulestreamConfig {
    /// Validate all fields, returning the first violation found.
    pub fn validate(&self) -> Result<(), RulestreamError> {
        if !(self.split_confidence > 0.0 && self.split_confidence < 1.0) {
            return Err(RulestreamError::config(
                "split_confidence",
                format!("must be in (0, 1), got {}", self.split_confidence),
            ));
        }
        if !(0.0..=1.0).contains(&self.tie_threshold) {
            return Err(RulestreamError::config(
                "tie_threshold",
                format!("must be in [0, 1], got {}", self.tie_threshold),
            ));
        }
        if self.grace_period == 0 {
            return Err(RulestreamError::config("grace_period", "must be at least 1"));
        }
        if !(self.attributes_percentage > 0.0 && self.attributes_percentage <= 100.0) {
            return Err(RulestreamError::config(
                "attributes_percentage",
                format!("must be in (0, 100], got {}", self.attributes_percentage),
            ));
        }
        if !(0.0..=1.0).contains(&self.drift.alpha) {
            return Err(RulestreamError::config(
                "drift.alpha",
                format!("must be in [0, 1], got {}", self.drift.alpha),
            ));
        }
        if self.drift.threshold < 0.0 {
            return Err(RulestreamError::config(
                "drift.threshold",
                format!("must be non-negative, got {}", self.drift.threshold),
            ));
        }
        if !(0.0..=1.0).contains(&self.anomaly.univariate_threshold) {
            return Err(RulestreamError::config(
                "anomaly.univariate_threshold",
                format!("must be in [0, 1], got {}", self.anomaly.univariate_threshold),
            ));
        }
        if !(0.0..=1.0).contains(&self.anomaly.multivariate_threshold) {
            return Err(RulestreamError::config(
                "anomaly.multivariate_threshold",
                format!("must be in [0, 1], got {}", self.anomaly.multivariate_threshold),
            ));
        }
        if self.perceptron.learning_ratio <= 0.0 {
            return Err(RulestreamError::config(
                "perceptron.learning_ratio",
                format!("must be positive, got {}", self.perceptron.learning_ratio),
            ));
        }
        if self.perceptron.learning_ratio_decay < 0.0 {
            return Err(RulestreamError::config(
                "perceptron.learning_ratio_decay",
                format!(
                    "must be non-negative, got {}",
                    self.perceptron.learning_ratio_decay
                ),
            ));
        }
        if !(self.perceptron.fading_factor > 0.0 && self.perceptron.fading_factor <= 1.0) {
            return Err(RulestreamError::config(
                "perceptron.fading_factor",
                format!("must be in (0, 1], got {}", self.perceptron.fading_factor),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(RulestreamConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_split_confidence() {
        let mut config = RulestreamConfig::default();
        config.split_confidence = 0.0;
        assert!(config.validate().is_err());
        config.split_confidence = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_grace_period() {
        let mut config = RulestreamConfig::default();
        config.grace_period = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_attribute_percentage() {
        let mut config = RulestreamConfig::default();
        config.attributes_percentage = 0.0;
        assert!(config.validate().is_err());
        config.attributes_percentage = 120.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let config = RulestreamConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: RulestreamConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.grace_period, config.grace_period);
        assert_eq!(back.prediction, config.prediction);
        assert!(back.validate().is_ok());
    }
}
