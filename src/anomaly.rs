//! Per-rule anomaly screening.
//!
//! Scores how surprising an instance's attribute values are under the rule's
//! own running attribute statistics. Surprising instances are skipped for
//! statistics updates so a single wild outlier cannot corrupt a rule; they
//! still fall through to prediction.

use serde::{Deserialize, Serialize};

use crate::config::AnomalyConfig;
use crate::record::Record;
use crate::stats::RunningMoments;

/// Guard added to the standard deviation before dividing.
const SD_GUARD: f64 = 1e-9;

/// Probability of observing `value` under a running (mean, sd) estimate.
///
/// Gaussian within one standard deviation, Chebyshev `1/k^2` beyond it; the
/// heavier tail avoids underflow for large deviations.
fn attribute_probability(mean: f64, sd: f64, value: f64) -> f64 {
    let sd = sd + SD_GUARD;
    let diff = value - mean;
    let k = diff.abs() / sd;
    if k > 1.0 {
        1.0 / (k * k)
    } else {
        (-(diff * diff) / (2.0 * sd * sd)).exp()
    }
}

/// Log-likelihood-ratio anomaly scorer over a rule's numeric attributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnomalyDetector {
    attributes: Vec<RunningMoments>,
    instances: f64,
}

impl AnomalyDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of (accepted) instances folded into the baseline.
    pub fn instances_seen(&self) -> f64 {
        self.instances
    }

    /// Fold an accepted instance into the per-attribute baselines.
    pub fn update(&mut self, record: &dyn Record) {
        if self.attributes.len() < record.num_attributes() {
            self.attributes
                .resize_with(record.num_attributes(), RunningMoments::new);
        }
        let weight = record.weight();
        for index in 0..record.num_attributes() {
            if !record.is_numeric(index) {
                continue;
            }
            if let Some(value) = record.value(index) {
                self.attributes[index].add(value, weight);
            }
        }
        self.instances += weight;
    }

    /// Anomaly score in [0, 1]: the share of log-evidence contributed by
    /// surprising attributes (per-attribute probability below
    /// `univariate_threshold`). 0 when nothing is surprising.
    pub fn score(&self, record: &dyn Record, univariate_threshold: f64) -> f64 {
        let mut total = 0.0;
        let mut surprising = 0.0;

        for index in 0..record.num_attributes().min(self.attributes.len()) {
            if !record.is_numeric(index) {
                continue;
            }
            let Some(value) = record.value(index) else {
                continue;
            };
            let moments = &self.attributes[index];
            if moments.is_empty() {
                continue;
            }
            let probability = attribute_probability(moments.mean(), moments.sample_sd(), value);
            if probability > 0.0 {
                let evidence = probability.ln().abs();
                total += evidence;
                if probability < univariate_threshold {
                    surprising += evidence;
                }
            }
        }

        if total > 0.0 {
            surprising / total
        } else {
            0.0
        }
    }

    /// Whether the instance should be suppressed from statistics updates.
    pub fn is_anomaly(&self, record: &dyn Record, config: &AnomalyConfig) -> bool {
        if !config.enabled || self.instances < config.min_instances as f64 {
            return false;
        }
        self.score(record, config.univariate_threshold) >= config.multivariate_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DenseRecord;

    fn trained_detector(n: usize) -> AnomalyDetector {
        let mut detector = AnomalyDetector::new();
        for i in 0..n {
            let x0 = (i % 10) as f64 / 10.0;
            let x1 = 5.0 + (i % 7) as f64 / 7.0;
            detector.update(&DenseRecord::new(vec![x0, x1], 0.0));
        }
        detector
    }

    #[test]
    fn test_score_is_bounded() {
        let detector = trained_detector(200);
        for i in 0..100 {
            let record = DenseRecord::new(vec![i as f64 * 13.7 - 500.0, i as f64], 0.0);
            let score = detector.score(&record, 0.10);
            assert!((0.0..=1.0).contains(&score), "score {} out of bounds", score);
        }
    }

    #[test]
    fn test_typical_instance_scores_low() {
        let detector = trained_detector(200);
        let record = DenseRecord::new(vec![0.5, 5.5], 0.0);
        assert!(detector.score(&record, 0.10) < 0.5);
    }

    #[test]
    fn test_wild_outlier_is_flagged() {
        let detector = trained_detector(200);
        let config = AnomalyConfig::default();
        // One attribute 1000x out of range, the other at its mean.
        let record = DenseRecord::new(vec![1000.0, 5.5], 0.0);
        assert!(detector.score(&record, 0.10) > 0.99);
        assert!(detector.is_anomaly(&record, &config));
    }

    #[test]
    fn test_min_instances_gate() {
        let detector = trained_detector(10);
        let config = AnomalyConfig::default();
        let record = DenseRecord::new(vec![1000.0, 5.5], 0.0);
        assert!(
            !detector.is_anomaly(&record, &config),
            "below min_instances nothing is anomalous"
        );
    }

    #[test]
    fn test_disabled_detection_never_flags() {
        let detector = trained_detector(200);
        let config = AnomalyConfig {
            enabled: false,
            ..AnomalyConfig::default()
        };
        let record = DenseRecord::new(vec![1000.0, 5.5], 0.0);
        assert!(!detector.is_anomaly(&record, &config));
    }

    #[test]
    fn test_missing_values_contribute_nothing() {
        let detector = trained_detector(200);
        let record = DenseRecord::with_missing(vec![None, None], 0.0);
        assert_eq!(detector.score(&record, 0.10), 0.0);
    }

    #[test]
    fn test_untrained_detector_scores_zero() {
        let detector = AnomalyDetector::new();
        let record = DenseRecord::new(vec![1000.0], 0.0);
        assert_eq!(detector.score(&record, 0.10), 0.0);
    }
}
