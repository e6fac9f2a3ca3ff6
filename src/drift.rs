//! Page-Hinckley change detection.
//!
//! Sequential test over a rule's normalized absolute prediction errors. The
//! detector tracks the gap between a cumulative deviation sum and its running
//! minimum; a gap above the threshold means the error level has shifted
//! upward and the rule no longer models the stream.

use serde::{Deserialize, Serialize};

/// Per-rule scalar drift monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageHinckley {
    alpha: f64,
    threshold: f64,
    instances: f64,
    sum_abs_error: f64,
    /// Cumulative sum of deviations from the running mean error.
    cumulative: f64,
    /// Running minimum of the cumulative sum.
    minimum: f64,
}

impl PageHinckley {
    pub fn new(threshold: f64, alpha: f64) -> Self {
        Self {
            alpha,
            threshold,
            instances: 0.0,
            sum_abs_error: 0.0,
            cumulative: 0.0,
            minimum: f64::INFINITY,
        }
    }

    /// Feed one absolute prediction error. Returns true when drift is
    /// signalled. Monotonic and order-dependent; there is no reset short of
    /// discarding the detector with its rule.
    pub fn update(&mut self, absolute_error: f64, weight: f64) -> bool {
        self.instances += weight;
        self.sum_abs_error += absolute_error * weight;
        let mean_error = self.sum_abs_error / self.instances;

        self.cumulative += absolute_error - mean_error - self.alpha;
        if self.cumulative < self.minimum {
            self.minimum = self.cumulative;
        }
        self.cumulative - self.minimum > self.threshold
    }

    /// Current gap between the cumulative sum and its minimum.
    pub fn gap(&self) -> f64 {
        if self.minimum.is_finite() {
            self.cumulative - self.minimum
        } else {
            0.0
        }
    }

    pub fn minimum(&self) -> f64 {
        self.minimum
    }
}
