//! Incremental scalar statistics.
//!
//! [`RunningMoments`] tracks weight, sum and sum of squares for a scalar and
//! derives mean and spread from them. Two spread conventions coexist in this
//! crate on purpose: split-merit math uses the population form while the
//! perceptron normalizer and the anomaly probabilities use the sample form.
//! The accessors are named explicitly so call sites cannot mix them up by
//! accident.

use serde::{Deserialize, Serialize};

/// Weighted count, sum and sum of squares of an observed scalar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningMoments {
    weight: f64,
    sum: f64,
    sum_sq: f64,
}

impl RunningMoments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from raw components, e.g. when seeding a rule from a split
    /// branch.
    pub fn from_parts(weight: f64, sum: f64, sum_sq: f64) -> Self {
        Self { weight, sum, sum_sq }
    }

    /// Observe one value with the given weight.
    pub fn add(&mut self, value: f64, weight: f64) {
        self.weight += weight;
        self.sum += value * weight;
        self.sum_sq += value * value * weight;
    }

    /// Fold another accumulator into this one.
    pub fn add_moments(&mut self, other: &RunningMoments) {
        self.weight += other.weight;
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
    }

    /// Remove another accumulator's contribution.
    pub fn sub_moments(&mut self, other: &RunningMoments) {
        self.weight -= other.weight;
        self.sum -= other.sum;
        self.sum_sq -= other.sum_sq;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn sum_sq(&self) -> f64 {
        self.sum_sq
    }

    pub fn is_empty(&self) -> bool {
        self.weight <= 0.0
    }

    /// Mean of the observed values, 0.0 when nothing was observed.
    pub fn mean(&self) -> f64 {
        if self.weight > 0.0 {
            self.sum / self.weight
        } else {
            0.0
        }
    }

    /// Bessel-corrected variance (divides by n - 1), 0.0 below two
    /// observations.
    pub fn sample_variance(&self) -> f64 {
        if self.weight > 1.0 {
            let v = (self.sum_sq - self.sum * self.sum / self.weight) / (self.weight - 1.0);
            v.max(0.0)
        } else {
            0.0
        }
    }

    /// Sample standard deviation.
    pub fn sample_sd(&self) -> f64 {
        self.sample_variance().sqrt()
    }

    /// Population variance (divides by n), 0.0 when empty.
    pub fn population_variance(&self) -> f64 {
        if self.weight > 0.0 {
            let v = (self.sum_sq - self.sum * self.sum / self.weight) / self.weight;
            v.max(0.0)
        } else {
            0.0
        }
    }

    /// Population standard deviation.
    pub fn population_sd(&self) -> f64 {
        self.population_variance().sqrt()
    }
}

/// Standard-deviation reduction of splitting `pre` into `left` and `right`.
///
/// Population SDs throughout; a candidate cut with everything on one side
/// reduces nothing and scores exactly 0.
pub fn sdr(pre: &RunningMoments, left: &RunningMoments, right: &RunningMoments) -> f64 {
    let n = pre.weight();
    if n <= 0.0 {
        return 0.0;
    }
    pre.population_sd()
        - (left.weight() / n) * left.population_sd()
        - (right.weight() / n) * right.population_sd()
}
