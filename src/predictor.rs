//! Per-rule target estimators.
//!
//! Each rule carries two interchangeable estimators: the running mean of the
//! target and an online perceptron over normalized attribute values. The
//! adaptive mode tracks both and reports from whichever currently has the
//! lower fading error, falling back to the target mean until the perceptron
//! has seen enough instances to be numerically trustworthy.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{PerceptronConfig, PredictionMode};
use crate::record::Record;
use crate::stats::RunningMoments;

/// Below this spread, normalization degenerates to 0 rather than dividing.
const SD_THRESHOLD: f64 = 1e-7;

/// Instances the perceptron must see before adaptive mode will consider it.
const PERCEPTRON_WARM_UP: f64 = 100.0;

/// Normalize a value against running target moments. Returns 0 when the
/// spread is too small to divide by.
pub(crate) fn normalize(value: f64, moments: &RunningMoments) -> f64 {
    let sd = moments.sample_sd();
    if sd > SD_THRESHOLD {
        (value - moments.mean()) / sd
    } else {
        0.0
    }
}

/// Fading-factor mean absolute error tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FadingError {
    fading_factor: f64,
    accumulated: f64,
    count: f64,
}

impl FadingError {
    pub fn new(fading_factor: f64) -> Self {
        Self {
            fading_factor,
            accumulated: 0.0,
            count: 0.0,
        }
    }

    pub fn update(&mut self, absolute_error: f64, weight: f64) {
        self.accumulated = absolute_error * weight + self.fading_factor * self.accumulated;
        self.count = weight + self.fading_factor * self.count;
    }

    /// Current mean absolute error; `f64::MAX` before any observation so an
    /// untrained estimator never wins a comparison.
    pub fn current(&self) -> f64 {
        if self.count > 0.0 {
            self.accumulated / self.count
        } else {
            f64::MAX
        }
    }

    pub fn reset(&mut self) {
        self.accumulated = 0.0;
        self.count = 0.0;
    }
}

/// Running-mean estimator of the target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetMean {
    moments: RunningMoments,
    error: FadingError,
}

impl TargetMean {
    pub fn new(fading_factor: f64) -> Self {
        Self {
            moments: RunningMoments::new(),
            error: FadingError::new(fading_factor),
        }
    }

    /// Seed from an already-observed mean, e.g. a split branch.
    pub fn seed(&mut self, mean: f64, count: f64) {
        self.moments = RunningMoments::from_parts(count, mean * count, mean * mean * count);
    }

    pub fn train(&mut self, target: f64, weight: f64) {
        self.error
            .update((self.prediction() - target).abs(), weight);
        self.moments.add(target, weight);
    }

    pub fn prediction(&self) -> f64 {
        self.moments.mean()
    }

    pub fn current_error(&self) -> f64 {
        self.error.current()
    }

    pub fn reset_error(&mut self) {
        self.error.reset();
    }
}

/// Online linear regressor over normalized numeric attributes.
///
/// Weights live in normalized space; predictions are denormalized against the
/// perceptron's own running target moments before being reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Perceptron {
    config: PerceptronConfig,
    /// One weight per numeric attribute, bias last. Empty until the first
    /// training instance fixes the attribute layout.
    weights: Vec<f64>,
    numeric_attributes: Vec<usize>,
    attribute_moments: Vec<RunningMoments>,
    target_moments: RunningMoments,
    instances_seen: f64,
    learning_ratio: f64,
    error: FadingError,
    initialized: bool,
}

impl Perceptron {
    pub fn new(config: &PerceptronConfig) -> Self {
        Self {
            learning_ratio: config.learning_ratio,
            error: FadingError::new(config.fading_factor),
            config: config.clone(),
            weights: Vec::new(),
            numeric_attributes: Vec::new(),
            attribute_moments: Vec::new(),
            target_moments: RunningMoments::new(),
            instances_seen: 0.0,
            initialized: false,
        }
    }

    pub fn instances_seen(&self) -> f64 {
        self.instances_seen
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn current_error(&self) -> f64 {
        self.error.current()
    }

    pub fn reset_error(&mut self) {
        self.error.reset();
    }

    /// Restore the base learning ratio, used when an expanded rule keeps the
    /// trained weights but restarts its schedule.
    pub fn reset_learning_ratio(&mut self) {
        self.learning_ratio = self.config.learning_ratio;
    }

    pub fn train(&mut self, record: &dyn Record, rng: &mut StdRng) {
        let weight = record.weight();
        self.error
            .update((self.prediction(record) - record.target()).abs(), weight);

        if !self.initialized {
            self.initialize(record, rng);
        }

        self.instances_seen += weight;
        for (slot, &attribute) in self.numeric_attributes.iter().enumerate() {
            if let Some(value) = record.value(attribute) {
                self.attribute_moments[slot].add(value, weight);
            }
        }
        self.target_moments.add(record.target(), weight);

        if !self.config.constant_learning_ratio {
            self.learning_ratio = self.config.learning_ratio
                / (1.0 + self.instances_seen * self.config.learning_ratio_decay);
        }

        self.update_weights(record, weight);
    }

    fn initialize(&mut self, record: &dyn Record, rng: &mut StdRng) {
        self.numeric_attributes = (0..record.num_attributes())
            .filter(|&i| record.is_numeric(i))
            .collect();
        self.attribute_moments = vec![RunningMoments::new(); self.numeric_attributes.len()];
        self.weights = (0..self.numeric_attributes.len() + 1)
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect();
        self.initialized = true;
    }

    /// Attribute values in normalized space; missing values read as 0 (the
    /// normalized mean, i.e. no contribution).
    fn normalized_values(&self, record: &dyn Record) -> Vec<f64> {
        self.numeric_attributes
            .iter()
            .enumerate()
            .map(|(slot, &attribute)| match record.value(attribute) {
                Some(value) => {
                    let moments = &self.attribute_moments[slot];
                    let sd = moments.sample_sd();
                    if sd > SD_THRESHOLD {
                        (value - moments.mean()) / sd
                    } else {
                        value - moments.mean()
                    }
                }
                None => 0.0,
            })
            .collect()
    }

    /// Linear response in normalized space.
    pub fn normalized_prediction(&self, record: &dyn Record) -> f64 {
        if !self.initialized {
            return 0.0;
        }
        let values = self.normalized_values(record);
        let mut prediction = 0.0;
        for (value, weight) in values.iter().zip(&self.weights) {
            prediction += value * weight;
        }
        prediction + self.weights[self.weights.len() - 1]
    }

    /// Denormalized prediction; 0 before the first training instance.
    pub fn prediction(&self, record: &dyn Record) -> f64 {
        if !self.initialized {
            return 0.0;
        }
        let normalized = self.normalized_prediction(record);
        let mean = self.target_moments.mean();
        let sd = self.target_moments.sample_sd();
        if sd > SD_THRESHOLD {
            normalized * sd + mean
        } else {
            normalized + mean
        }
    }

    fn normalized_target(&self, target: f64) -> f64 {
        let mean = self.target_moments.mean();
        let sd = self.target_moments.sample_sd();
        if sd > SD_THRESHOLD {
            (target - mean) / sd
        } else {
            target - mean
        }
    }

    fn update_weights(&mut self, record: &dyn Record, weight: f64) {
        let values = self.normalized_values(record);
        let predicted = {
            let mut p = 0.0;
            for (value, w) in values.iter().zip(&self.weights) {
                p += value * w;
            }
            p + self.weights[self.weights.len() - 1]
        };
        let delta = self.normalized_target(record.target()) - predicted;

        let bias_slot = self.weights.len() - 1;
        let mut l1 = 0.0;
        for (slot, value) in values.iter().enumerate() {
            self.weights[slot] += self.learning_ratio * delta * value * weight;
            l1 += self.weights[slot].abs();
        }
        self.weights[bias_slot] += self.learning_ratio * delta * weight;
        l1 += self.weights[bias_slot].abs();

        // Keep the L1 norm bounded by the attribute count (lasso-style).
        if l1 > self.numeric_attributes.len() as f64 {
            for w in &mut self.weights {
                *w /= l1;
            }
        }
    }
}

/// The estimator a rule reports from, dispatched over a closed set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Predictor {
    mode: PredictionMode,
    perceptron: Perceptron,
    target_mean: TargetMean,
}

impl Predictor {
    pub fn new(mode: PredictionMode, config: &PerceptronConfig) -> Self {
        Self {
            mode,
            perceptron: Perceptron::new(config),
            target_mean: TargetMean::new(config.fading_factor),
        }
    }

    pub fn perceptron(&self) -> &Perceptron {
        &self.perceptron
    }

    pub fn target_mean(&self) -> &TargetMean {
        &self.target_mean
    }

    pub fn target_mean_mut(&mut self) -> &mut TargetMean {
        &mut self.target_mean
    }

    /// Train both estimators on one instance.
    pub fn train(&mut self, record: &dyn Record, rng: &mut StdRng) {
        self.perceptron.train(record, rng);
        self.target_mean.train(record.target(), record.weight());
    }

    fn use_perceptron(&self) -> bool {
        match self.mode {
            PredictionMode::Perceptron => true,
            PredictionMode::TargetMean => false,
            PredictionMode::Adaptive => {
                self.perceptron.instances_seen() > PERCEPTRON_WARM_UP
                    && self.perceptron.current_error() < self.target_mean.current_error()
            }
        }
    }

    pub fn prediction(&self, record: &dyn Record) -> f64 {
        if self.use_perceptron() {
            self.perceptron.prediction(record)
        } else {
            self.target_mean.prediction()
        }
    }

    /// Prediction in normalized space, for drift-error computation. The
    /// target mean is normalized against the rule's own target moments.
    pub fn normalized_prediction(&self, record: &dyn Record, rule_moments: &RunningMoments) -> f64 {
        if self.use_perceptron() {
            self.perceptron.normalized_prediction(record)
        } else {
            normalize(self.target_mean.prediction(), rule_moments)
        }
    }

    /// Error of the estimator currently in charge.
    pub fn current_error(&self) -> f64 {
        match self.mode {
            PredictionMode::Perceptron => self.perceptron.current_error(),
            PredictionMode::TargetMean => self.target_mean.current_error(),
            PredictionMode::Adaptive => self
                .perceptron
                .current_error()
                .min(self.target_mean.current_error()),
        }
    }

    /// Clone for an expanded rule: keep learned weights and means, restart
    /// error tracking and the learning schedule.
    pub fn for_expansion(&self) -> Self {
        let mut clone = self.clone();
        clone.perceptron.reset_error();
        clone.perceptron.reset_learning_ratio();
        clone.target_mean.reset_error();
        clone
    }
}
