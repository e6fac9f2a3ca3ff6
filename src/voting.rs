//! Error-weighted vote aggregation.
//!
//! When an unordered rule set predicts, every covering rule casts a vote.
//! Votes are combined with weights derived from each rule's current fading
//! error, so rules that have been predicting well lately dominate.

use serde::{Deserialize, Serialize};

/// How a rule's current error maps to its vote weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightPolicy {
    /// Weight `1 / (error + epsilon)`. Sharply favors low-error rules.
    InverseError,
    /// Weight `max(1 - error, 0)`. Gentler, but rules with error above 1
    /// are silenced entirely.
    OneMinusError,
}

impl Default for WeightPolicy {
    fn default() -> Self {
        WeightPolicy::InverseError
    }
}

/// Guard added to the error before inverting.
const ERROR_EPSILON: f64 = 1e-10;

impl WeightPolicy {
    fn weight(&self, error: f64) -> f64 {
        match self {
            WeightPolicy::InverseError => 1.0 / (error + ERROR_EPSILON),
            WeightPolicy::OneMinusError => (1.0 - error).max(0.0),
        }
    }
}

/// One rule's contribution to a prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vote {
    pub prediction: f64,
    /// Fading mean absolute error of the voting rule; `f64::MAX` for a rule
    /// that has not tracked any error yet.
    pub error: f64,
}

impl Vote {
    pub fn new(prediction: f64, error: f64) -> Self {
        Self { prediction, error }
    }
}

/// Combines covering-rule votes into a final prediction.
#[derive(Debug, Clone)]
pub struct VoteAggregator {
    policy: WeightPolicy,
    votes: Vec<Vote>,
}

impl VoteAggregator {
    pub fn new(policy: WeightPolicy) -> Self {
        Self {
            policy,
            votes: Vec::new(),
        }
    }

    pub fn add_vote(&mut self, vote: Vote) {
        self.votes.push(vote);
    }

    /// Weighted prediction over the collected votes, and the matching
    /// weighted error. A single vote passes through unweighted; a degenerate
    /// total weight falls back to the plain average.
    pub fn combine(&self) -> Option<Vote> {
        match self.votes.as_slice() {
            [] => None,
            [only] => Some(*only),
            votes => {
                let mut total_weight = 0.0;
                let mut prediction = 0.0;
                let mut error = 0.0;
                for vote in votes {
                    let weight = self.policy.weight(vote.error);
                    total_weight += weight;
                    prediction += weight * vote.prediction;
                    error += weight * vote.error;
                }
                if total_weight > 0.0 && total_weight.is_finite() {
                    Some(Vote::new(prediction / total_weight, error / total_weight))
                } else {
                    let n = votes.len() as f64;
                    let prediction = votes.iter().map(|v| v.prediction).sum::<f64>() / n;
                    let error = votes.iter().map(|v| v.error).sum::<f64>() / n;
                    Some(Vote::new(prediction, error))
                }
            }
        }
    }
}
