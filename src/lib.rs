//! Streaming regression with adaptive model rules.
//!
//! An online learner that induces an ordered or unordered set of conjunctive
//! rules from a stream of numeric records. Each rule carries its own split
//! observers, target estimators, anomaly screen and drift detector; rules
//! grow one predicate at a time when a Hoeffding-bound test confirms a cut,
//! and are dropped when Page-Hinckley signals that their error level has
//! shifted.
//!
//! ```
//! use rulestream::{DenseRecord, RuleSet, RulestreamConfig};
//!
//! let mut learner = RuleSet::new(RulestreamConfig::default())?;
//! for i in 0..1000 {
//!     let x = (i % 100) as f64 / 100.0;
//!     let record = DenseRecord::new(vec![x], if x <= 0.5 { 1.0 } else { 9.0 });
//!     learner.train(&record);
//! }
//! let prediction = learner.predict(&DenseRecord::new(vec![0.25], 0.0));
//! assert!(prediction.is_finite());
//! # Ok::<(), rulestream::RulestreamError>(())
//! ```

pub mod anomaly;
pub mod config;
pub mod drift;
pub mod error;
pub mod observer;
pub mod predictor;
pub mod record;
pub mod rule;
pub mod ruleset;
pub mod split;
pub mod stats;
pub mod voting;

pub use config::{
    AnomalyConfig, DriftConfig, PerceptronConfig, PredictionMode, RulestreamConfig,
};
pub use error::RulestreamError;
pub use record::{DenseRecord, Record, SparseRecord};
pub use rule::{Operator, Predicate, Rule};
pub use ruleset::{RuleSet, RuleSetStats, RuleSetSummary, RuleSummary};
pub use voting::WeightPolicy;
