//! Rules: predicate conjunctions with attached incremental models.

use std::fmt;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::anomaly::AnomalyDetector;
use crate::config::{AnomalyConfig, DriftConfig, RulestreamConfig};
use crate::drift::PageHinckley;
use crate::observer::SplitObserver;
use crate::predictor::{normalize, Predictor};
use crate::record::Record;
use crate::split::{self, KeptSide, SplitDecision};
use crate::stats::RunningMoments;

/// Comparison operator of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    LessOrEqual,
    Greater,
    Equal,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::LessOrEqual => write!(f, "<="),
            Operator::Greater => write!(f, ">"),
            Operator::Equal => write!(f, "="),
        }
    }
}

/// A single attribute test. Conjunctions of these form a rule's antecedent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub attribute: usize,
    pub operator: Operator,
    pub threshold: f64,
}

impl Predicate {
    pub fn new(attribute: usize, operator: Operator, threshold: f64) -> Self {
        Self {
            attribute,
            operator,
            threshold,
        }
    }

    /// Evaluate against a record. A missing value never matches. A predicate
    /// referencing an out-of-range attribute is a corrupted rule and panics.
    pub fn evaluate(&self, record: &dyn Record) -> bool {
        assert!(
            self.attribute < record.num_attributes(),
            "predicate references attribute {} but record has {}",
            self.attribute,
            record.num_attributes()
        );
        let Some(value) = record.value(self.attribute) else {
            return false;
        };
        match self.operator {
            Operator::LessOrEqual => value <= self.threshold,
            Operator::Greater => value > self.threshold,
            Operator::Equal => value == self.threshold,
        }
    }

    /// Whether two predicates on the same attribute describe an empty region.
    fn contradicts(&self, other: &Predicate) -> bool {
        if self.attribute != other.attribute {
            return false;
        }
        match (self.operator, other.operator) {
            (Operator::LessOrEqual, Operator::Greater) => self.threshold <= other.threshold,
            (Operator::Greater, Operator::LessOrEqual) => other.threshold <= self.threshold,
            (Operator::Equal, Operator::Equal) => self.threshold != other.threshold,
            (Operator::Equal, Operator::LessOrEqual) => self.threshold > other.threshold,
            (Operator::LessOrEqual, Operator::Equal) => other.threshold > self.threshold,
            (Operator::Equal, Operator::Greater) => self.threshold <= other.threshold,
            (Operator::Greater, Operator::Equal) => other.threshold <= self.threshold,
            _ => false,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{} {} {:.3}", self.attribute, self.operator, self.threshold)
    }
}

/// A conjunctive rule plus all of its per-rule learning state.
///
/// A rule with no predicates is a default rule and covers every record.
#[derive(Debug)]
pub struct Rule {
    id: u64,
    predicates: Vec<Predicate>,
    observers: Vec<Option<SplitObserver>>,
    /// Target moments since the last structural change.
    moments: RunningMoments,
    drift: PageHinckley,
    drift_config: DriftConfig,
    anomaly: AnomalyDetector,
    predictor: Predictor,
    attributes_percentage: f64,
    attribute_mask: Option<Vec<bool>>,
    rng: StdRng,
}

impl Rule {
    pub(crate) fn new(id: u64, config: &RulestreamConfig, seed: u64) -> Self {
        Self {
            id,
            predicates: Vec::new(),
            observers: Vec::new(),
            moments: RunningMoments::new(),
            drift: PageHinckley::new(config.drift.threshold, config.drift.alpha),
            drift_config: config.drift.clone(),
            anomaly: AnomalyDetector::new(),
            predictor: Predictor::new(config.prediction, &config.perceptron),
            attributes_percentage: config.attributes_percentage,
            attribute_mask: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_default(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Weight of the instances accepted since the last structural change.
    pub fn instances_seen(&self) -> f64 {
        self.moments.weight()
    }

    pub fn moments(&self) -> &RunningMoments {
        &self.moments
    }

    pub(crate) fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    pub(crate) fn predictor_mut(&mut self) -> &mut Predictor {
        &mut self.predictor
    }

    /// Whether every predicate matches the record. Pure in the rule and
    /// record state.
    pub fn covers(&self, record: &dyn Record) -> bool {
        self.predicates.iter().all(|p| p.evaluate(record))
    }

    pub(crate) fn is_anomaly(&self, record: &dyn Record, config: &AnomalyConfig) -> bool {
        self.anomaly.is_anomaly(record, config)
    }

    /// Absolute prediction error in normalized target space, the quantity
    /// the drift detector monitors.
    pub(crate) fn absolute_normalized_error(&self, record: &dyn Record) -> f64 {
        let predicted = self.predictor.normalized_prediction(record, &self.moments);
        let actual = normalize(record.target(), &self.moments);
        (actual - predicted).abs()
    }

    /// Feed the drift detector. Returns true when the rule should be pruned.
    pub(crate) fn drift_update(&mut self, absolute_error: f64, weight: f64) -> bool {
        if !self.drift_config.enabled {
            return false;
        }
        self.drift.update(absolute_error, weight)
    }

    /// Fold one accepted instance into every piece of per-rule state.
    pub(crate) fn update(&mut self, record: &dyn Record) {
        self.ensure_layout(record);

        let weight = record.weight();
        let target = record.target();
        self.moments.add(target, weight);

        for index in 0..record.num_attributes() {
            if !record.is_numeric(index) || !self.observes(index) {
                continue;
            }
            if let Some(value) = record.value(index) {
                self.observers[index]
                    .get_or_insert_with(SplitObserver::new)
                    .observe(value, target, weight);
            }
        }

        self.anomaly.update(record);
        self.predictor.train(record, &mut self.rng);
    }

    fn ensure_layout(&mut self, record: &dyn Record) {
        if self.observers.len() < record.num_attributes() {
            self.observers.resize_with(record.num_attributes(), || None);
        }
        if self.attribute_mask.is_none() && self.attributes_percentage < 100.0 {
            let mut numeric: Vec<usize> = (0..record.num_attributes())
                .filter(|&i| record.is_numeric(i))
                .collect();
            let keep = ((numeric.len() as f64 * self.attributes_percentage / 100.0).round()
                as usize)
                .max(1)
                .min(numeric.len());
            numeric.shuffle(&mut self.rng);
            let mut mask = vec![false; record.num_attributes()];
            for &index in numeric.iter().take(keep) {
                mask[index] = true;
            }
            self.attribute_mask = Some(mask);
        }
    }

    fn observes(&self, index: usize) -> bool {
        match &self.attribute_mask {
            Some(mask) => mask.get(index).copied().unwrap_or(false),
            None => true,
        }
    }

    /// Run the split evaluator over the rule's observers.
    pub(crate) fn evaluate_split(&self, config: &RulestreamConfig) -> Option<SplitDecision> {
        split::evaluate(
            &self.observers,
            &self.moments,
            config.split_confidence,
            config.tie_threshold,
        )
    }

    /// Append (or tighten) the predicate described by a confirmed decision,
    /// reset per-rule statistics and seed them from the kept branch's target
    /// moments. Returns false when the decision was a duplicate of an
    /// existing predicate and nothing changed.
    pub(crate) fn apply_expansion(&mut self, decision: &SplitDecision) -> bool {
        let operator = match decision.kept_side {
            KeptSide::Left => Operator::LessOrEqual,
            KeptSide::Right => Operator::Greater,
        };
        let predicate = Predicate::new(decision.attribute, operator, decision.threshold);
        if !self.add_or_tighten(predicate) {
            return false;
        }
        self.structural_reset();
        // The rule now covers only the kept side of the cut, so its target
        // statistics start from that branch, not from scratch.
        self.moments = decision.kept;
        self.predictor
            .target_mean_mut()
            .seed(decision.kept.mean(), decision.kept.weight());
        true
    }

    fn add_or_tighten(&mut self, predicate: Predicate) -> bool {
        for existing in &mut self.predicates {
            if existing.attribute == predicate.attribute && existing.operator == predicate.operator
            {
                let tighter = match predicate.operator {
                    Operator::LessOrEqual => predicate.threshold < existing.threshold,
                    Operator::Greater => predicate.threshold > existing.threshold,
                    Operator::Equal => false,
                };
                if tighter {
                    existing.threshold = predicate.threshold;
                    return true;
                }
                return false;
            }
        }
        for existing in &self.predicates {
            assert!(
                !existing.contradicts(&predicate),
                "contradictory predicates {} and {} in rule {}",
                existing,
                predicate,
                self.id
            );
        }
        self.predicates.push(predicate);
        true
    }

    /// Reset every per-rule statistic except the learned estimators, which
    /// keep their weights and means but restart error tracking.
    fn structural_reset(&mut self) {
        self.observers.clear();
        self.moments.clear();
        self.anomaly = AnomalyDetector::new();
        self.drift = PageHinckley::new(self.drift_config.threshold, self.drift_config.alpha);
        self.predictor = self.predictor.for_expansion();
        self.attribute_mask = None;
    }

    pub fn prediction(&self, record: &dyn Record) -> f64 {
        self.predictor.prediction(record)
    }

    /// Fading mean absolute error of the estimator currently in charge.
    pub fn current_error(&self) -> f64 {
        self.predictor.current_error()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.predicates.is_empty() {
            write!(f, "true")?;
        } else {
            for (i, predicate) in self.predicates.iter().enumerate() {
                if i > 0 {
                    write!(f, " and ")?;
                }
                write!(f, "{}", predicate)?;
            }
        }
        write!(f, " => y: {:.3}", self.predictor.target_mean().prediction())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DenseRecord;

    fn test_rule(predicates: Vec<Predicate>) -> Rule {
        let config = RulestreamConfig::default();
        let mut rule = Rule::new(1, &config, 42);
        rule.predicates = predicates;
        rule
    }

    #[test]
    fn test_coverage_is_deterministic() {
        let rule = test_rule(vec![
            Predicate::new(0, Operator::LessOrEqual, 5.0),
            Predicate::new(1, Operator::Greater, 2.0),
        ]);
        let covered = DenseRecord::new(vec![4.0, 3.0], 0.0);
        let not_covered = DenseRecord::new(vec![6.0, 3.0], 0.0);
        for _ in 0..10 {
            assert!(rule.covers(&covered));
            assert!(!rule.covers(&not_covered));
        }
    }

    #[test]
    fn test_default_rule_covers_everything() {
        let rule = test_rule(Vec::new());
        assert!(rule.is_default());
        assert!(rule.covers(&DenseRecord::new(vec![1.0], 0.0)));
        assert!(rule.covers(&DenseRecord::with_missing(vec![None], 0.0)));
    }

    #[test]
    fn test_missing_value_never_matches() {
        let rule = test_rule(vec![Predicate::new(0, Operator::LessOrEqual, 5.0)]);
        let record = DenseRecord::with_missing(vec![None], 0.0);
        assert!(!rule.covers(&record));
    }

    #[test]
    fn test_equal_predicate_on_nominal_attribute() {
        let rule = test_rule(vec![Predicate::new(0, Operator::Equal, 2.0)]);
        let yes = DenseRecord::new(vec![2.0], 0.0).mark_nominal(0);
        let no = DenseRecord::new(vec![1.0], 0.0).mark_nominal(0);
        assert!(rule.covers(&yes));
        assert!(!rule.covers(&no));
    }

    #[test]
    #[should_panic(expected = "references attribute")]
    fn test_out_of_range_predicate_panics() {
        let rule = test_rule(vec![Predicate::new(7, Operator::Greater, 0.0)]);
        rule.covers(&DenseRecord::new(vec![1.0], 0.0));
    }

    #[test]
    fn test_add_or_tighten_replaces_with_tighter_threshold() {
        let mut rule = test_rule(vec![Predicate::new(0, Operator::LessOrEqual, 5.0)]);
        assert!(rule.add_or_tighten(Predicate::new(0, Operator::LessOrEqual, 3.0)));
        assert_eq!(rule.predicates().len(), 1);
        assert_eq!(rule.predicates()[0].threshold, 3.0);

        // A looser threshold changes nothing.
        assert!(!rule.add_or_tighten(Predicate::new(0, Operator::LessOrEqual, 4.0)));
        assert_eq!(rule.predicates()[0].threshold, 3.0);
    }

    #[test]
    fn test_range_predicates_on_same_attribute_coexist() {
        let mut rule = test_rule(vec![Predicate::new(0, Operator::Greater, 1.0)]);
        assert!(rule.add_or_tighten(Predicate::new(0, Operator::LessOrEqual, 4.0)));
        assert_eq!(rule.predicates().len(), 2);
        assert!(rule.covers(&DenseRecord::new(vec![2.0], 0.0)));
        assert!(!rule.covers(&DenseRecord::new(vec![0.5], 0.0)));
        assert!(!rule.covers(&DenseRecord::new(vec![5.0], 0.0)));
    }

    #[test]
    #[should_panic(expected = "contradictory predicates")]
    fn test_contradictory_predicate_panics() {
        let mut rule = test_rule(vec![Predicate::new(0, Operator::Greater, 5.0)]);
        rule.add_or_tighten(Predicate::new(0, Operator::LessOrEqual, 3.0));
    }

    #[test]
    fn test_update_accumulates_statistics() {
        let mut rule = test_rule(Vec::new());
        for i in 0..100 {
            let record = DenseRecord::new(vec![i as f64], i as f64 * 2.0);
            rule.update(&record);
        }
        assert_eq!(rule.instances_seen(), 100.0);
        assert!((rule.moments().mean() - 99.0).abs() < 1e-9);
        assert!(rule.current_error() < f64::MAX);
    }

    #[test]
    fn test_expansion_seeds_statistics_from_kept_branch() {
        let config = RulestreamConfig::default();
        let mut rule = Rule::new(1, &config, 42);
        for i in 0..400 {
            let x = (i % 100) as f64 / 100.0;
            let y = if x <= 0.5 { 1.0 } else { 9.0 };
            rule.update(&DenseRecord::new(vec![x], y));
        }
        let decision = rule.evaluate_split(&config).expect("step data should split");
        let kept_weight = decision.kept.weight();
        let kept_mean = decision.kept.mean();

        assert!(rule.apply_expansion(&decision));
        assert_eq!(rule.predicates().len(), 1);
        assert_eq!(rule.instances_seen(), kept_weight);
        assert!(kept_weight > 0.0);
        // The rule keeps the constant low branch; its estimate must be the
        // branch mean, not the pre-split global mean of 4.92.
        assert!((kept_mean - 1.0).abs() < 1e-9);
        assert!((rule.moments().mean() - 1.0).abs() < 1e-9);
        assert!(
            (rule.predictor().target_mean().prediction() - 1.0).abs() < 1e-9,
            "expanded rule must estimate the kept branch, got {}",
            rule.predictor().target_mean().prediction()
        );
    }

    #[test]
    fn test_attribute_mask_limits_observers() {
        let mut config = RulestreamConfig::default();
        config.attributes_percentage = 25.0;
        let mut rule = Rule::new(1, &config, 42);
        for i in 0..50 {
            let v = i as f64;
            rule.update(&DenseRecord::new(vec![v, v, v, v], v));
        }
        let observed = rule.observers.iter().filter(|o| o.is_some()).count();
        assert_eq!(observed, 1, "25% of 4 attributes is 1 observer");
    }

    #[test]
    fn test_display_formats_conjunction() {
        let mut rule = test_rule(vec![
            Predicate::new(0, Operator::LessOrEqual, 1.5),
            Predicate::new(2, Operator::Greater, 0.25),
        ]);
        rule.predictor_mut().target_mean_mut().seed(4.0, 10.0);
        let text = format!("{}", rule);
        assert!(text.contains("x0 <= 1.500"), "got {}", text);
        assert!(text.contains("and x2 > 0.250"), "got {}", text);
        assert!(text.contains("=> y: 4.000"), "got {}", text);
    }

    #[test]
    fn test_normalized_error_is_finite_and_nonnegative() {
        let mut rule = test_rule(Vec::new());
        for i in 0..200 {
            let record = DenseRecord::new(vec![i as f64], (i % 10) as f64);
            rule.update(&record);
        }
        let error = rule.absolute_normalized_error(&DenseRecord::new(vec![5.0], 25.0));
        assert!(error.is_finite());
        assert!(error >= 0.0);
    }
}
