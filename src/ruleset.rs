//! The rule set learner.
//!
//! Owns the decision rules, the default rule and the training loop: route
//! each instance to its covering rules, screen anomalies, watch for drift,
//! update statistics and attempt expansions on grace-period boundaries.

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::RulestreamConfig;
use crate::error::RulestreamError;
use crate::record::Record;
use crate::rule::{Predicate, Rule};
use crate::split::SplitDecision;
use crate::voting::{Vote, VoteAggregator};

/// Read-only snapshot of one rule, for reporting and diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSummary {
    pub id: u64,
    pub predicates: Vec<Predicate>,
    /// The rule's current running target mean.
    pub target_estimate: f64,
    pub instances_seen: f64,
    pub perceptron_weights: Vec<f64>,
}

impl RuleSummary {
    fn of(rule: &Rule) -> Self {
        Self {
            id: rule.id(),
            predicates: rule.predicates().to_vec(),
            target_estimate: rule.predictor().target_mean().prediction(),
            instances_seen: rule.instances_seen(),
            perceptron_weights: rule.predictor().perceptron().weights().to_vec(),
        }
    }
}

/// Snapshot of the whole model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSetSummary {
    pub rules: Vec<RuleSummary>,
    pub default_rule: RuleSummary,
    pub stats: RuleSetStats,
}

/// Counters the learner keeps while training.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RuleSetStats {
    pub instances_seen: u64,
    pub anomalies_suppressed: u64,
    pub drift_removals: u64,
    pub expansions: u64,
}

/// Streaming regression rule learner.
pub struct RuleSet {
    config: RulestreamConfig,
    rules: Vec<Rule>,
    default_rule: Rule,
    next_rule_id: u64,
    rng: StdRng,
    stats: RuleSetStats,
}

impl RuleSet {
    /// Build a learner with an empty default rule. Fails when the
    /// configuration is invalid.
    pub fn new(config: RulestreamConfig) -> Result<Self, RulestreamError> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let default_seed = rng.gen::<u64>();
        let default_rule = Rule::new(0, &config, default_seed);
        Ok(Self {
            config,
            rules: Vec::new(),
            default_rule,
            next_rule_id: 1,
            rng,
            stats: RuleSetStats::default(),
        })
    }

    pub fn config(&self) -> &RulestreamConfig {
        &self.config
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn default_rule(&self) -> &Rule {
        &self.default_rule
    }

    pub fn stats(&self) -> &RuleSetStats {
        &self.stats
    }

    /// Learn from one instance.
    ///
    /// In unordered mode every covering rule sees the instance; in ordered
    /// mode only the first covering rule does. Instances covered by no rule
    /// train the default rule, which may expand into the first decision
    /// rules.
    pub fn train(&mut self, record: &dyn Record) {
        self.stats.instances_seen += 1;
        let grace = self.config.grace_period;

        let mut covered = false;
        let mut index = 0;
        while index < self.rules.len() {
            if !self.rules[index].covers(record) {
                index += 1;
                continue;
            }
            covered = true;

            if self.rules[index].is_anomaly(record, &self.config.anomaly) {
                self.stats.anomalies_suppressed += 1;
                debug!(rule = self.rules[index].id(), "anomalous instance suppressed");
                if self.config.ordered {
                    break;
                }
                index += 1;
                continue;
            }

            // Drift is judged on the error of the prediction made before the
            // rule absorbs the instance.
            let error = self.rules[index].absolute_normalized_error(record);
            if self.rules[index].drift_update(error, record.weight()) {
                let removed = self.rules.remove(index);
                self.stats.drift_removals += 1;
                info!(rule = removed.id(), "rule removed after drift signal");
                continue;
            }

            let rule = &mut self.rules[index];
            rule.update(record);
            let seen = rule.instances_seen().round() as u64;
            if seen > 0 && seen % grace == 0 {
                if let Some(decision) = rule.evaluate_split(&self.config) {
                    if rule.apply_expansion(&decision) {
                        self.stats.expansions += 1;
                        debug!(rule = rule.id(), "rule expanded: {}", rule);
                    }
                }
            }

            if self.config.ordered {
                break;
            }
            index += 1;
        }

        if covered {
            return;
        }

        if self.default_rule.is_anomaly(record, &self.config.anomaly) {
            self.stats.anomalies_suppressed += 1;
            debug!("anomalous instance suppressed by default rule");
            return;
        }
        self.default_rule.update(record);
        let seen = self.default_rule.instances_seen().round() as u64;
        if seen > 0 && seen % grace == 0 {
            if let Some(decision) = self.default_rule.evaluate_split(&self.config) {
                self.expand_default(decision);
            }
        }
    }

    /// The default rule expands by becoming the first predicate of a new
    /// decision rule; a fresh default takes its place, seeded with the
    /// target mean of the branch the new rule does not keep.
    fn expand_default(&mut self, decision: SplitDecision) {
        let seed = self.rng.gen::<u64>();
        let mut fresh = Rule::new(0, &self.config, seed);
        fresh
            .predictor_mut()
            .target_mean_mut()
            .seed(decision.other.mean(), decision.other.weight());

        let mut specialized = std::mem::replace(&mut self.default_rule, fresh);
        specialized.set_id(self.next_rule_id);
        self.next_rule_id += 1;
        specialized.apply_expansion(&decision);
        self.stats.expansions += 1;
        info!(rule = specialized.id(), "new rule: {}", specialized);
        self.rules.push(specialized);
    }

    /// Predict the target for a record. Covering rules vote with
    /// error-derived weights; when none cover, the default rule answers
    /// alone and unweighted.
    pub fn predict(&self, record: &dyn Record) -> f64 {
        let mut aggregator = VoteAggregator::new(self.config.voting);
        for rule in &self.rules {
            if rule.covers(record) {
                aggregator.add_vote(Vote::new(rule.prediction(record), rule.current_error()));
                if self.config.ordered {
                    break;
                }
            }
        }
        match aggregator.combine() {
            Some(vote) => vote.prediction,
            None => self.default_rule.prediction(record),
        }
    }

    /// Serializable snapshot of every rule and the training counters.
    pub fn summary(&self) -> RuleSetSummary {
        RuleSetSummary {
            rules: self.rules.iter().map(RuleSummary::of).collect(),
            default_rule: RuleSummary::of(&self.default_rule),
            stats: self.stats,
        }
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} rules, {} instances, {} anomalies suppressed, {} drift removals",
            self.rules.len(),
            self.stats.instances_seen,
            self.stats.anomalies_suppressed,
            self.stats.drift_removals
        )?;
        for rule in &self.rules {
            writeln!(f, "  [{}] {} ({} instances)", rule.id(), rule, rule.instances_seen())?;
        }
        write!(
            f,
            "  [default] {} ({} instances)",
            self.default_rule,
            self.default_rule.instances_seen()
        )
    }
}
