//! Split evaluation.
//!
//! Ranks the best candidate cut of every observed attribute by
//! standard-deviation reduction, then decides whether the gap between the
//! best and second-best is statistically convincing via the Hoeffding bound.

use tracing::trace;

use crate::observer::{CutCandidate, SplitObserver};
use crate::stats::RunningMoments;

/// Which side of the winning cut the expanded rule keeps covering.
///
/// The more homogeneous side (lower target spread) is cut off into the new
/// predicate; the rule keeps growing toward the side with the higher
/// remaining variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeptSide {
    /// Values `<=` the threshold.
    Left,
    /// Values `>` the threshold.
    Right,
}

/// A confirmed expansion decision.
#[derive(Debug, Clone)]
pub struct SplitDecision {
    pub attribute: usize,
    pub threshold: f64,
    pub merit: f64,
    pub kept_side: KeptSide,
    /// Target moments of the side the rule keeps covering.
    pub kept: RunningMoments,
    /// Target moments of the discarded side.
    pub other: RunningMoments,
}

/// One-sided Hoeffding deviation bound for a mean estimated from `n`
/// observations of a variable with the given range. Strictly decreasing in
/// `n` for a fixed confidence.
pub fn hoeffding_bound(range: f64, confidence: f64, n: f64) -> f64 {
    if n <= 0.0 {
        return f64::INFINITY;
    }
    ((range * range * (1.0 / confidence).ln()) / (2.0 * n)).sqrt()
}

/// Merit range for regression. Classification would use `log2(num_classes)`;
/// SDR ratios live in [0, 1].
const MERIT_RANGE: f64 = 1.0;

/// Evaluate all attribute observers and decide whether to expand.
///
/// `pre` holds the rule's target moments (the pre-split distribution) and
/// supplies `n` for the bound. Returns `None` when no cut wins with the
/// requested confidence.
pub fn evaluate(
    observers: &[Option<SplitObserver>],
    pre: &RunningMoments,
    split_confidence: f64,
    tie_threshold: f64,
) -> Option<SplitDecision> {
    let mut best: Option<(usize, CutCandidate)> = None;
    let mut second_merit = 0.0_f64;

    for (attribute, observer) in observers.iter().enumerate() {
        let Some(observer) = observer else { continue };
        let Some(candidate) = observer.best_split(pre) else {
            continue;
        };
        match &best {
            Some((_, current)) if candidate.merit <= current.merit => {
                if candidate.merit > second_merit {
                    second_merit = candidate.merit;
                }
            }
            _ => {
                if let Some((_, displaced)) = &best {
                    if displaced.merit > second_merit {
                        second_merit = displaced.merit;
                    }
                }
                best = Some((attribute, candidate));
            }
        }
    }

    let (attribute, candidate) = best?;
    if candidate.merit <= 0.0 {
        return None;
    }

    let bound = hoeffding_bound(MERIT_RANGE, split_confidence, pre.weight());
    let ratio = second_merit / candidate.merit;
    trace!(
        attribute,
        merit = candidate.merit,
        second_merit,
        bound,
        "split evaluation"
    );

    if ratio + bound < 1.0 || bound < tie_threshold {
        let kept_side = if candidate.left.population_sd() <= candidate.right.population_sd() {
            KeptSide::Left
        } else {
            KeptSide::Right
        };
        let (kept, other) = match kept_side {
            KeptSide::Left => (candidate.left, candidate.right),
            KeptSide::Right => (candidate.right, candidate.left),
        };
        Some(SplitDecision {
            attribute,
            threshold: candidate.threshold,
            merit: candidate.merit,
            kept_side,
            kept,
            other,
        })
    } else {
        None
    }
}
