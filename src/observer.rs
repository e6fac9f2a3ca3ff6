//! Per-attribute split observer.
//!
//! An incremental binary search tree over candidate cut points (the E-BST of
//! Ikonomovska et al.). Each node carries the target moments of the values
//! that went to its left (`<=`) and right (`>`) at insertion time, so the
//! merit of every stored cut point can later be recovered in a single
//! in-order pass with O(1) work per node.

use serde::{Deserialize, Serialize};

use crate::stats::{sdr, RunningMoments};

/// A candidate cut point with its merit and the target moments on each side.
#[derive(Debug, Clone)]
pub struct CutCandidate {
    pub threshold: f64,
    pub merit: f64,
    pub left: RunningMoments,
    pub right: RunningMoments,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Node {
    cut_point: f64,
    /// Target moments of observed values `<=` the cut point.
    left: RunningMoments,
    /// Target moments of observed values `>` the cut point.
    right: RunningMoments,
    lo: Option<Box<Node>>,
    hi: Option<Box<Node>>,
}

impl Node {
    fn new(value: f64, target: f64, weight: f64) -> Self {
        let mut left = RunningMoments::new();
        left.add(target, weight);
        Self {
            cut_point: value,
            left,
            right: RunningMoments::new(),
            lo: None,
            hi: None,
        }
    }

    fn insert(&mut self, value: f64, target: f64, weight: f64) {
        if value <= self.cut_point {
            self.left.add(target, weight);
            if value < self.cut_point {
                match &mut self.lo {
                    Some(child) => child.insert(value, target, weight),
                    None => self.lo = Some(Box::new(Node::new(value, target, weight))),
                }
            }
        } else {
            self.right.add(target, weight);
            match &mut self.hi {
                Some(child) => child.insert(value, target, weight),
                None => self.hi = Some(Box::new(Node::new(value, target, weight))),
            }
        }
    }
}

/// Incremental cut-point index for one numeric attribute.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SplitObserver {
    root: Option<Box<Node>>,
}

impl SplitObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one (attribute value, target) observation. Non-finite
    /// attribute values are ignored.
    pub fn observe(&mut self, attribute_value: f64, target: f64, weight: f64) {
        if !attribute_value.is_finite() {
            return;
        }
        match &mut self.root {
            Some(root) => root.insert(attribute_value, target, weight),
            None => self.root = Some(Box::new(Node::new(attribute_value, target, weight))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Best cut point by standard-deviation reduction against the given
    /// pre-split target moments. Ties keep the first (lowest) cut found.
    pub fn best_split(&self, pre: &RunningMoments) -> Option<CutCandidate> {
        let root = self.root.as_ref()?;
        let mut state = Search {
            left: RunningMoments::new(),
            right: *pre,
            pre: *pre,
            best: None,
        };
        state.visit(root);
        state.best
    }
}

/// In-order traversal state. The running left/right totals are adjusted by
/// each node's own left-side contribution before descending right, and
/// restored afterwards, which is what keeps the evaluation linear.
struct Search {
    left: RunningMoments,
    right: RunningMoments,
    pre: RunningMoments,
    best: Option<CutCandidate>,
}

impl Search {
    fn visit(&mut self, node: &Node) {
        if let Some(lo) = &node.lo {
            self.visit(lo);
        }

        self.left.add_moments(&node.left);
        self.right.sub_moments(&node.left);

        if self.right.weight() > 0.0 {
            let merit = sdr(&self.pre, &self.left, &self.right);
            let better = match &self.best {
                Some(best) => merit > best.merit,
                None => true,
            };
            if better {
                self.best = Some(CutCandidate {
                    threshold: node.cut_point,
                    merit,
                    left: self.left,
                    right: self.right,
                });
            }
        }

        if let Some(hi) = &node.hi {
            self.visit(hi);
        }

        self.left.sub_moments(&node.left);
        self.right.add_moments(&node.left);
    }
}
