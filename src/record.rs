//! Labeled record abstraction.
//!
//! The learning core never parses files; it consumes anything implementing
//! [`Record`]. Two backing representations are provided: a dense array and a
//! sparse index/value list.

/// A single labeled observation.
///
/// Attribute values are `Option<f64>`: `None` means the value is missing,
/// which is distinct from any numeric sentinel. Missing values contribute
/// nothing to statistics, and predicates referencing them never match.
pub trait Record {
    /// Number of attributes, not counting the target.
    fn num_attributes(&self) -> usize;

    /// Value of attribute `index`, or `None` if missing.
    fn value(&self, index: usize) -> Option<f64>;

    /// Whether attribute `index` carries numeric (as opposed to categorical)
    /// values.
    fn is_numeric(&self, index: usize) -> bool;

    /// The regression target.
    fn target(&self) -> f64;

    /// Instance weight. Defaults to 1.0.
    fn weight(&self) -> f64 {
        1.0
    }
}

/// Dense record backed by one slot per attribute.
#[derive(Debug, Clone)]
pub struct DenseRecord {
    values: Vec<Option<f64>>,
    nominal: Vec<bool>,
    target: f64,
    weight: f64,
}

impl DenseRecord {
    /// Build a record with every attribute present and numeric.
    pub fn new(values: Vec<f64>, target: f64) -> Self {
        let nominal = vec![false; values.len()];
        Self {
            values: values.into_iter().map(Some).collect(),
            nominal,
            target,
            weight: 1.0,
        }
    }

    /// Build a record where some attributes may be missing.
    pub fn with_missing(values: Vec<Option<f64>>, target: f64) -> Self {
        let nominal = vec![false; values.len()];
        Self {
            values,
            nominal,
            target,
            weight: 1.0,
        }
    }

    /// Set the instance weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Mark an attribute as categorical.
    pub fn mark_nominal(mut self, index: usize) -> Self {
        self.nominal[index] = true;
        self
    }
}

impl Record for DenseRecord {
    fn num_attributes(&self) -> usize {
        self.values.len()
    }

    fn value(&self, index: usize) -> Option<f64> {
        self.values[index]
    }

    fn is_numeric(&self, index: usize) -> bool {
        !self.nominal[index]
    }

    fn target(&self) -> f64 {
        self.target
    }

    fn weight(&self) -> f64 {
        self.weight
    }
}

/// Sparse record backed by sorted (index, value) pairs.
///
/// Attributes without a stored pair read as 0.0 (implicit zeros, the usual
/// sparse-vector convention), not as missing. All attributes are numeric.
#[derive(Debug, Clone)]
pub struct SparseRecord {
    num_attributes: usize,
    indices: Vec<usize>,
    values: Vec<f64>,
    target: f64,
    weight: f64,
}

impl SparseRecord {
    /// Build from parallel index/value lists. Indices must be strictly
    /// increasing and in range.
    pub fn new(num_attributes: usize, indices: Vec<usize>, values: Vec<f64>, target: f64) -> Self {
        assert_eq!(indices.len(), values.len(), "index/value length mismatch");
        assert!(
            indices.windows(2).all(|w| w[0] < w[1]),
            "sparse indices must be strictly increasing"
        );
        if let Some(&last) = indices.last() {
            assert!(last < num_attributes, "sparse index out of range");
        }
        Self {
            num_attributes,
            indices,
            values,
            target,
            weight: 1.0,
        }
    }

    /// Set the instance weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

impl Record for SparseRecord {
    fn num_attributes(&self) -> usize {
        self.num_attributes
    }

    fn value(&self, index: usize) -> Option<f64> {
        assert!(index < self.num_attributes, "attribute index out of range");
        match self.indices.binary_search(&index) {
            Ok(pos) => Some(self.values[pos]),
            Err(_) => Some(0.0),
        }
    }

    fn is_numeric(&self, _index: usize) -> bool {
        true
    }

    fn target(&self) -> f64 {
        self.target
    }

    fn weight(&self) -> f64 {
        self.weight
    }
}
