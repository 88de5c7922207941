//! Core type definitions for sparse SVM problems and parameters

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// One `(index, value)` pair of a sparse row.
///
/// Rows stored in a [`NodeArena`] are terminated by a node whose index is `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SparseNode {
    pub index: i32,
    pub value: f64,
}

impl SparseNode {
    /// Row terminator
    pub const SENTINEL: SparseNode = SparseNode {
        index: -1,
        value: 0.0,
    };

    pub fn new(index: i32, value: f64) -> Self {
        Self { index, value }
    }

    pub fn is_sentinel(&self) -> bool {
        self.index == -1
    }
}

/// Real nodes of a row, stopping at the first sentinel if there is one
pub fn until_sentinel(row: &[SparseNode]) -> &[SparseNode] {
    match row.iter().position(SparseNode::is_sentinel) {
        Some(end) => &row[..end],
        None => row,
    }
}

/// Squared L2 norm of a sparse row
pub fn squared_norm(row: &[SparseNode]) -> f64 {
    row.iter().map(|n| n.value * n.value).sum()
}

/// Location of one row inside a [`NodeArena`]; `len` excludes the sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSpan {
    pub start: usize,
    pub len: usize,
}

impl RowSpan {
    fn nodes(&self) -> Range<usize> {
        self.start..self.start + self.len
    }
}

/// Contiguous, immutable storage for the nodes of many rows.
///
/// The arena is sized once and frozen; spans handed out by [`NodeArena::pack`]
/// stay valid for as long as any clone of the arena is alive. Clones share the
/// same allocation.
#[derive(Debug, Clone)]
pub struct NodeArena {
    nodes: Arc<[SparseNode]>,
}

impl NodeArena {
    /// Lay out `rows` back to back, each followed by a sentinel
    pub fn pack<R: AsRef<[SparseNode]>>(rows: &[R]) -> (Self, Vec<RowSpan>) {
        let total: usize = rows.iter().map(|r| r.as_ref().len() + 1).sum();
        let mut nodes = Vec::with_capacity(total);
        let mut spans = Vec::with_capacity(rows.len());

        for row in rows {
            let row = row.as_ref();
            spans.push(RowSpan {
                start: nodes.len(),
                len: row.len(),
            });
            nodes.extend_from_slice(row);
            nodes.push(SparseNode::SENTINEL);
        }
        debug_assert_eq!(nodes.len(), total);

        (
            Self {
                nodes: Arc::from(nodes),
            },
            spans,
        )
    }

    /// Real nodes of the row at `span`
    pub fn row(&self, span: RowSpan) -> &[SparseNode] {
        &self.nodes[span.nodes()]
    }

    /// Nodes of the row at `span`, including its trailing sentinel
    pub fn terminated_row(&self, span: RowSpan) -> &[SparseNode] {
        &self.nodes[span.start..span.start + span.len + 1]
    }

    pub fn nodes(&self) -> &[SparseNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether two handles point at the same allocation
    pub fn shares_storage(&self, other: &NodeArena) -> bool {
        Arc::ptr_eq(&self.nodes, &other.nodes)
    }
}

/// A training problem: labels plus rows stored in one arena
#[derive(Debug, Clone)]
pub struct Problem {
    labels: Vec<f64>,
    rows: Vec<RowSpan>,
    arena: NodeArena,
    max_feature_index: i32,
}

impl Problem {
    pub(crate) fn from_parts(
        labels: Vec<f64>,
        rows: Vec<RowSpan>,
        arena: NodeArena,
        max_feature_index: i32,
    ) -> Self {
        debug_assert_eq!(labels.len(), rows.len());
        Self {
            labels,
            rows,
            arena,
            max_feature_index,
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    pub fn spans(&self) -> &[RowSpan] {
        &self.rows
    }

    /// Real nodes of row `i`
    pub fn row(&self, i: usize) -> &[SparseNode] {
        self.arena.row(self.rows[i])
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    /// Largest feature index seen across all rows
    pub fn max_feature_index(&self) -> i32 {
        self.max_feature_index
    }

    /// Give up the labels and spans, keeping only the node storage
    pub fn into_arena(self) -> NodeArena {
        self.arena
    }
}

/// SVM formulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SVMType {
    CSvc,
    NuSvc,
    OneClass,
    EpsilonSvr,
    NuSvr,
}

impl SVMType {
    pub const ALL: [SVMType; 5] = [
        SVMType::CSvc,
        SVMType::NuSvc,
        SVMType::OneClass,
        SVMType::EpsilonSvr,
        SVMType::NuSvr,
    ];

    pub fn code(self) -> i64 {
        match self {
            SVMType::CSvc => 0,
            SVMType::NuSvc => 1,
            SVMType::OneClass => 2,
            SVMType::EpsilonSvr => 3,
            SVMType::NuSvr => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    /// Regression formulations predict real values rather than class labels
    pub fn is_regression(self) -> bool {
        matches!(self, SVMType::EpsilonSvr | SVMType::NuSvr)
    }

    pub fn is_classification(self) -> bool {
        matches!(self, SVMType::CSvc | SVMType::NuSvc)
    }
}

impl fmt::Display for SVMType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SVMType::CSvc => "c_svc",
            SVMType::NuSvc => "nu_svc",
            SVMType::OneClass => "one_class",
            SVMType::EpsilonSvr => "epsilon_svr",
            SVMType::NuSvr => "nu_svr",
        };
        f.write_str(name)
    }
}

/// Kernel family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KernelType {
    Linear,
    Polynomial,
    Rbf,
    Sigmoid,
    Precomputed,
}

impl KernelType {
    pub const ALL: [KernelType; 5] = [
        KernelType::Linear,
        KernelType::Polynomial,
        KernelType::Rbf,
        KernelType::Sigmoid,
        KernelType::Precomputed,
    ];

    pub fn code(self) -> i64 {
        match self {
            KernelType::Linear => 0,
            KernelType::Polynomial => 1,
            KernelType::Rbf => 2,
            KernelType::Sigmoid => 3,
            KernelType::Precomputed => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    /// Whether `gamma` takes part in this kernel
    pub fn uses_gamma(self) -> bool {
        matches!(
            self,
            KernelType::Polynomial | KernelType::Rbf | KernelType::Sigmoid
        )
    }
}

impl fmt::Display for KernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KernelType::Linear => "linear",
            KernelType::Polynomial => "polynomial",
            KernelType::Rbf => "rbf",
            KernelType::Sigmoid => "sigmoid",
            KernelType::Precomputed => "precomputed",
        };
        f.write_str(name)
    }
}

/// Training hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub svm_type: SVMType,
    pub kernel_type: KernelType,
    /// Polynomial degree
    pub degree: i32,
    /// Kernel bandwidth; `0.0` means "derive from the data"
    #[serde(with = "float_text")]
    pub gamma: f64,
    #[serde(with = "float_text")]
    pub coef0: f64,
    #[serde(with = "float_text")]
    pub nu: f64,
    /// Kernel cache size in megabytes
    #[serde(with = "float_text")]
    pub cache_size: f64,
    /// Regularization parameter
    #[serde(with = "float_text")]
    pub c: f64,
    /// Stopping tolerance
    #[serde(with = "float_text")]
    pub eps: f64,
    /// Width of the epsilon-insensitive tube (EPSILON_SVR)
    #[serde(with = "float_text")]
    pub p: f64,
    pub shrinking: bool,
    pub probability: bool,
    /// Per-class multipliers of `c` (C_SVC only)
    #[serde(default)]
    pub class_weights: BTreeMap<i32, f64>,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            svm_type: SVMType::CSvc,
            kernel_type: KernelType::Rbf,
            degree: 3,
            gamma: 0.0,
            coef0: 0.0,
            nu: 0.5,
            cache_size: 100.0,
            c: 1.0,
            eps: 1e-3,
            p: 0.1,
            shrinking: true,
            probability: false,
            class_weights: BTreeMap::new(),
        }
    }
}

/// Serde adapter writing non-finite floats as `inf`, `-inf` or `nan`.
///
/// JSON has no literal for them, and `c = inf` is a valid hard-margin setting.
mod float_text {
    use serde::de::{self, Deserializer, Unexpected};
    use serde::{Deserialize, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("nan")
        } else if value.is_sign_positive() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => match text.as_str() {
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                "nan" => Ok(f64::NAN),
                _ => Err(de::Error::invalid_value(
                    Unexpected::Str(&text),
                    &"a number, inf, -inf or nan",
                )),
            },
        }
    }
}

/// Result of one quadratic-programming solve
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Lagrange multipliers, in problem order
    pub alpha: Vec<f64>,
    /// Offset of the decision function (`f(x) = sum - rho`)
    pub rho: f64,
    /// Final objective value
    pub objective_value: f64,
    /// Upper bounds used for positive and negative examples
    pub upper_bound_p: f64,
    pub upper_bound_n: f64,
    /// Extra offset reported by the nu formulation
    pub r: f64,
    /// Number of iterations performed
    pub iterations: usize,
}
