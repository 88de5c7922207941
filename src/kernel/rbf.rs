//! RBF (Radial Basis Function) kernel implementation
//!
//! The RBF kernel is defined as: K(x, y) = exp(-γ * ||x - y||²)
//! where γ (gamma) is a hyperparameter that controls the kernel width.

use crate::core::SparseNode;
use crate::kernel::linear::dot_product_sparse;
use crate::kernel::Kernel;

/// RBF (Radial Basis Function) kernel: K(x, y) = exp(-γ * ||x - y||²)
///
/// The gamma parameter controls the "reach" of each training example:
/// - High gamma: close points have high influence (potential overfitting)
/// - Low gamma: distant points have influence (potential underfitting)
///
/// `1 / max_feature_index` is the usual starting point and is what a
/// zero gamma resolves to at training time.
#[derive(Debug, Clone, Copy)]
pub struct RBFKernel {
    gamma: f64,
}

impl RBFKernel {
    pub fn new(gamma: f64) -> Self {
        Self { gamma }
    }

    /// Get the gamma parameter
    pub fn gamma(&self) -> f64 {
        self.gamma
    }
}

impl Kernel for RBFKernel {
    fn compute(&self, x: &[SparseNode], y: &[SparseNode]) -> f64 {
        let squared_distance = compute_squared_euclidean_distance(x, y);
        (-self.gamma * squared_distance).exp()
    }

    fn compute_with_norms(
        &self,
        x: &[SparseNode],
        y: &[SparseNode],
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        // ||x - y||² = ||x||² + ||y||² - 2*x^T*y
        let squared_distance = x_norm_sq + y_norm_sq - 2.0 * dot_product_sparse(x, y);

        // Rounding can push the distance of near-identical rows below zero
        (-self.gamma * squared_distance.max(0.0)).exp()
    }

    fn uses_norms(&self) -> bool {
        true
    }
}

/// Squared Euclidean distance between two sparse rows
///
/// Indices present in only one row contribute the square of their value.
fn compute_squared_euclidean_distance(x: &[SparseNode], y: &[SparseNode]) -> f64 {
    let mut distance_sq = 0.0;
    let mut i = 0;
    let mut j = 0;

    while i < x.len() && j < y.len() {
        if x[i].index == y[j].index {
            let diff = x[i].value - y[j].value;
            distance_sq += diff * diff;
            i += 1;
            j += 1;
        } else if x[i].index < y[j].index {
            distance_sq += x[i].value * x[i].value;
            i += 1;
        } else {
            distance_sq += y[j].value * y[j].value;
            j += 1;
        }
    }

    distance_sq += x[i..].iter().map(|n| n.value * n.value).sum::<f64>();
    distance_sq += y[j..].iter().map(|n| n.value * n.value).sum::<f64>();

    distance_sq
}
