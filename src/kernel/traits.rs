//! Kernel trait definition

use crate::core::SparseNode;

/// Similarity between two sparse rows
///
/// Both arguments are sparse rows with ascending indices and no sentinel.
pub trait Kernel: Send + Sync {
    /// Compute kernel value K(x, y)
    fn compute(&self, x: &[SparseNode], y: &[SparseNode]) -> f64;

    /// K(x, y) given `|x|^2` and `|y|^2`, which the solver computes once per row.
    /// Kernels that cannot use them fall back to [`Kernel::compute`].
    fn compute_with_norms(
        &self,
        x: &[SparseNode],
        y: &[SparseNode],
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        let _ = (x_norm_sq, y_norm_sq);
        self.compute(x, y)
    }

    /// Whether `compute_with_norms` makes use of the norms
    fn uses_norms(&self) -> bool {
        false
    }
}
