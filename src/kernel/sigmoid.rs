//! Sigmoid (hyperbolic tangent) kernel: K(x, y) = tanh(γ * <x, y> + r)

use crate::core::SparseNode;
use crate::kernel::linear::dot_product_sparse;
use crate::kernel::traits::Kernel;

/// Sigmoid kernel. Not positive semi-definite for every (γ, r).
#[derive(Debug, Clone, Copy)]
pub struct SigmoidKernel {
    pub gamma: f64,
    pub coef0: f64,
}

impl SigmoidKernel {
    pub fn new(gamma: f64, coef0: f64) -> Self {
        Self { gamma, coef0 }
    }
}

impl Kernel for SigmoidKernel {
    fn compute(&self, x: &[SparseNode], y: &[SparseNode]) -> f64 {
        (self.gamma * dot_product_sparse(x, y) + self.coef0).tanh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sigmoid_kernel() {
        let kernel = SigmoidKernel::new(0.5, -1.0);
        let x = vec![SparseNode::new(1, 2.0)];
        let y = vec![SparseNode::new(1, 3.0)];
        assert_relative_eq!(kernel.compute(&x, &y), 2.0f64.tanh());
    }

    #[test]
    fn test_sigmoid_kernel_bounded() {
        let kernel = SigmoidKernel::new(10.0, 0.0);
        let x = vec![SparseNode::new(1, 100.0)];
        let value = kernel.compute(&x, &x);
        assert!(value <= 1.0 && value > 0.99);
    }
}
