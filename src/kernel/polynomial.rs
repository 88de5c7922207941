//! Polynomial Kernel Implementation
//!
//! The polynomial kernel is defined as:
//! K(x, y) = (γ * <x, y> + r)^d
//!
//! Where:
//! - γ (gamma): scaling factor for the dot product
//! - r (coef0): independent term in the polynomial
//! - d (degree): degree of the polynomial

use crate::core::SparseNode;
use crate::kernel::linear::dot_product_sparse;
use crate::kernel::traits::Kernel;

/// Polynomial kernel with configurable degree, gamma, and coefficient
#[derive(Debug, Clone, Copy)]
pub struct PolynomialKernel {
    pub gamma: f64,
    pub coef0: f64,
    pub degree: i32,
}

impl PolynomialKernel {
    pub fn new(degree: i32, gamma: f64, coef0: f64) -> Self {
        Self {
            gamma,
            coef0,
            degree,
        }
    }
}

impl Kernel for PolynomialKernel {
    fn compute(&self, x: &[SparseNode], y: &[SparseNode]) -> f64 {
        (self.gamma * dot_product_sparse(x, y) + self.coef0).powi(self.degree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_polynomial_kernel() {
        let kernel = PolynomialKernel::new(2, 0.5, 1.0);
        let x = vec![SparseNode::new(1, 1.0), SparseNode::new(2, 2.0)];
        let y = vec![SparseNode::new(1, 3.0), SparseNode::new(2, 1.0)];
        // (0.5 * 5 + 1)^2
        assert_relative_eq!(kernel.compute(&x, &y), 12.25);
    }

    #[test]
    fn test_degree_zero_is_constant() {
        let kernel = PolynomialKernel::new(0, 1.0, 0.0);
        let x = vec![SparseNode::new(1, 3.0)];
        assert_eq!(kernel.compute(&x, &x), 1.0);
    }
}
