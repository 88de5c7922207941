//! Kernel functions
//!
//! Each family lives in its own module; [`KernelFunction`] selects one from
//! training [`Parameters`](crate::core::Parameters).

pub mod linear;
pub mod polynomial;
pub mod precomputed;
pub mod rbf;
pub mod sigmoid;
pub mod traits;

pub use self::linear::{dot_product_sparse, LinearKernel};
pub use self::polynomial::PolynomialKernel;
pub use self::precomputed::PrecomputedKernel;
pub use self::rbf::RBFKernel;
pub use self::sigmoid::SigmoidKernel;
pub use self::traits::Kernel;

use crate::core::{KernelType, Parameters, SparseNode};

/// Kernel chosen at runtime from the parameter record
#[derive(Debug, Clone, Copy)]
pub enum KernelFunction {
    Linear(LinearKernel),
    Polynomial(PolynomialKernel),
    Rbf(RBFKernel),
    Sigmoid(SigmoidKernel),
    Precomputed(PrecomputedKernel),
}

impl KernelFunction {
    pub fn from_parameters(params: &Parameters) -> Self {
        match params.kernel_type {
            KernelType::Linear => KernelFunction::Linear(LinearKernel::new()),
            KernelType::Polynomial => KernelFunction::Polynomial(PolynomialKernel::new(
                params.degree,
                params.gamma,
                params.coef0,
            )),
            KernelType::Rbf => KernelFunction::Rbf(RBFKernel::new(params.gamma)),
            KernelType::Sigmoid => {
                KernelFunction::Sigmoid(SigmoidKernel::new(params.gamma, params.coef0))
            }
            KernelType::Precomputed => KernelFunction::Precomputed(PrecomputedKernel::new()),
        }
    }

    fn inner(&self) -> &dyn Kernel {
        match self {
            KernelFunction::Linear(k) => k,
            KernelFunction::Polynomial(k) => k,
            KernelFunction::Rbf(k) => k,
            KernelFunction::Sigmoid(k) => k,
            KernelFunction::Precomputed(k) => k,
        }
    }
}

impl Kernel for KernelFunction {
    fn compute(&self, x: &[SparseNode], y: &[SparseNode]) -> f64 {
        self.inner().compute(x, y)
    }

    fn compute_with_norms(
        &self,
        x: &[SparseNode],
        y: &[SparseNode],
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        self.inner().compute_with_norms(x, y, x_norm_sq, y_norm_sq)
    }

    fn uses_norms(&self) -> bool {
        self.inner().uses_norms()
    }
}
