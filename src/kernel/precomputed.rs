//! Precomputed kernel
//!
//! Rows carry their own kernel values. Each training row is
//! `0:<row id> 1:K(x, x_1) 2:K(x, x_2) ...` with 1-based row ids, so the
//! kernel value between a query `x` and a training row `y` is the value at
//! position `y[0].value` of `x`.

use crate::core::SparseNode;
use crate::kernel::Kernel;

#[derive(Debug, Clone, Copy, Default)]
pub struct PrecomputedKernel;

impl PrecomputedKernel {
    pub fn new() -> Self {
        Self
    }
}

impl Kernel for PrecomputedKernel {
    fn compute(&self, x: &[SparseNode], y: &[SparseNode]) -> f64 {
        let Some(id) = y.first() else {
            return 0.0;
        };
        if id.value < 0.0 {
            return 0.0;
        }
        x.get(id.value as usize).map_or(0.0, |n| n.value)
    }
}
