//! The Q matrix of the dual problem
//!
//! - classification: `Q[i][j] = y_i * y_j * K(x_i, x_j)`
//! - one-class: `Q[i][j] = K(x_i, x_j)`
//! - regression: a `2l x 2l` matrix over the doubled variable set, where
//!   variable `t` maps to row `t mod l` with sign `+1` for `t < l` and `-1` after.

use crate::cache::KernelCache;
use crate::core::{squared_norm, SparseNode};
use crate::kernel::{Kernel, KernelFunction};
use std::rc::Rc;

/// Kernel evaluations over a fixed set of rows
pub struct KernelMatrix<'a> {
    rows: Vec<&'a [SparseNode]>,
    kernel: KernelFunction,
    norms: Option<Vec<f64>>,
}

impl<'a> KernelMatrix<'a> {
    pub fn new(rows: Vec<&'a [SparseNode]>, kernel: KernelFunction) -> Self {
        let norms = kernel
            .uses_norms()
            .then(|| rows.iter().map(|r| squared_norm(r)).collect());
        Self {
            rows,
            kernel,
            norms,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// K(x_i, x_j)
    pub fn evaluate(&self, i: usize, j: usize) -> f64 {
        match &self.norms {
            Some(norms) => {
                self.kernel
                    .compute_with_norms(self.rows[i], self.rows[j], norms[i], norms[j])
            }
            None => self.kernel.compute(self.rows[i], self.rows[j]),
        }
    }

    fn row(&self, i: usize) -> Vec<f64> {
        (0..self.rows.len()).map(|j| self.evaluate(i, j)).collect()
    }
}

enum Formulation {
    Classification { y: Vec<i8> },
    OneClass,
    Regression {
        sign: Vec<i8>,
        index: Vec<usize>,
        /// Last two expanded rows, reused while a working pair is updated
        expanded: [Option<(usize, Rc<[f64]>)>; 2],
        next: usize,
    },
}

/// Cached access to rows of Q
pub struct QMatrix<'a> {
    kernel: KernelMatrix<'a>,
    formulation: Formulation,
    cache: KernelCache,
    diagonal: Vec<f64>,
}

impl<'a> QMatrix<'a> {
    pub fn classification(kernel: KernelMatrix<'a>, y: &[i8], cache_bytes: usize) -> Self {
        let l = kernel.len();
        let diagonal = (0..l).map(|i| kernel.evaluate(i, i)).collect();
        Self {
            cache: KernelCache::with_memory_limit(cache_bytes, l),
            kernel,
            formulation: Formulation::Classification { y: y.to_vec() },
            diagonal,
        }
    }

    pub fn one_class(kernel: KernelMatrix<'a>, cache_bytes: usize) -> Self {
        let l = kernel.len();
        let diagonal = (0..l).map(|i| kernel.evaluate(i, i)).collect();
        Self {
            cache: KernelCache::with_memory_limit(cache_bytes, l),
            kernel,
            formulation: Formulation::OneClass,
            diagonal,
        }
    }

    pub fn regression(kernel: KernelMatrix<'a>, cache_bytes: usize) -> Self {
        let l = kernel.len();
        let mut sign = Vec::with_capacity(2 * l);
        let mut index = Vec::with_capacity(2 * l);
        sign.extend(std::iter::repeat(1i8).take(l));
        sign.extend(std::iter::repeat(-1i8).take(l));
        index.extend(0..l);
        index.extend(0..l);

        let diagonal = index.iter().map(|&k| kernel.evaluate(k, k)).collect();
        Self {
            cache: KernelCache::with_memory_limit(cache_bytes, l),
            kernel,
            formulation: Formulation::Regression {
                sign,
                index,
                expanded: [None, None],
                next: 0,
            },
            diagonal,
        }
    }

    /// Number of dual variables
    pub fn len(&self) -> usize {
        self.diagonal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagonal.is_empty()
    }

    /// `Q[i][i]` for every variable
    pub fn diagonal(&self) -> &[f64] {
        &self.diagonal
    }

    /// Full row `i` of Q
    pub fn row(&mut self, i: usize) -> Rc<[f64]> {
        let kernel = &self.kernel;
        match &mut self.formulation {
            Formulation::Classification { y } => self.cache.get_or_compute(i, || {
                let yi = f64::from(y[i]);
                (0..kernel.len())
                    .map(|j| yi * f64::from(y[j]) * kernel.evaluate(i, j))
                    .collect()
            }),
            Formulation::OneClass => self.cache.get_or_compute(i, || kernel.row(i)),
            Formulation::Regression {
                sign,
                index,
                expanded,
                next,
            } => {
                if let Some((_, row)) = expanded.iter().flatten().find(|(t, _)| *t == i) {
                    return Rc::clone(row);
                }
                let real = index[i];
                let k_row = self.cache.get_or_compute(real, || kernel.row(real));
                let si = f64::from(sign[i]);
                let row: Rc<[f64]> = index
                    .iter()
                    .zip(sign.iter())
                    .map(|(&k, &s)| si * f64::from(s) * k_row[k])
                    .collect();
                expanded[*next] = Some((i, Rc::clone(&row)));
                *next ^= 1;
                row
            }
        }
    }

    pub fn cache_hit_rate(&self) -> f64 {
        self.cache.hit_rate()
    }
}
