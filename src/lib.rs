//! Support Vector Machine training and prediction on sparse data
//!
//! Training data arrives as libsvm-format text, an open stream, or keyed
//! records built in code. Rows are packed into one shared node arena, trained
//! with a libsvm-compatible SMO solver, and exposed through [`api::SVM`] and
//! [`api::Model`].

pub mod api;
pub mod cache;
pub mod core;
pub mod data;
pub mod kernel;
pub mod optimizer;
pub mod params;
pub mod persistence;
pub mod solver;
pub mod utils;

// Re-export main types for convenience
pub use crate::api::{Model, SVM, SVMState};
pub use crate::cache::{CacheStats, KernelCache};
pub use crate::core::error::*;
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::data::{Key, Record, TrainingSource};
pub use crate::kernel::{Kernel, KernelFunction};
pub use crate::optimizer::{SVMOptimizer, TrainedSVM};
pub use crate::params::{DoubleAttribute, LongAttribute, OptionValue, ParameterStore};
pub use crate::solver::SolverLog;
pub use crate::utils::stats::SparseVectorStats;

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
