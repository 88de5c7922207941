//! Core traits for SVM implementation
//!
//! [`Solver`] is the narrow contract between the binding layer (problem
//! building, parameter handling, model lifecycle) and the numerical engine.
//! Everything the orchestrator needs from an engine goes through it.

use crate::core::{Parameters, Problem, Result, SparseNode, SVMType};
use std::path::Path;

/// Trained model produced by a [`Solver`]
pub trait SolverModel {
    fn svm_type(&self) -> SVMType;

    /// Number of classes (2 for regression and one-class models)
    fn class_count(&self) -> usize;

    /// Class labels in the order used by probability estimates.
    /// Empty for regression and one-class models.
    fn labels(&self) -> &[i32];

    /// Whether the model carries probability information
    fn has_probability(&self) -> bool;

    /// Laplace scale parameter for regression models trained with probability
    /// estimates, `0.0` otherwise
    fn svr_probability(&self) -> f64;

    /// Effective parameters the model was trained with
    fn parameters(&self) -> &Parameters;

    fn support_vector_count(&self) -> usize;
}

/// Training, prediction and model I/O entry points of an SVM engine
pub trait Solver: Clone {
    type Model: SolverModel;

    /// Validate `params` against `problem`. `Err` carries the engine's message.
    fn check_parameter(&self, problem: &Problem, params: &Parameters)
        -> std::result::Result<(), String>;

    /// Train a model; `None` when the engine produced nothing.
    fn train(&self, problem: &Problem, params: &Parameters) -> Option<Self::Model>;

    /// Predicted label (or regression value) for `x`.
    ///
    /// `x` follows the sentinel convention: nodes after the first `-1` index
    /// are ignored.
    fn predict(&self, model: &Self::Model, x: &[SparseNode]) -> f64;

    /// Raw decision values for `x` together with the prediction
    fn predict_values(&self, model: &Self::Model, x: &[SparseNode]) -> (f64, Vec<f64>);

    /// Prediction plus per-class probability estimates ordered like
    /// [`SolverModel::labels`]; `None` when the model has no probability information
    fn predict_probability(&self, model: &Self::Model, x: &[SparseNode])
        -> Option<(f64, Vec<f64>)>;

    /// k-fold cross-validation; one prediction per problem row
    fn cross_validate(
        &self,
        problem: &Problem,
        params: &Parameters,
        folds: usize,
    ) -> std::result::Result<Vec<f64>, String>;

    fn save_model(&self, path: &Path, model: &Self::Model) -> Result<()>;

    fn load_model(&self, path: &Path) -> Result<Self::Model>;
}
