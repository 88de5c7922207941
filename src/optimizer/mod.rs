//! Optimization algorithms for SVM
//!
//! [`SVMOptimizer`] is the in-crate implementation of the
//! [`Solver`](crate::core::Solver) contract. It ties the kernels and the SMO
//! solver together into complete training, prediction, calibration and
//! cross-validation entry points, producing [`TrainedSVM`] models.

mod check;
mod cross_validation;
mod predict;
mod probability;
mod train;

pub use self::probability::{multiclass_probability, sigmoid_predict, sigmoid_train};

use crate::core::{
    NodeArena, Parameters, Problem, Result, RowSpan, Solver, SolverModel, SparseNode, SVMType,
    until_sentinel,
};
use crate::persistence;
use crate::solver::SolverLog;
use self::train::TrainingSet;
use std::path::Path;

/// High-level SVM optimizer that integrates kernel functions and the SMO solver
#[derive(Debug, Clone, Default)]
pub struct SVMOptimizer {
    log: SolverLog,
}

impl SVMOptimizer {
    /// Create an optimizer whose solver output is discarded
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an optimizer that reports solver progress to `log`
    pub fn with_log(log: SolverLog) -> Self {
        Self { log }
    }

    pub fn log(&self) -> &SolverLog {
        &self.log
    }
}

impl Solver for SVMOptimizer {
    type Model = TrainedSVM;

    fn check_parameter(
        &self,
        problem: &Problem,
        params: &Parameters,
    ) -> std::result::Result<(), String> {
        check::check_parameter(problem, params)
    }

    fn train(&self, problem: &Problem, params: &Parameters) -> Option<TrainedSVM> {
        if problem.is_empty() {
            return None;
        }
        Some(train::train(
            &TrainingSet::from_problem(problem),
            params,
            &self.log,
        ))
    }

    fn predict(&self, model: &TrainedSVM, x: &[SparseNode]) -> f64 {
        model.predict(until_sentinel(x))
    }

    fn predict_values(&self, model: &TrainedSVM, x: &[SparseNode]) -> (f64, Vec<f64>) {
        model.predict_values(until_sentinel(x))
    }

    fn predict_probability(
        &self,
        model: &TrainedSVM,
        x: &[SparseNode],
    ) -> Option<(f64, Vec<f64>)> {
        model.predict_probability(until_sentinel(x))
    }

    fn cross_validate(
        &self,
        problem: &Problem,
        params: &Parameters,
        folds: usize,
    ) -> std::result::Result<Vec<f64>, String> {
        if folds < 2 || folds > problem.len() {
            return Err("number of folds must be between 2 and the number of rows".to_string());
        }
        Ok(cross_validation::cross_validation(
            &TrainingSet::from_problem(problem),
            params,
            folds,
            &self.log,
        ))
    }

    fn save_model(&self, path: &Path, model: &TrainedSVM) -> Result<()> {
        persistence::save_model(path, model)
    }

    fn load_model(&self, path: &Path) -> Result<TrainedSVM> {
        persistence::load_model(path)
    }
}

/// A trained SVM model that can make predictions
///
/// Support vectors are spans into `arena`. A freshly trained model shares the
/// arena of the problem it was trained on; a loaded model owns a private one.
#[derive(Debug, Clone)]
pub struct TrainedSVM {
    pub(crate) params: Parameters,
    pub(crate) class_count: usize,
    pub(crate) arena: NodeArena,
    pub(crate) support_vectors: Vec<RowSpan>,
    /// `(class_count - 1)` rows of one coefficient per support vector
    pub(crate) coefficients: Vec<Vec<f64>>,
    /// One offset per pairwise machine
    pub(crate) rho: Vec<f64>,
    pub(crate) prob_a: Vec<f64>,
    pub(crate) prob_b: Vec<f64>,
    /// 1-based positions of the support vectors in the training data
    pub(crate) support_vector_indices: Vec<usize>,
    pub(crate) labels: Vec<i32>,
    pub(crate) sv_per_class: Vec<usize>,
}

impl TrainedSVM {
    /// Support vectors, in model order
    pub fn support_vectors(&self) -> impl Iterator<Item = &[SparseNode]> + '_ {
        self.support_vectors.iter().map(|&span| self.arena.row(span))
    }

    pub fn coefficients(&self) -> &[Vec<f64>] {
        &self.coefficients
    }

    pub fn rho(&self) -> &[f64] {
        &self.rho
    }

    pub fn support_vector_indices(&self) -> &[usize] {
        &self.support_vector_indices
    }

    /// Support vectors per class, in label order; empty for non-classifiers
    pub fn support_vectors_per_class(&self) -> &[usize] {
        &self.sv_per_class
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    pub(crate) fn has_probability_model(&self) -> bool {
        match self.params.svm_type {
            SVMType::CSvc | SVMType::NuSvc => !self.prob_a.is_empty() && !self.prob_b.is_empty(),
            SVMType::EpsilonSvr | SVMType::NuSvr => !self.prob_a.is_empty(),
            SVMType::OneClass => false,
        }
    }
}

impl SolverModel for TrainedSVM {
    fn svm_type(&self) -> SVMType {
        self.params.svm_type
    }

    fn class_count(&self) -> usize {
        self.class_count
    }

    fn labels(&self) -> &[i32] {
        &self.labels
    }

    fn has_probability(&self) -> bool {
        self.has_probability_model()
    }

    fn svr_probability(&self) -> f64 {
        if self.params.svm_type.is_regression() {
            self.prob_a.first().copied().unwrap_or(0.0)
        } else {
            0.0
        }
    }

    fn parameters(&self) -> &Parameters {
        &self.params
    }

    fn support_vector_count(&self) -> usize {
        self.support_vectors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::KernelType;
    use crate::data::ProblemBuilder;
    use approx::assert_relative_eq;
    use std::sync::{Arc, Mutex};

    fn separable() -> Problem {
        let mut builder = ProblemBuilder::new();
        for (label, x) in [(1.0, 2.0), (-1.0, -2.0), (1.0, 1.5), (-1.0, -1.5)] {
            builder.push(label, vec![SparseNode::new(1, x)]);
        }
        builder.build().expect("rows are valid")
    }

    fn linear() -> Parameters {
        Parameters {
            kernel_type: KernelType::Linear,
            ..Parameters::default()
        }
    }

    #[test]
    fn test_svm_training_simple_case() {
        let optimizer = SVMOptimizer::new();
        let problem = separable();
        let model = optimizer
            .train(&problem, &linear())
            .expect("training should produce a model");

        assert!(model.support_vector_count() > 0);
        assert_eq!(model.coefficients()[0].len(), model.support_vector_count());
        for i in 0..problem.len() {
            assert_eq!(optimizer.predict(&model, problem.row(i)), problem.labels()[i]);
        }
    }

    #[test]
    fn test_predict_stops_at_sentinel() {
        let optimizer = SVMOptimizer::new();
        let model = optimizer
            .train(&separable(), &linear())
            .expect("training should produce a model");

        let x = [
            SparseNode::new(1, 2.0),
            SparseNode::SENTINEL,
            SparseNode::new(1, -100.0),
        ];
        assert_eq!(optimizer.predict(&model, &x), 1.0);
    }

    #[test]
    fn test_cross_validate_rejects_bad_folds() {
        let optimizer = SVMOptimizer::new();
        let problem = separable();
        for folds in [0, 1, 5] {
            assert_eq!(
                optimizer.cross_validate(&problem, &linear(), folds),
                Err("number of folds must be between 2 and the number of rows".to_string())
            );
        }
        let target = optimizer
            .cross_validate(&problem, &linear(), 2)
            .expect("two folds are valid");
        assert_eq!(target.len(), problem.len());
    }

    #[test]
    fn test_solver_log_receives_progress() {
        let lines = Arc::new(Mutex::new(Vec::<String>::new()));
        let captured = Arc::clone(&lines);
        let optimizer = SVMOptimizer::with_log(SolverLog::custom(move |line| {
            if let Ok(mut lines) = captured.lock() {
                lines.push(line.to_string());
            }
        }));

        optimizer
            .train(&separable(), &linear())
            .expect("training should produce a model");

        let lines = lines.lock().expect("lock should not be poisoned");
        assert!(lines.iter().any(|l| l.starts_with("optimization finished")));
        assert!(lines.iter().any(|l| l.starts_with("obj = ")));
        assert!(lines.iter().any(|l| l.starts_with("Total nSV = ")));
    }

    #[test]
    fn test_svr_probability_is_positive() {
        let mut builder = ProblemBuilder::new();
        for k in 0..20 {
            let x = k as f64 / 10.0;
            let noise = if k % 2 == 0 { 0.05 } else { -0.05 };
            builder.push(3.0 * x + noise, vec![SparseNode::new(1, x)]);
        }
        let problem = builder.build().expect("rows are valid");
        let params = Parameters {
            svm_type: SVMType::EpsilonSvr,
            kernel_type: KernelType::Linear,
            c: 10.0,
            probability: true,
            ..Parameters::default()
        };

        let model = SVMOptimizer::new()
            .train(&problem, &params)
            .expect("training should produce a model");
        assert!(model.has_probability());
        assert!(model.svr_probability() > 0.0);
        assert!(model.labels().is_empty());
    }

    #[test]
    fn test_binary_probability_estimates() {
        let mut builder = ProblemBuilder::new();
        for k in 0..20 {
            let x = 1.0 + k as f64 * 0.1;
            builder.push(1.0, vec![SparseNode::new(1, x)]);
            builder.push(2.0, vec![SparseNode::new(1, -x)]);
        }
        let problem = builder.build().expect("rows are valid");
        let params = Parameters {
            probability: true,
            ..linear()
        };
        let optimizer = SVMOptimizer::new();
        let model = optimizer
            .train(&problem, &params)
            .expect("training should produce a model");

        let (label, estimates) = optimizer
            .predict_probability(&model, &[SparseNode::new(1, 2.5)])
            .expect("model is calibrated");
        assert_eq!(label, 1.0);
        assert_eq!(estimates.len(), 2);
        assert_relative_eq!(estimates[0] + estimates[1], 1.0, epsilon = 1e-12);
        assert!(estimates[0] > estimates[1]);
    }
}
