//! High-level API for Support Vector Machine operations
//!
//! [`SVM`] holds a configuration and turns training sources into [`Model`]s;
//! a [`Model`] predicts, reports on itself and moves to and from disk.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sparsvm::api::SVM;
//! use sparsvm::core::KernelType;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut svm = SVM::new().with_kernel_type(KernelType::Linear).with_c(10.0);
//! let model = svm.train("data.libsvm", None)?;
//!
//! let label = model.predict([(1, 0.5), (3, -1.0)])?;
//! println!("predicted {label}");
//!
//! let accuracy = svm.cross_validate("data.libsvm", 5)?;
//! println!("5-fold accuracy: {:.2}%", accuracy * 100.0);
//! model.save("data.model")?;
//! # Ok(())
//! # }
//! ```

use crate::core::{
    KernelType, NodeArena, Parameters, Problem, Result, SVMError, Solver, SolverModel, SparseNode,
    SVMType,
};
use crate::data::{self, from_mapping, Key, TrainingSource};
use crate::optimizer::SVMOptimizer;
use crate::params::{DoubleAttribute, LongAttribute, OptionValue, ParameterStore};
use crate::solver::SolverLog;
use crate::utils::metrics;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::Path;

/// Lifecycle of an [`SVM`] configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SVMState {
    /// Parameters set, no model produced yet
    Configured,
    /// At least one `train` call produced a model
    Trained,
}

/// High-level SVM interface with builder pattern
///
/// Generic over the engine behind the [`Solver`] contract; the in-crate
/// [`SVMOptimizer`] is the default.
#[derive(Debug, Clone)]
pub struct SVM<S: Solver = SVMOptimizer> {
    store: ParameterStore,
    solver: S,
    state: SVMState,
}

impl SVM<SVMOptimizer> {
    /// Create an SVM with default parameters and a silent solver
    pub fn new() -> Self {
        Self::with_solver(SVMOptimizer::new())
    }

    /// Create an SVM whose solver reports progress to `log`
    pub fn with_solver_log(log: SolverLog) -> Self {
        Self::with_solver(SVMOptimizer::with_log(log))
    }
}

impl Default for SVM<SVMOptimizer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Solver> SVM<S> {
    pub fn with_solver(solver: S) -> Self {
        Self {
            store: ParameterStore::new(),
            solver,
            state: SVMState::Configured,
        }
    }

    pub fn state(&self) -> SVMState {
        self.state
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    fn long(mut self, attribute: LongAttribute, value: i64) -> Self {
        if !self.store.set_long(attribute.id(), value) {
            warn!("ignoring {attribute:?} = {value}");
        }
        self
    }

    fn double(mut self, attribute: DoubleAttribute, value: f64) -> Self {
        if !self.store.set_double(attribute.id(), value) {
            warn!("ignoring {attribute:?} = {value}");
        }
        self
    }

    pub fn with_svm_type(self, svm_type: SVMType) -> Self {
        self.long(LongAttribute::SVMType, svm_type.code())
    }

    pub fn with_kernel_type(self, kernel_type: KernelType) -> Self {
        self.long(LongAttribute::KernelType, kernel_type.code())
    }

    pub fn with_degree(self, degree: i32) -> Self {
        self.long(LongAttribute::Degree, i64::from(degree))
    }

    pub fn with_shrinking(self, shrinking: bool) -> Self {
        self.long(LongAttribute::Shrinking, i64::from(shrinking))
    }

    /// Calibrate probability estimates while training
    pub fn with_probability(self, probability: bool) -> Self {
        self.long(LongAttribute::Probability, i64::from(probability))
    }

    /// Set the kernel bandwidth; `0.0` derives it from the data
    pub fn with_gamma(self, gamma: f64) -> Self {
        self.double(DoubleAttribute::Gamma, gamma)
    }

    pub fn with_nu(self, nu: f64) -> Self {
        self.double(DoubleAttribute::Nu, nu)
    }

    /// Set convergence tolerance
    pub fn with_eps(self, eps: f64) -> Self {
        self.double(DoubleAttribute::Eps, eps)
    }

    /// Set the epsilon-SVR tube width
    pub fn with_p(self, p: f64) -> Self {
        self.double(DoubleAttribute::P, p)
    }

    pub fn with_coef0(self, coef0: f64) -> Self {
        self.double(DoubleAttribute::Coef0, coef0)
    }

    /// Set regularization parameter C
    pub fn with_c(self, c: f64) -> Self {
        self.double(DoubleAttribute::C, c)
    }

    /// Set kernel cache size in megabytes
    pub fn with_cache_size(self, megabytes: f64) -> Self {
        self.double(DoubleAttribute::CacheSize, megabytes)
    }

    fn rejected(attribute: i64, value: impl std::fmt::Display) -> SVMError {
        SVMError::InvalidParameter(format!("failed to set the attribute {attribute} to {value}"))
    }

    /// Set an integer-valued attribute by ID
    pub fn set_long(&mut self, attribute: i64, value: i64) -> Result<()> {
        if self.store.set_long(attribute, value) {
            Ok(())
        } else {
            Err(Self::rejected(attribute, value))
        }
    }

    /// Set a float-valued attribute by ID
    pub fn set_double(&mut self, attribute: i64, value: f64) -> Result<()> {
        if self.store.set_double(attribute, value) {
            Ok(())
        } else {
            Err(Self::rejected(attribute, value))
        }
    }

    /// Set the shrinking or probability flag by ID
    pub fn set_bool(&mut self, attribute: i64, value: bool) -> Result<()> {
        if self.store.set_bool(attribute, value) {
            Ok(())
        } else {
            Err(Self::rejected(attribute, value))
        }
    }

    pub fn get_options(&self) -> BTreeMap<i64, OptionValue> {
        self.store.get_options()
    }

    pub fn set_options<I>(&mut self, options: I) -> Result<()>
    where
        I: IntoIterator<Item = (i64, OptionValue)>,
    {
        self.store.set_options(options)
    }

    /// The configured parameters, exactly as set
    pub fn parameters(&self) -> &Parameters {
        self.store.parameters()
    }

    /// Build the problem and fill in a data-derived gamma on `params`
    fn build_problem(rows: Vec<data::LabeledRow>, params: &mut Parameters) -> Result<Problem> {
        let problem = data::build(rows)?;
        debug!(
            "built problem: {} rows, max feature index {}",
            problem.len(),
            problem.max_feature_index()
        );
        if data::apply_auto_gamma(params, problem.max_feature_index()) {
            info!("gamma not set, using 1/{} = {}", problem.max_feature_index(), params.gamma);
        }
        Ok(problem)
    }

    /// Train a model.
    ///
    /// `class_weights` multiply `C` per class label and are only accepted for
    /// `C_SVC`. The returned model shares the problem's node storage.
    pub fn train<T>(
        &mut self,
        source: T,
        class_weights: Option<&BTreeMap<i32, f64>>,
    ) -> Result<Model<S>>
    where
        T: Into<TrainingSource>,
    {
        let rows = TrainingSource::into_rows(source.into())?;

        let mut params = self.store.snapshot();
        if let Some(weights) = class_weights {
            if params.svm_type != SVMType::CSvc {
                return Err(SVMError::InvalidParameter(format!(
                    "class weights are only supported for c_svc, not {}",
                    params.svm_type
                )));
            }
            params.class_weights = weights.clone();
        }

        let problem = Self::build_problem(rows, &mut params)?;
        self.solver
            .check_parameter(&problem, &params)
            .map_err(SVMError::SolverRejected)?;

        let handle = self
            .solver
            .train(&problem, &params)
            .ok_or(SVMError::TrainingFailed)?;

        info!(
            "trained {} model on {} rows ({} support vectors)",
            params.svm_type,
            problem.len(),
            handle.support_vector_count()
        );
        self.state = SVMState::Trained;
        Ok(Model::from_parts(
            handle,
            problem.into_arena(),
            self.solver.clone(),
        ))
    }

    /// Held-out prediction for every row of `source` under k-fold cross-validation
    pub fn cross_validate_targets<T>(&self, source: T, folds: usize) -> Result<(Vec<f64>, Vec<f64>)>
    where
        T: Into<TrainingSource>,
    {
        let rows = TrainingSource::into_rows(source.into())?;
        let mut params = self.store.snapshot();
        let problem = Self::build_problem(rows, &mut params)?;

        self.solver
            .check_parameter(&problem, &params)
            .map_err(SVMError::SolverRejected)?;
        let predicted = self
            .solver
            .cross_validate(&problem, &params, folds)
            .map_err(SVMError::SolverRejected)?;
        Ok((predicted, problem.labels().to_vec()))
    }

    /// k-fold cross-validation score.
    ///
    /// Mean squared error for regression types, accuracy otherwise.
    pub fn cross_validate<T>(&self, source: T, folds: usize) -> Result<f64>
    where
        T: Into<TrainingSource>,
    {
        let (predicted, labels) = self.cross_validate_targets(source, folds)?;

        if self.parameters().svm_type.is_regression() {
            let mse = metrics::mean_squared_error(&predicted, &labels);
            info!(
                "cross validation mean squared error = {mse}, squared correlation coefficient = {}",
                metrics::squared_correlation(&predicted, &labels)
            );
            Ok(mse)
        } else {
            let accuracy = metrics::accuracy(&predicted, &labels);
            info!("cross validation accuracy = {}%", accuracy * 100.0);
            Ok(accuracy)
        }
    }
}

const NO_MODEL_TO_CLASSIFY: &str = "no model available to classify with";
const NO_MODEL: &str = "the object does not contain a model";

/// Trained or loaded SVM model with high-level prediction interface
///
/// A model may be empty (see [`Model::new`]) until something is loaded into it.
pub struct Model<S: Solver = SVMOptimizer> {
    // Field order is drop order: the handle goes before the storage it refers to.
    handle: Option<S::Model>,
    arena: Option<NodeArena>,
    solver: S,
}

impl Model<SVMOptimizer> {
    /// An empty model
    pub fn new() -> Self {
        Self::with_solver(SVMOptimizer::new())
    }

    /// Load a model file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut model = Self::new();
        model.load_from(path)?;
        Ok(model)
    }
}

impl Default for Model<SVMOptimizer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Solver> Model<S> {
    /// An empty model served by `solver`
    pub fn with_solver(solver: S) -> Self {
        Self {
            handle: None,
            arena: None,
            solver,
        }
    }

    pub(crate) fn from_parts(handle: S::Model, arena: NodeArena, solver: S) -> Self {
        Self {
            handle: Some(handle),
            arena: Some(arena),
            solver,
        }
    }

    /// Replace whatever this model holds with the model stored at `path`.
    ///
    /// The previous handle and arena are released first, so on failure the
    /// model is left empty.
    pub fn load_from<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.handle = None;
        self.arena = None;

        let handle = self.solver.load_model(path.as_ref())?;
        debug!("loaded model from {}", path.as_ref().display());
        self.handle = Some(handle);
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let handle = self.handle.as_ref().ok_or(SVMError::ModelAbsent(NO_MODEL))?;
        self.solver.save_model(path.as_ref(), handle)
    }

    pub fn is_trained(&self) -> bool {
        self.handle.is_some()
    }

    /// The solver's model, if any
    pub fn handle(&self) -> Option<&S::Model> {
        self.handle.as_ref()
    }

    /// Training-data storage kept alive for the handle; `None` for loaded models
    pub fn arena(&self) -> Option<&NodeArena> {
        self.arena.as_ref()
    }

    fn require(&self, message: &'static str) -> Result<&S::Model> {
        self.handle.as_ref().ok_or(SVMError::ModelAbsent(message))
    }

    /// Sentinel-terminated node array for a prediction input
    fn vector<K, I>(features: I) -> Vec<SparseNode>
    where
        K: Into<Key>,
        I: IntoIterator<Item = (K, f64)>,
    {
        let mut nodes = from_mapping(features);
        nodes.push(SparseNode::SENTINEL);
        nodes
    }

    /// Predict the label (or regression value) of one vector.
    ///
    /// Keys may be integers or strings; keys that do not resolve to a
    /// non-negative index are skipped and the rest need not be ordered.
    pub fn predict<K, I>(&self, features: I) -> Result<f64>
    where
        K: Into<Key>,
        I: IntoIterator<Item = (K, f64)>,
    {
        let handle = self.require(NO_MODEL_TO_CLASSIFY)?;
        let x = Self::vector(features);
        Ok(self.solver.predict(handle, &x))
    }

    /// Prediction plus the probability of every class label
    pub fn predict_probability<K, I>(&self, features: I) -> Result<(f64, BTreeMap<i32, f64>)>
    where
        K: Into<Key>,
        I: IntoIterator<Item = (K, f64)>,
    {
        let handle = self.require(NO_MODEL_TO_CLASSIFY)?;
        if !handle.has_probability() {
            return Err(SVMError::ProbabilityUnavailable);
        }
        let x = Self::vector(features);
        let (label, estimates) = self
            .solver
            .predict_probability(handle, &x)
            .ok_or(SVMError::ProbabilityUnavailable)?;

        let per_class = handle.labels().iter().copied().zip(estimates).collect();
        Ok((label, per_class))
    }

    /// Raw decision values: one per class pair for classifiers, one otherwise
    pub fn decision_values<K, I>(&self, features: I) -> Result<Vec<f64>>
    where
        K: Into<Key>,
        I: IntoIterator<Item = (K, f64)>,
    {
        let handle = self.require(NO_MODEL_TO_CLASSIFY)?;
        let x = Self::vector(features);
        Ok(self.solver.predict_values(handle, &x).1)
    }

    pub fn class_count(&self) -> Result<usize> {
        Ok(self.require(NO_MODEL)?.class_count())
    }

    pub fn class_labels(&self) -> Result<Vec<i32>> {
        Ok(self.require(NO_MODEL)?.labels().to_vec())
    }

    pub fn svm_type(&self) -> Result<SVMType> {
        Ok(self.require(NO_MODEL)?.svm_type())
    }

    pub fn has_probability(&self) -> Result<bool> {
        Ok(self.require(NO_MODEL)?.has_probability())
    }

    /// Laplace scale of a regression model trained with probability estimates
    pub fn svr_probability(&self) -> Result<f64> {
        Ok(self.require(NO_MODEL)?.svr_probability())
    }

    pub fn support_vector_count(&self) -> Result<usize> {
        Ok(self.require(NO_MODEL)?.support_vector_count())
    }

    /// Effective training parameters, including a data-derived gamma
    pub fn parameters(&self) -> Result<&Parameters> {
        Ok(self.require(NO_MODEL)?.parameters())
    }
}

impl<S: Solver> std::fmt::Debug for Model<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("trained", &self.is_trained())
            .field("arena_nodes", &self.arena.as_ref().map(NodeArena::len))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Record;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn records() -> Vec<Record> {
        vec![
            Record::new(1.0, [(1, 2.0)]),
            Record::new(-1.0, [(1, -2.0)]),
            Record::new(1.0, [(1, 1.5)]),
            Record::new(-1.0, [(1, -1.5)]),
        ]
    }

    #[test]
    fn test_svm_builder_pattern() {
        let svm = SVM::new()
            .with_svm_type(SVMType::NuSvc)
            .with_kernel_type(KernelType::Polynomial)
            .with_degree(2)
            .with_c(2.0)
            .with_eps(0.01)
            .with_probability(true);

        let params = svm.parameters();
        assert_eq!(params.svm_type, SVMType::NuSvc);
        assert_eq!(params.kernel_type, KernelType::Polynomial);
        assert_eq!(params.degree, 2);
        assert_eq!(params.c, 2.0);
        assert_eq!(params.eps, 0.01);
        assert!(params.probability);
        assert_eq!(svm.state(), SVMState::Configured);
    }

    #[test]
    fn test_setters_report_rejection() {
        let mut svm = SVM::new();
        assert!(svm.set_long(LongAttribute::SVMType.id(), 9).is_err());
        assert!(svm.set_double(150, 1.0).is_err());
        assert!(svm.set_bool(LongAttribute::Degree.id(), true).is_err());
        svm.set_double(DoubleAttribute::C.id(), 4.0)
            .expect("C is a double attribute");
        assert_eq!(svm.parameters().c, 4.0);
        assert_eq!(svm.parameters().svm_type, SVMType::CSvc);
    }

    #[test]
    fn test_train_and_predict() {
        let mut svm = SVM::new().with_kernel_type(KernelType::Linear);
        let model = svm.train(records(), None).expect("training should succeed");

        assert_eq!(svm.state(), SVMState::Trained);
        assert!(model.is_trained());
        assert!(model.arena().is_some());
        assert_eq!(model.predict([(1, 1.0)]).expect("model is trained"), 1.0);
        assert_eq!(model.predict([("1", -3.0)]).expect("model is trained"), -1.0);
        assert_eq!(model.class_count().expect("model is trained"), 2);
        assert_eq!(model.class_labels().expect("model is trained"), vec![1, -1]);
        assert_eq!(model.svm_type().expect("model is trained"), SVMType::CSvc);
        assert!(!model.has_probability().expect("model is trained"));
        assert_eq!(model.decision_values([(1, 1.0)]).expect("model is trained").len(), 1);
    }

    #[test]
    fn test_failed_training_keeps_configured_state() {
        let mut svm = SVM::new().with_c(-1.0);
        let err = svm.train(records(), None).unwrap_err();
        assert!(matches!(err, SVMError::SolverRejected(ref m) if m == "C <= 0"));
        assert_eq!(svm.state(), SVMState::Configured);
    }

    #[test]
    fn test_weights_only_for_c_svc() {
        let weights = BTreeMap::from([(1, 2.0)]);

        let mut svm = SVM::new().with_svm_type(SVMType::NuSvr);
        let err = svm.train(records(), Some(&weights)).unwrap_err();
        assert!(matches!(err, SVMError::InvalidParameter(_)));
        assert_eq!(err.code(), 999);

        let mut svm = SVM::new();
        let model = svm
            .train(records(), Some(&weights))
            .expect("weights are valid for c_svc");
        assert_eq!(
            model.parameters().expect("model is trained").class_weights,
            weights
        );
        // the configuration itself carries no weights
        assert!(svm.parameters().class_weights.is_empty());
    }

    #[test]
    fn test_auto_gamma_does_not_touch_configuration() {
        let mut svm = SVM::new();
        let model = svm
            .train(
                vec![Record::new(1.0, [(4, 1.0)]), Record::new(-1.0, [(2, 1.0)])],
                None,
            )
            .expect("training should succeed");
        assert_eq!(model.parameters().expect("model is trained").gamma, 0.25);
        assert_eq!(svm.parameters().gamma, 0.0);
    }

    #[test]
    fn test_empty_model_errors() {
        let model = Model::new();
        assert!(!model.is_trained());

        let err = model.predict([(1, 1.0)]).unwrap_err();
        assert_eq!(err.to_string(), "no model available to classify with");
        assert_eq!(err.code(), 106);

        let file = NamedTempFile::new().expect("temp file");
        let err = model.save(file.path()).unwrap_err();
        assert_eq!(err.to_string(), "the object does not contain a model");
        assert!(model.class_count().is_err());
    }

    #[test]
    fn test_probability_requires_calibration() {
        let mut svm = SVM::new().with_kernel_type(KernelType::Linear);
        let model = svm.train(records(), None).expect("training should succeed");
        assert!(matches!(
            model.predict_probability([(1, 1.0)]),
            Err(SVMError::ProbabilityUnavailable)
        ));
    }

    #[test]
    fn test_load_from_replaces_trained_model() {
        let mut svm = SVM::new().with_kernel_type(KernelType::Linear);
        let first = svm.train(records(), None).expect("training should succeed");
        let file = NamedTempFile::new().expect("temp file");
        first.save(file.path()).expect("save should succeed");

        let mut other = SVM::new()
            .with_kernel_type(KernelType::Linear)
            .train(
                vec![Record::new(5.0, [(1, 1.0)]), Record::new(6.0, [(1, -1.0)])],
                None,
            )
            .expect("training should succeed");
        other.load_from(file.path()).expect("load should succeed");

        assert!(other.arena().is_none());
        assert_eq!(other.class_labels().expect("model is loaded"), vec![1, -1]);
        assert_eq!(other.predict([(1, 1.7)]).expect("model is loaded"), 1.0);
    }

    #[test]
    fn test_failed_load_leaves_model_empty() {
        let mut model = SVM::new()
            .with_kernel_type(KernelType::Linear)
            .train(records(), None)
            .expect("training should succeed");

        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "not a model").expect("write");
        assert!(matches!(
            model.load_from(file.path()),
            Err(SVMError::ModelLoad(_))
        ));
        assert!(!model.is_trained());
        assert!(model.arena().is_none());
    }

    #[test]
    fn test_cross_validate_accuracy() {
        let svm = SVM::new().with_kernel_type(KernelType::Linear);
        let accuracy = svm.cross_validate(records(), 2).expect("cv should succeed");
        assert!((0.0..=1.0).contains(&accuracy));

        let err = svm.cross_validate(records(), 10).unwrap_err();
        assert!(matches!(err, SVMError::SolverRejected(_)));
        assert_eq!(svm.state(), SVMState::Configured);
    }
}
