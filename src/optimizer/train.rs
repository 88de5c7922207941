//! Training pipeline
//!
//! Every formulation is reduced to one call of the SMO solver:
//!
//! | type        | variables | linear term        | bounds      | variant  |
//! |-------------|-----------|--------------------|-------------|----------|
//! | C-SVC       | l         | -1                 | C+, C-      | standard |
//! | nu-SVC      | l         | 0                  | 1 (rescaled)| nu       |
//! | one-class   | l         | 0                  | 1           | standard |
//! | epsilon-SVR | 2l        | p - y, p + y       | C           | standard |
//! | nu-SVR      | 2l        | -y, +y             | C           | nu       |
//!
//! Classification with more than two classes trains one binary machine per
//! pair of classes (one-vs-one) and stores the coefficients in libsvm's
//! `(k - 1) x nSV` layout.

use crate::cache::KernelCache;
use crate::core::{NodeArena, OptimizationResult, Parameters, Problem, RowSpan, SparseNode, SVMType};
use crate::kernel::KernelFunction;
use crate::optimizer::probability::{binary_svc_probability, svr_probability};
use crate::optimizer::TrainedSVM;
use crate::solver::{KernelMatrix, QMatrix, SMOSolver, SolverLog, SolverSettings, Variant};
use log::{debug, info, warn};

/// Rows and targets of one training run, borrowed from a problem's arena
#[derive(Debug, Clone)]
pub(crate) struct TrainingSet<'p> {
    arena: &'p NodeArena,
    spans: Vec<RowSpan>,
    labels: Vec<f64>,
}

impl<'p> TrainingSet<'p> {
    pub(crate) fn from_problem(problem: &'p Problem) -> Self {
        Self {
            arena: problem.arena(),
            spans: problem.spans().to_vec(),
            labels: problem.labels().to_vec(),
        }
    }

    /// The rows at `indices`, in that order
    pub(crate) fn subset<I>(&self, indices: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        let (spans, labels) = indices
            .into_iter()
            .map(|i| (self.spans[i], self.labels[i]))
            .unzip();
        Self {
            arena: self.arena,
            spans,
            labels,
        }
    }

    /// The rows at `indices` relabeled with `labels`
    fn relabeled(&self, indices: &[usize], labels: Vec<f64>) -> Self {
        Self {
            arena: self.arena,
            spans: indices.iter().map(|&i| self.spans[i]).collect(),
            labels,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.spans.len()
    }

    pub(crate) fn labels(&self) -> &[f64] {
        &self.labels
    }

    pub(crate) fn row(&self, i: usize) -> &'p [SparseNode] {
        self.arena.row(self.spans[i])
    }

    fn rows(&self) -> Vec<&'p [SparseNode]> {
        self.spans.iter().map(|&span| self.arena.row(span)).collect()
    }
}

/// Rows grouped by class
#[derive(Debug, Clone)]
pub(crate) struct ClassGroups {
    /// Distinct labels in order of first appearance
    pub labels: Vec<i32>,
    /// Offset of each class inside `perm`
    pub start: Vec<usize>,
    pub count: Vec<usize>,
    /// Row indices ordered class by class
    pub perm: Vec<usize>,
}

impl ClassGroups {
    pub(crate) fn len(&self) -> usize {
        self.labels.len()
    }

    /// Row indices of class `c`
    pub(crate) fn members(&self, c: usize) -> &[usize] {
        &self.perm[self.start[c]..self.start[c] + self.count[c]]
    }
}

/// Group rows by their (integer-truncated) label.
///
/// Classes keep their order of first appearance, except that binary `-1/+1`
/// data always puts `+1` first so decision values are positive for `+1`.
pub(crate) fn group_classes(labels: &[f64]) -> ClassGroups {
    let mut classes: Vec<i32> = Vec::new();
    let mut count: Vec<usize> = Vec::new();
    let mut class_of = Vec::with_capacity(labels.len());

    for &label in labels {
        let label = label as i32;
        match classes.iter().position(|&c| c == label) {
            Some(c) => {
                count[c] += 1;
                class_of.push(c);
            }
            None => {
                class_of.push(classes.len());
                classes.push(label);
                count.push(1);
            }
        }
    }

    if classes == [-1, 1] {
        classes.swap(0, 1);
        count.swap(0, 1);
        for c in &mut class_of {
            *c = 1 - *c;
        }
    }

    let mut start = vec![0usize; classes.len()];
    for c in 1..classes.len() {
        start[c] = start[c - 1] + count[c - 1];
    }

    let mut next = start.clone();
    let mut perm = vec![0usize; labels.len()];
    for (i, &c) in class_of.iter().enumerate() {
        perm[next[c]] = i;
        next[c] += 1;
    }

    ClassGroups {
        labels: classes,
        start,
        count,
        perm,
    }
}

/// Coefficients and offset of one binary decision function
struct DecisionFunction {
    coef: Vec<f64>,
    rho: f64,
}

fn signs(labels: &[f64]) -> Vec<i8> {
    labels.iter().map(|&y| if y > 0.0 { 1 } else { -1 }).collect()
}

fn settings(params: &Parameters, cp: f64, cn: f64) -> SolverSettings {
    SolverSettings {
        cp,
        cn,
        eps: params.eps,
        shrinking: params.shrinking,
    }
}

fn log_cache(q: &QMatrix<'_>) {
    debug!("kernel cache hit rate {:.1}%", q.cache_hit_rate() * 100.0);
}

fn kernel_matrix<'a>(rows: Vec<&'a [SparseNode]>, params: &Parameters) -> KernelMatrix<'a> {
    KernelMatrix::new(rows, KernelFunction::from_parameters(params))
}

fn solve_c_svc(
    rows: Vec<&[SparseNode]>,
    labels: &[f64],
    params: &Parameters,
    cp: f64,
    cn: f64,
    log: &SolverLog,
) -> (Vec<f64>, OptimizationResult) {
    let l = rows.len();
    let y = signs(labels);
    let cache = KernelCache::megabytes(params.cache_size);
    let mut q = QMatrix::classification(kernel_matrix(rows, params), &y, cache);

    let result = SMOSolver::solve(
        &mut q,
        &vec![-1.0; l],
        &y,
        vec![0.0; l],
        settings(params, cp, cn),
        Variant::Standard,
        log,
    );
    log_cache(&q);

    if cp == cn && l > 0 {
        let sum_alpha: f64 = result.alpha.iter().sum();
        log.emit(format_args!("nu = {}", sum_alpha / (cp * l as f64)));
    }

    let coef = result
        .alpha
        .iter()
        .zip(&y)
        .map(|(&a, &s)| a * f64::from(s))
        .collect();
    (coef, result)
}

fn solve_nu_svc(
    rows: Vec<&[SparseNode]>,
    labels: &[f64],
    params: &Parameters,
    log: &SolverLog,
) -> (Vec<f64>, OptimizationResult) {
    let l = rows.len();
    let y = signs(labels);

    // nu * l / 2 of the multipliers' mass starts on each side
    let mut alpha = vec![0.0; l];
    let mut remaining = [params.nu * l as f64 / 2.0; 2];
    for (a, &s) in alpha.iter_mut().zip(&y) {
        let side = usize::from(s < 0);
        *a = remaining[side].min(1.0);
        remaining[side] -= *a;
    }

    let cache = KernelCache::megabytes(params.cache_size);
    let mut q = QMatrix::classification(kernel_matrix(rows, params), &y, cache);
    let mut result = SMOSolver::solve(
        &mut q,
        &vec![0.0; l],
        &y,
        alpha,
        settings(params, 1.0, 1.0),
        Variant::Nu,
        log,
    );
    log_cache(&q);

    let r = result.r;
    log.emit(format_args!("C = {}", 1.0 / r));

    let coef = result
        .alpha
        .iter()
        .zip(&y)
        .map(|(&a, &s)| a * f64::from(s) / r)
        .collect();
    result.rho /= r;
    result.objective_value /= r * r;
    result.upper_bound_p = 1.0 / r;
    result.upper_bound_n = 1.0 / r;
    (coef, result)
}

fn solve_one_class(
    rows: Vec<&[SparseNode]>,
    params: &Parameters,
    log: &SolverLog,
) -> (Vec<f64>, OptimizationResult) {
    let l = rows.len();
    let mass = params.nu * l as f64;
    let full = (mass as usize).min(l);

    let mut alpha = vec![0.0; l];
    alpha[..full].fill(1.0);
    if full < l {
        alpha[full] = mass - full as f64;
    }

    let cache = KernelCache::megabytes(params.cache_size);
    let mut q = QMatrix::one_class(kernel_matrix(rows, params), cache);
    let result = SMOSolver::solve(
        &mut q,
        &vec![0.0; l],
        &vec![1; l],
        alpha,
        settings(params, 1.0, 1.0),
        Variant::Standard,
        log,
    );
    log_cache(&q);

    (result.alpha.clone(), result)
}

/// Fold the `2l` regression multipliers back into `l` coefficients
fn fold_regression(alpha: &[f64]) -> Vec<f64> {
    let l = alpha.len() / 2;
    (0..l).map(|i| alpha[i] - alpha[i + l]).collect()
}

fn regression_signs(l: usize) -> Vec<i8> {
    let mut y = vec![1i8; l];
    y.resize(2 * l, -1);
    y
}

fn solve_epsilon_svr(
    rows: Vec<&[SparseNode]>,
    labels: &[f64],
    params: &Parameters,
    log: &SolverLog,
) -> (Vec<f64>, OptimizationResult) {
    let l = rows.len();
    let linear: Vec<f64> = labels
        .iter()
        .map(|&y| params.p - y)
        .chain(labels.iter().map(|&y| params.p + y))
        .collect();

    let cache = KernelCache::megabytes(params.cache_size);
    let mut q = QMatrix::regression(kernel_matrix(rows, params), cache);
    let result = SMOSolver::solve(
        &mut q,
        &linear,
        &regression_signs(l),
        vec![0.0; 2 * l],
        settings(params, params.c, params.c),
        Variant::Standard,
        log,
    );
    log_cache(&q);

    let coef = fold_regression(&result.alpha);
    if l > 0 {
        let sum_alpha: f64 = coef.iter().map(|a| a.abs()).sum();
        log.emit(format_args!("nu = {}", sum_alpha / (params.c * l as f64)));
    }
    (coef, result)
}

fn solve_nu_svr(
    rows: Vec<&[SparseNode]>,
    labels: &[f64],
    params: &Parameters,
    log: &SolverLog,
) -> (Vec<f64>, OptimizationResult) {
    let l = rows.len();
    let c = params.c;

    let mut alpha = vec![0.0; 2 * l];
    let mut remaining = c * params.nu * l as f64 / 2.0;
    for i in 0..l {
        let a = remaining.min(c);
        alpha[i] = a;
        alpha[i + l] = a;
        remaining -= a;
    }

    let linear: Vec<f64> = labels
        .iter()
        .map(|&y| -y)
        .chain(labels.iter().copied())
        .collect();

    let cache = KernelCache::megabytes(params.cache_size);
    let mut q = QMatrix::regression(kernel_matrix(rows, params), cache);
    let result = SMOSolver::solve(
        &mut q,
        &linear,
        &regression_signs(l),
        alpha,
        settings(params, c, c),
        Variant::Nu,
        log,
    );
    log_cache(&q);

    log.emit(format_args!("epsilon = {}", -result.r));
    (fold_regression(&result.alpha), result)
}

fn train_one(
    set: &TrainingSet<'_>,
    params: &Parameters,
    cp: f64,
    cn: f64,
    log: &SolverLog,
) -> DecisionFunction {
    let rows = set.rows();
    let labels = set.labels();
    let (coef, result) = match params.svm_type {
        SVMType::CSvc => solve_c_svc(rows, labels, params, cp, cn, log),
        SVMType::NuSvc => solve_nu_svc(rows, labels, params, log),
        SVMType::OneClass => solve_one_class(rows, params, log),
        SVMType::EpsilonSvr => solve_epsilon_svr(rows, labels, params, log),
        SVMType::NuSvr => solve_nu_svr(rows, labels, params, log),
    };

    log.emit(format_args!(
        "obj = {}, rho = {}",
        result.objective_value, result.rho
    ));

    let mut n_sv = 0;
    let mut n_bsv = 0;
    for (&a, &y) in coef.iter().zip(labels) {
        if a.abs() > 0.0 {
            n_sv += 1;
            let bound = if y > 0.0 {
                result.upper_bound_p
            } else {
                result.upper_bound_n
            };
            if a.abs() >= bound {
                n_bsv += 1;
            }
        }
    }
    log.emit(format_args!("nSV = {n_sv}, nBSV = {n_bsv}"));

    DecisionFunction {
        coef,
        rho: result.rho,
    }
}

/// Train a model on `set`
pub(crate) fn train(set: &TrainingSet<'_>, params: &Parameters, log: &SolverLog) -> TrainedSVM {
    match params.svm_type {
        SVMType::CSvc | SVMType::NuSvc => train_classification(set, params, log),
        SVMType::OneClass | SVMType::EpsilonSvr | SVMType::NuSvr => {
            train_single(set, params, log)
        }
    }
}

fn train_single(set: &TrainingSet<'_>, params: &Parameters, log: &SolverLog) -> TrainedSVM {
    let f = train_one(set, params, 0.0, 0.0, log);

    let mut support_vectors = Vec::new();
    let mut coef = Vec::new();
    let mut indices = Vec::new();
    for (i, &a) in f.coef.iter().enumerate() {
        if a.abs() > 0.0 {
            support_vectors.push(set.spans[i]);
            coef.push(a);
            indices.push(i + 1);
        }
    }

    let prob_a = if params.probability && params.svm_type.is_regression() {
        vec![svr_probability(set, params, log)]
    } else {
        Vec::new()
    };

    info!(
        "trained {} model with {} support vectors",
        params.svm_type,
        support_vectors.len()
    );

    TrainedSVM {
        params: params.clone(),
        class_count: 2,
        arena: set.arena.clone(),
        support_vectors,
        coefficients: vec![coef],
        rho: vec![f.rho],
        prob_a,
        prob_b: Vec::new(),
        support_vector_indices: indices,
        labels: Vec::new(),
        sv_per_class: Vec::new(),
    }
}

/// Per-class upper bound: `C` times the class weight, if any
fn weighted_c(params: &Parameters, classes: &[i32]) -> Vec<f64> {
    let mut weighted = vec![params.c; classes.len()];
    for (&label, &weight) in &params.class_weights {
        match classes.iter().position(|&c| c == label) {
            Some(c) => weighted[c] *= weight,
            None => warn!("class label {label} specified in weight is not found"),
        }
    }
    weighted
}

fn train_classification(
    set: &TrainingSet<'_>,
    params: &Parameters,
    log: &SolverLog,
) -> TrainedSVM {
    let groups = group_classes(set.labels());
    let k = groups.len();
    if k == 1 {
        warn!("training data in only one class");
    }

    let c = weighted_c(params, &groups.labels);
    let pairs = k * k.saturating_sub(1) / 2;

    // nonzero[r] for row r of the set
    let mut nonzero = vec![false; set.len()];
    let mut decisions = Vec::with_capacity(pairs);
    let mut prob_a = Vec::new();
    let mut prob_b = Vec::new();

    for i in 0..k {
        for j in i + 1..k {
            let (first, second) = (groups.members(i), groups.members(j));
            let members: Vec<usize> = first.iter().chain(second).copied().collect();
            let mut targets = vec![1.0; first.len()];
            targets.resize(members.len(), -1.0);
            let pair = set.relabeled(&members, targets);

            if params.probability {
                let (a, b) = binary_svc_probability(&pair, params, c[i], c[j], log);
                prob_a.push(a);
                prob_b.push(b);
            }

            let f = train_one(&pair, params, c[i], c[j], log);
            for (&row, &a) in members.iter().zip(&f.coef) {
                if a.abs() > 0.0 {
                    nonzero[row] = true;
                }
            }
            decisions.push(f);
        }
    }

    let sv_per_class: Vec<usize> = (0..k)
        .map(|c| groups.members(c).iter().filter(|&&r| nonzero[r]).count())
        .collect();
    let total: usize = sv_per_class.iter().sum();
    log.emit(format_args!("Total nSV = {total}"));

    let mut support_vectors = Vec::with_capacity(total);
    let mut indices = Vec::with_capacity(total);
    // position of each row inside the support-vector list
    let mut position = vec![usize::MAX; set.len()];
    for &row in &groups.perm {
        if nonzero[row] {
            position[row] = support_vectors.len();
            support_vectors.push(set.spans[row]);
            indices.push(row + 1);
        }
    }

    let mut coefficients = vec![vec![0.0; total]; k.saturating_sub(1)];
    let mut p = 0;
    for i in 0..k {
        for j in i + 1..k {
            let f = &decisions[p];
            let (first, second) = (groups.members(i), groups.members(j));
            // class i coefficients live in row j-1, class j coefficients in row i
            for (&row, &a) in first.iter().zip(&f.coef) {
                if nonzero[row] {
                    coefficients[j - 1][position[row]] = a;
                }
            }
            for (&row, &a) in second.iter().zip(&f.coef[first.len()..]) {
                if nonzero[row] {
                    coefficients[i][position[row]] = a;
                }
            }
            p += 1;
        }
    }

    info!("trained {} model: {k} classes, {total} support vectors", params.svm_type);

    TrainedSVM {
        params: params.clone(),
        class_count: k,
        arena: set.arena.clone(),
        support_vectors,
        coefficients,
        rho: decisions.iter().map(|d| d.rho).collect(),
        prob_a,
        prob_b,
        support_vector_indices: indices,
        labels: groups.labels,
        sv_per_class,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{KernelType, SolverModel};
    use crate::data::ProblemBuilder;
    use approx::assert_abs_diff_eq;

    fn problem(rows: &[(f64, &[(i32, f64)])]) -> Problem {
        let mut builder = ProblemBuilder::new();
        for &(label, pairs) in rows {
            builder.push(
                label,
                pairs.iter().map(|&(i, v)| SparseNode::new(i, v)).collect(),
            );
        }
        builder.build().expect("rows are valid")
    }

    fn linear(svm_type: SVMType) -> Parameters {
        Parameters {
            svm_type,
            kernel_type: KernelType::Linear,
            ..Parameters::default()
        }
    }

    #[test]
    fn test_group_classes_first_appearance() {
        let groups = group_classes(&[3.0, 1.0, 3.0, 2.0, 1.0]);
        assert_eq!(groups.labels, vec![3, 1, 2]);
        assert_eq!(groups.count, vec![2, 2, 1]);
        assert_eq!(groups.start, vec![0, 2, 4]);
        assert_eq!(groups.perm, vec![0, 2, 1, 4, 3]);
        assert_eq!(groups.members(1), &[1, 4]);
    }

    #[test]
    fn test_group_classes_puts_positive_first() {
        let groups = group_classes(&[-1.0, 1.0, -1.0]);
        assert_eq!(groups.labels, vec![1, -1]);
        assert_eq!(groups.perm, vec![1, 0, 2]);
    }

    #[test]
    fn test_binary_c_svc_model_layout() {
        let problem = problem(&[
            (1.0, &[(1, 1.0), (2, 0.0)]),
            (-1.0, &[(1, 0.0), (2, 1.0)]),
        ]);
        let set = TrainingSet::from_problem(&problem);
        let model = train(&set, &linear(SVMType::CSvc), &SolverLog::Silent);

        assert_eq!(model.class_count(), 2);
        assert_eq!(model.labels(), &[1, -1]);
        assert_eq!(model.sv_per_class, vec![1, 1]);
        assert_eq!(model.coefficients.len(), 1);
        assert_abs_diff_eq!(model.coefficients[0][0], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(model.coefficients[0][1], -1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(model.rho[0], 0.0, epsilon = 1e-9);
        assert!(model.arena.shares_storage(problem.arena()));
    }

    #[test]
    fn test_three_classes_train_three_machines() {
        let problem = problem(&[
            (1.0, &[(1, 0.0), (2, 0.0)]),
            (1.0, &[(1, 0.2), (2, 0.1)]),
            (2.0, &[(1, 5.0), (2, 0.0)]),
            (2.0, &[(1, 5.2), (2, 0.3)]),
            (3.0, &[(1, 0.0), (2, 5.0)]),
            (3.0, &[(1, 0.1), (2, 5.3)]),
        ]);
        let set = TrainingSet::from_problem(&problem);
        let params = Parameters {
            gamma: 0.5,
            ..Parameters::default()
        };
        let model = train(&set, &params, &SolverLog::Silent);

        assert_eq!(model.class_count(), 3);
        assert_eq!(model.labels(), &[1, 2, 3]);
        assert_eq!(model.rho.len(), 3);
        assert_eq!(model.coefficients.len(), 2);
        assert_eq!(
            model.sv_per_class.iter().sum::<usize>(),
            model.support_vector_count()
        );
    }

    #[test]
    fn test_class_weight_scales_bound() {
        let params = Parameters {
            class_weights: [(2, 3.0), (7, 10.0)].into_iter().collect(),
            ..Parameters::default()
        };
        assert_eq!(weighted_c(&params, &[1, 2]), vec![1.0, 3.0]);
    }

    #[test]
    fn test_one_class_keeps_nu_mass() {
        let problem = problem(&[
            (1.0, &[(1, 0.0)]),
            (1.0, &[(1, 0.1)]),
            (1.0, &[(1, 0.2)]),
            (1.0, &[(1, 3.0)]),
        ]);
        let set = TrainingSet::from_problem(&problem);
        let params = Parameters {
            svm_type: SVMType::OneClass,
            nu: 0.5,
            gamma: 1.0,
            ..Parameters::default()
        };
        let model = train(&set, &params, &SolverLog::Silent);
        let mass: f64 = model.coefficients[0].iter().sum();
        assert_abs_diff_eq!(mass, 2.0, epsilon = 1e-9);
        assert!(model.labels().is_empty());
    }

    #[test]
    fn test_epsilon_svr_fits_line() {
        let rows: Vec<(f64, Vec<(i32, f64)>)> = (0..8)
            .map(|k| {
                let x = k as f64 / 4.0;
                (2.0 * x + 1.0, vec![(1, x)])
            })
            .collect();
        let borrowed: Vec<(f64, &[(i32, f64)])> =
            rows.iter().map(|(y, x)| (*y, x.as_slice())).collect();
        let problem = problem(&borrowed);
        let set = TrainingSet::from_problem(&problem);
        let params = Parameters {
            c: 100.0,
            p: 0.01,
            ..linear(SVMType::EpsilonSvr)
        };
        let model = train(&set, &params, &SolverLog::Silent);

        let w: f64 = model
            .support_vectors
            .iter()
            .zip(&model.coefficients[0])
            .map(|(&span, &a)| a * problem.arena().row(span)[0].value)
            .sum();
        assert_abs_diff_eq!(w, 2.0, epsilon = 0.05);
        assert_abs_diff_eq!(-model.rho[0], 1.0, epsilon = 0.05);
    }
}
