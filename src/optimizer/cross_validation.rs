//! k-fold cross-validation
//!
//! Classification folds are stratified: every class is shuffled on its own
//! and dealt across the folds in proportion to its size. Regression and
//! one-class problems use one random permutation cut into equal slices.
//! Shuffling uses a fixed-seed generator, so a run is reproducible.

use crate::core::{Parameters, SVMType};
use crate::optimizer::train::{group_classes, train, TrainingSet};
use crate::solver::SolverLog;

/// 64-bit linear congruential generator with a fixed seed
#[derive(Debug, Clone)]
pub(crate) struct Lcg {
    state: u64,
}

impl Lcg {
    pub(crate) fn new() -> Self {
        Self { state: 1 }
    }

    /// Uniform-ish value in `0..bound`; `bound` must be positive
    pub(crate) fn below(&mut self, bound: usize) -> usize {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.state >> 33) as usize % bound
    }

    /// Fisher-Yates shuffle
    pub(crate) fn shuffle(&mut self, items: &mut [usize]) {
        let n = items.len();
        for i in 0..n {
            let j = i + self.below(n - i);
            items.swap(i, j);
        }
    }
}

/// Assign rows to folds: returns the row permutation and the `folds + 1`
/// boundaries of each fold inside it
fn assign_folds(set: &TrainingSet<'_>, params: &Parameters, folds: usize) -> (Vec<usize>, Vec<usize>) {
    let l = set.len();
    let mut rng = Lcg::new();

    if params.svm_type.is_classification() && folds < l {
        let mut groups = group_classes(set.labels());
        for c in 0..groups.len() {
            let start = groups.start[c];
            let count = groups.count[c];
            rng.shuffle(&mut groups.perm[start..start + count]);
        }

        let mut perm = Vec::with_capacity(l);
        let mut bounds = vec![0usize];
        for fold in 0..folds {
            for c in 0..groups.len() {
                let count = groups.count[c];
                let members = groups.members(c);
                perm.extend_from_slice(&members[fold * count / folds..(fold + 1) * count / folds]);
            }
            bounds.push(perm.len());
        }
        (perm, bounds)
    } else {
        let mut perm: Vec<usize> = (0..l).collect();
        rng.shuffle(&mut perm);
        let bounds = (0..=folds).map(|fold| fold * l / folds).collect();
        (perm, bounds)
    }
}

/// Predictions for every row of `set`, each made by a model that did not see it.
///
/// `folds` larger than the number of rows falls back to leave-one-out.
pub(crate) fn cross_validation(
    set: &TrainingSet<'_>,
    params: &Parameters,
    folds: usize,
    log: &SolverLog,
) -> Vec<f64> {
    let l = set.len();
    if l == 0 {
        return Vec::new();
    }
    let folds = folds.clamp(1, l);

    let (perm, bounds) = assign_folds(set, params, folds);
    let calibrated = params.probability
        && matches!(params.svm_type, SVMType::CSvc | SVMType::NuSvc);

    let mut target = vec![0.0; l];
    for fold in 0..folds {
        let (begin, end) = (bounds[fold], bounds[fold + 1]);
        let training = set.subset(perm[..begin].iter().chain(&perm[end..]).copied());
        let model = train(&training, params, log);

        for &i in &perm[begin..end] {
            let x = set.row(i);
            target[i] = if calibrated {
                model
                    .predict_probability(x)
                    .map_or_else(|| model.predict(x), |(label, _)| label)
            } else {
                model.predict(x)
            };
        }
    }

    target
}
