//! Probability calibration
//!
//! - binary classifiers: Platt scaling of decision values collected by an
//!   internal 5-fold cross-validation, fitted with the Newton method of
//!   Lin, Lin & Weng (2007);
//! - more than two classes: pairwise coupling of the binary estimates
//!   (Wu, Lin & Weng 2004);
//! - regression: the scale of a Laplace distribution fitted to
//!   cross-validation residuals.

use crate::core::Parameters;
use crate::optimizer::cross_validation::{cross_validation, Lcg};
use crate::optimizer::train::{train, TrainingSet};
use crate::solver::SolverLog;
use std::collections::BTreeMap;

const CALIBRATION_FOLDS: usize = 5;

/// Pairwise probabilities are kept inside `[MIN_PROBABILITY, 1 - MIN_PROBABILITY]`
pub(crate) const MIN_PROBABILITY: f64 = 1e-7;

fn sigmoid_objective(dec_values: &[f64], targets: &[f64], a: f64, b: f64) -> f64 {
    dec_values
        .iter()
        .zip(targets)
        .map(|(&f, &t)| {
            let f_apb = f * a + b;
            if f_apb >= 0.0 {
                t * f_apb + (-f_apb).exp().ln_1p()
            } else {
                (t - 1.0) * f_apb + f_apb.exp().ln_1p()
            }
        })
        .sum()
}

/// Fit `P(y = 1 | f) = 1 / (1 + exp(A f + B))` to decision values `f`
pub fn sigmoid_train(dec_values: &[f64], labels: &[f64]) -> (f64, f64) {
    const MAX_ITER: usize = 100;
    const MIN_STEP: f64 = 1e-10;
    const SIGMA: f64 = 1e-12;
    const EPS: f64 = 1e-5;

    let prior1 = labels.iter().filter(|&&y| y > 0.0).count() as f64;
    let prior0 = labels.len() as f64 - prior1;

    let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
    let lo_target = 1.0 / (prior0 + 2.0);
    let targets: Vec<f64> = labels
        .iter()
        .map(|&y| if y > 0.0 { hi_target } else { lo_target })
        .collect();

    let mut a = 0.0;
    let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
    let mut fval = sigmoid_objective(dec_values, &targets, a, b);

    for _ in 0..MAX_ITER {
        // gradient and Hessian, with SIGMA added to the diagonal
        let (mut h11, mut h22, mut h21) = (SIGMA, SIGMA, 0.0);
        let (mut g1, mut g2) = (0.0, 0.0);
        for (&f, &t) in dec_values.iter().zip(&targets) {
            let f_apb = f * a + b;
            let (p, q) = if f_apb >= 0.0 {
                let e = (-f_apb).exp();
                (e / (1.0 + e), 1.0 / (1.0 + e))
            } else {
                let e = f_apb.exp();
                (1.0 / (1.0 + e), e / (1.0 + e))
            };
            let d2 = p * q;
            h11 += f * f * d2;
            h22 += d2;
            h21 += f * d2;
            let d1 = t - p;
            g1 += f * d1;
            g2 += d1;
        }

        if g1.abs() < EPS && g2.abs() < EPS {
            break;
        }

        let det = h11 * h22 - h21 * h21;
        let da = -(h22 * g1 - h21 * g2) / det;
        let db = -(-h21 * g1 + h11 * g2) / det;
        let gd = g1 * da + g2 * db;

        let mut step = 1.0;
        while step >= MIN_STEP {
            let (new_a, new_b) = (a + step * da, b + step * db);
            let new_f = sigmoid_objective(dec_values, &targets, new_a, new_b);
            if new_f < fval + 0.0001 * step * gd {
                a = new_a;
                b = new_b;
                fval = new_f;
                break;
            }
            step /= 2.0;
        }

        if step < MIN_STEP {
            log::debug!("line search fails in probability calibration");
            break;
        }
    }

    (a, b)
}

pub fn sigmoid_predict(decision_value: f64, a: f64, b: f64) -> f64 {
    let f_apb = decision_value * a + b;
    if f_apb >= 0.0 {
        (-f_apb).exp() / (1.0 + (-f_apb).exp())
    } else {
        1.0 / (1.0 + f_apb.exp())
    }
}

/// Class probabilities from the `k x k` matrix of pairwise estimates `r`,
/// where `r[i][j]` estimates `P(class i | class i or j)`
pub fn multiclass_probability(r: &[Vec<f64>]) -> Vec<f64> {
    let k = r.len();
    let max_iter = k.max(100);
    let eps = 0.005 / k as f64;

    let mut q = vec![vec![0.0; k]; k];
    for t in 0..k {
        for j in 0..t {
            q[t][t] += r[j][t] * r[j][t];
            q[t][j] = q[j][t];
        }
        for j in t + 1..k {
            q[t][t] += r[j][t] * r[j][t];
            q[t][j] = -r[j][t] * r[t][j];
        }
    }

    let mut p = vec![1.0 / k as f64; k];
    let mut qp = vec![0.0; k];

    for iter in 0..max_iter {
        let mut p_qp = 0.0;
        for t in 0..k {
            qp[t] = q[t].iter().zip(&p).map(|(a, b)| a * b).sum();
            p_qp += p[t] * qp[t];
        }

        let max_error = qp
            .iter()
            .map(|&v| (v - p_qp).abs())
            .fold(0.0, f64::max);
        if max_error < eps {
            break;
        }
        if iter + 1 == max_iter {
            log::debug!("exceeds max_iter in multiclass_probability");
        }

        for t in 0..k {
            let diff = (-qp[t] + p_qp) / q[t][t];
            p[t] += diff;
            p_qp = (p_qp + diff * (diff * q[t][t] + 2.0 * qp[t])) / (1.0 + diff) / (1.0 + diff);
            for j in 0..k {
                qp[j] = (qp[j] + diff * q[t][j]) / (1.0 + diff);
                p[j] /= 1.0 + diff;
            }
        }
    }

    p
}

/// Platt parameters `(A, B)` for one binary machine.
///
/// `set` is labeled `+1` / `-1`; `cp` and `cn` are the weighted bounds of
/// the two classes.
pub(crate) fn binary_svc_probability(
    set: &TrainingSet<'_>,
    params: &Parameters,
    cp: f64,
    cn: f64,
    log: &SolverLog,
) -> (f64, f64) {
    let l = set.len();
    let mut perm: Vec<usize> = (0..l).collect();
    Lcg::new().shuffle(&mut perm);

    let mut sub_params = params.clone();
    sub_params.probability = false;
    sub_params.c = 1.0;
    sub_params.class_weights = BTreeMap::from([(1, cp), (-1, cn)]);

    let mut dec_values = vec![0.0; l];
    for fold in 0..CALIBRATION_FOLDS {
        let begin = fold * l / CALIBRATION_FOLDS;
        let end = (fold + 1) * l / CALIBRATION_FOLDS;

        let training = set.subset(perm[..begin].iter().chain(&perm[end..]).copied());
        let positives = training.labels().iter().filter(|&&y| y > 0.0).count();
        let negatives = training.len() - positives;

        let constant = match (positives, negatives) {
            (0, 0) => Some(0.0),
            (_, 0) => Some(1.0),
            (0, _) => Some(-1.0),
            _ => None,
        };

        match constant {
            Some(value) => {
                for &i in &perm[begin..end] {
                    dec_values[i] = value;
                }
            }
            None => {
                let model = train(&training, &sub_params, log);
                // the sub-model may order the classes -1, +1
                let sign = f64::from(model.labels.first().copied().unwrap_or(1));
                for &i in &perm[begin..end] {
                    let (_, values) = model.predict_values(set.row(i));
                    dec_values[i] = values[0] * sign;
                }
            }
        }
    }

    sigmoid_train(&dec_values, set.labels())
}

/// Laplace scale of the cross-validation residuals of a regression model
pub(crate) fn svr_probability(
    set: &TrainingSet<'_>,
    params: &Parameters,
    log: &SolverLog,
) -> f64 {
    let mut sub_params = params.clone();
    sub_params.probability = false;

    let predicted = cross_validation(set, &sub_params, CALIBRATION_FOLDS, log);
    let residuals: Vec<f64> = set
        .labels()
        .iter()
        .zip(&predicted)
        .map(|(y, v)| y - v)
        .collect();
    if residuals.is_empty() {
        return 0.0;
    }

    let mae = residuals.iter().map(|r| r.abs()).sum::<f64>() / residuals.len() as f64;

    // drop residuals beyond five standard deviations and refit
    let limit = 5.0 * (2.0 * mae * mae).sqrt();
    let kept: Vec<f64> = residuals
        .iter()
        .map(|r| r.abs())
        .filter(|&r| r <= limit)
        .collect();
    let sigma = if kept.is_empty() {
        mae
    } else {
        kept.iter().sum::<f64>() / kept.len() as f64
    };

    log.emit(format_args!(
        "Prob. model for test data: target value = predicted value + z,\n\
         z: Laplace distribution e^(-|z|/sigma)/(2sigma),sigma= {sigma}"
    ));
    sigma
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_sigmoid_predict_is_stable() {
        assert_abs_diff_eq!(sigmoid_predict(0.0, 0.0, 0.0), 0.5, epsilon = 1e-12);
        for f in [-1e3, 1e3] {
            let p = sigmoid_predict(f, 1.0, 0.0);
            assert!(p.is_finite() && (0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_sigmoid_train_orients_positive_values() {
        let dec = [2.0, 1.5, 1.0, 0.3, -0.4, -1.0, -1.5, -2.0];
        let labels = [1.0, 1.0, 1.0, 1.0, -1.0, -1.0, -1.0, -1.0];
        let (a, b) = sigmoid_train(&dec, &labels);

        // larger decision values mean larger P(y = 1), so A is negative
        assert!(a < 0.0);
        assert!(sigmoid_predict(2.0, a, b) > 0.5);
        assert!(sigmoid_predict(-2.0, a, b) < 0.5);
    }

    #[test]
    fn test_multiclass_probability_sums_to_one() {
        let r = vec![
            vec![0.0, 0.6, 0.5],
            vec![0.4, 0.0, 0.7],
            vec![0.5, 0.3, 0.0],
        ];
        let p = multiclass_probability(&r);
        assert_abs_diff_eq!(p.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
        assert!(p.iter().all(|&v| v > 0.0));
    }

    #[test]
    fn test_multiclass_probability_prefers_dominant_class() {
        let r = vec![
            vec![0.0, 0.9, 0.9],
            vec![0.1, 0.0, 0.5],
            vec![0.1, 0.5, 0.0],
        ];
        let p = multiclass_probability(&r);
        assert!(p[0] > p[1] && p[0] > p[2]);
    }
}
