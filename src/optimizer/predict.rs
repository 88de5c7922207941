//! Prediction with a trained model
//!
//! Classification runs every pairwise machine and takes a majority vote;
//! ties go to the class listed first. Regression returns the decision value,
//! one-class its sign.

use crate::core::{SparseNode, SVMType};
use crate::kernel::{Kernel, KernelFunction};
use crate::optimizer::probability::{multiclass_probability, sigmoid_predict, MIN_PROBABILITY};
use crate::optimizer::TrainedSVM;

impl TrainedSVM {
    fn kernel_values(&self, x: &[SparseNode]) -> Vec<f64> {
        let kernel = KernelFunction::from_parameters(&self.params);
        self.support_vectors
            .iter()
            .map(|&span| kernel.compute(x, self.arena.row(span)))
            .collect()
    }

    /// Prediction and raw decision values for the real nodes `x`.
    ///
    /// Classification yields `k(k-1)/2` values ordered `(0,1), (0,2), ..., (k-2,k-1)`;
    /// the other types yield one.
    pub fn predict_values(&self, x: &[SparseNode]) -> (f64, Vec<f64>) {
        let kvalue = self.kernel_values(x);

        if !self.params.svm_type.is_classification() {
            let sum: f64 = self.coefficients[0]
                .iter()
                .zip(&kvalue)
                .map(|(a, k)| a * k)
                .sum::<f64>()
                - self.rho[0];
            let prediction = match self.params.svm_type {
                SVMType::OneClass if sum > 0.0 => 1.0,
                SVMType::OneClass => -1.0,
                _ => sum,
            };
            return (prediction, vec![sum]);
        }

        let k = self.class_count;
        let mut start = vec![0usize; k];
        for c in 1..k {
            start[c] = start[c - 1] + self.sv_per_class[c - 1];
        }

        let mut votes = vec![0usize; k];
        let mut values = Vec::with_capacity(k * k.saturating_sub(1) / 2);
        let mut p = 0;
        for i in 0..k {
            for j in i + 1..k {
                let si = start[i]..start[i] + self.sv_per_class[i];
                let sj = start[j]..start[j] + self.sv_per_class[j];
                let coef_i = &self.coefficients[j - 1];
                let coef_j = &self.coefficients[i];

                let sum = si.map(|s| coef_i[s] * kvalue[s]).sum::<f64>()
                    + sj.map(|s| coef_j[s] * kvalue[s]).sum::<f64>()
                    - self.rho[p];
                values.push(sum);

                if sum > 0.0 {
                    votes[i] += 1;
                } else {
                    votes[j] += 1;
                }
                p += 1;
            }
        }

        let mut winner = 0;
        for c in 1..k {
            if votes[c] > votes[winner] {
                winner = c;
            }
        }
        let label = self.labels.get(winner).copied().unwrap_or_default();
        (f64::from(label), values)
    }

    pub fn predict(&self, x: &[SparseNode]) -> f64 {
        self.predict_values(x).0
    }

    /// Prediction plus one probability per class, ordered like `labels`.
    ///
    /// `None` unless the model is a classifier with calibration data.
    /// Regression models with a Laplace scale return their prediction and no
    /// per-class estimates.
    pub fn predict_probability(&self, x: &[SparseNode]) -> Option<(f64, Vec<f64>)> {
        if !self.has_probability_model() {
            return None;
        }
        if self.params.svm_type.is_regression() {
            return Some((self.predict(x), Vec::new()));
        }

        let k = self.class_count;
        let (_, values) = self.predict_values(x);

        let mut pairwise = vec![vec![0.0; k]; k];
        let mut p = 0;
        for i in 0..k {
            for j in i + 1..k {
                let estimate = sigmoid_predict(values[p], self.prob_a[p], self.prob_b[p])
                    .clamp(MIN_PROBABILITY, 1.0 - MIN_PROBABILITY);
                pairwise[i][j] = estimate;
                pairwise[j][i] = 1.0 - estimate;
                p += 1;
            }
        }

        let estimates = if k == 2 {
            vec![pairwise[0][1], pairwise[1][0]]
        } else {
            multiclass_probability(&pairwise)
        };

        let mut best = 0;
        for c in 1..k {
            if estimates[c] > estimates[best] {
                best = c;
            }
        }
        let label = self.labels.get(best).copied().unwrap_or_default();
        Some((f64::from(label), estimates))
    }
}
