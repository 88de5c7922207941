//! Utility functions for SVM operations

use crate::core::Problem;

/// Reductions of predicted vs. true targets
pub mod metrics {
    /// Fraction of predictions exactly equal to their label
    pub fn accuracy(predicted: &[f64], labels: &[f64]) -> f64 {
        if labels.is_empty() {
            return 0.0;
        }
        let correct = predicted
            .iter()
            .zip(labels)
            .filter(|(p, y)| p == y)
            .count();
        correct as f64 / labels.len() as f64
    }

    /// `(1/l) * sum (v_i - y_i)^2`
    pub fn mean_squared_error(predicted: &[f64], labels: &[f64]) -> f64 {
        if labels.is_empty() {
            return 0.0;
        }
        let total: f64 = predicted
            .iter()
            .zip(labels)
            .map(|(v, y)| (v - y) * (v - y))
            .sum();
        total / labels.len() as f64
    }

    /// Squared Pearson correlation between predictions and labels.
    ///
    /// `NaN` when either side has zero variance.
    pub fn squared_correlation(predicted: &[f64], labels: &[f64]) -> f64 {
        let l = labels.len() as f64;
        let (mut sv, mut sy, mut svv, mut syy, mut svy) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for (&v, &y) in predicted.iter().zip(labels) {
            sv += v;
            sy += y;
            svv += v * v;
            syy += y * y;
            svy += v * y;
        }
        let numerator = l * svy - sv * sy;
        numerator * numerator / ((l * svv - sv * sv) * (l * syy - sy * sy))
    }
}

/// Dataset statistics
pub mod stats {
    use super::*;

    /// Sparsity summary of a problem
    #[derive(Debug, Clone, PartialEq)]
    pub struct SparseVectorStats {
        pub rows: usize,
        pub max_feature_index: i32,
        pub total_nonzeros: usize,
        pub avg_nonzeros_per_row: f64,
        /// `1 - nonzeros / (rows * max_feature_index)`
        pub sparsity: f64,
    }

    pub fn problem_stats(problem: &Problem) -> SparseVectorStats {
        let rows = problem.len();
        let total_nonzeros: usize = problem.spans().iter().map(|span| span.len).sum();
        let dense = rows as f64 * f64::from(problem.max_feature_index().max(0));

        SparseVectorStats {
            rows,
            max_feature_index: problem.max_feature_index(),
            total_nonzeros,
            avg_nonzeros_per_row: if rows == 0 {
                0.0
            } else {
                total_nonzeros as f64 / rows as f64
            },
            sparsity: if dense > 0.0 {
                1.0 - total_nonzeros as f64 / dense
            } else {
                0.0
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::metrics::*;
    use super::stats::*;
    use crate::core::SparseNode;
    use crate::data::ProblemBuilder;
    use approx::assert_relative_eq;

    #[test]
    fn test_accuracy_requires_exact_match() {
        let labels = [1.0, -1.0, 2.0, 2.0];
        assert_eq!(accuracy(&[1.0, -1.0, 2.0, 2.0], &labels), 1.0);
        assert_eq!(accuracy(&[1.0, 1.0, 2.0, 2.000001], &labels), 0.5);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }

    #[test]
    fn test_mean_squared_error() {
        assert_eq!(mean_squared_error(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
        assert_relative_eq!(mean_squared_error(&[1.0, 4.0], &[2.0, 2.0]), 2.5);
    }

    #[test]
    fn test_squared_correlation() {
        let labels = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(squared_correlation(&[2.0, 4.0, 6.0, 8.0], &labels), 1.0);
        assert_relative_eq!(squared_correlation(&[8.0, 6.0, 4.0, 2.0], &labels), 1.0);
        assert!(squared_correlation(&[1.0, 1.0, 1.0, 1.0], &labels).is_nan());
    }

    #[test]
    fn test_problem_stats() {
        let mut builder = ProblemBuilder::new();
        builder.push(1.0, vec![SparseNode::new(1, 1.0), SparseNode::new(4, 1.0)]);
        builder.push(-1.0, vec![SparseNode::new(2, 1.0)]);
        let problem = builder.build().expect("rows are valid");

        let stats = problem_stats(&problem);
        assert_eq!(stats.rows, 2);
        assert_eq!(stats.max_feature_index, 4);
        assert_eq!(stats.total_nonzeros, 3);
        assert_relative_eq!(stats.avg_nonzeros_per_row, 1.5);
        assert_relative_eq!(stats.sparsity, 1.0 - 3.0 / 8.0);
    }
}
