//! Quadratic-programming solver
//!
//! Sequential Minimal Optimization over the generalized dual
//!
//! ```text
//! min 0.5 a^T Q a + p^T a   s.t.  y^T a = delta,  0 <= a_t <= C_t
//! ```
//!
//! which covers every SVM formulation through the choice of `Q`, `p` and the
//! bounds. Working pairs are picked with second-order information, and the
//! shrinking heuristic removes variables that are stuck at a bound.

pub mod qmatrix;
pub mod shrinking;
pub mod smo;

pub use self::qmatrix::{KernelMatrix, QMatrix};
pub use self::smo::{SMOSolver, SolverSettings, Variant};

use std::fmt;
use std::sync::Arc;

/// Destination for the solver's progress messages.
///
/// Defaults to discarding everything. No process-wide state is involved; the
/// sink travels with the solver value that uses it.
#[derive(Clone, Default)]
pub enum SolverLog {
    #[default]
    Silent,
    /// Forward each message to `log::debug!` under the `sparsvm::solver` target
    Forward,
    Custom(Arc<dyn Fn(&str) + Send + Sync>),
}

impl SolverLog {
    pub fn custom<F>(sink: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        SolverLog::Custom(Arc::new(sink))
    }

    pub fn emit(&self, args: fmt::Arguments<'_>) {
        match self {
            SolverLog::Silent => {}
            SolverLog::Forward => log::debug!(target: "sparsvm::solver", "{args}"),
            SolverLog::Custom(sink) => sink(&args.to_string()),
        }
    }

    pub fn is_silent(&self) -> bool {
        matches!(self, SolverLog::Silent)
    }
}

impl fmt::Debug for SolverLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverLog::Silent => f.write_str("Silent"),
            SolverLog::Forward => f.write_str("Forward"),
            SolverLog::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_custom_sink_receives_messages() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&lines);
        let log = SolverLog::custom(move |line| {
            if let Ok(mut lines) = captured.lock() {
                lines.push(line.to_string());
            }
        });

        log.emit(format_args!("obj = {}, rho = {}", 1.5, -0.25));

        let lines = lines.lock().expect("lock should not be poisoned");
        assert_eq!(*lines, vec!["obj = 1.5, rho = -0.25".to_string()]);
    }

    #[test]
    fn test_default_is_silent() {
        assert!(SolverLog::default().is_silent());
        SolverLog::default().emit(format_args!("dropped"));
    }
}
