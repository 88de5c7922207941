//! Error types for SVM training, prediction and model persistence

use thiserror::Error;

/// Broad failure classes surfaced to callers.
///
/// Several `SVMError` variants share a category; the category is what an
/// embedding application usually branches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Format,
    Io,
    SolverRejection,
    TrainingFailure,
    ModelAbsent,
}

#[derive(Error, Debug)]
pub enum SVMError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Incorrect data format on line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Empty dataset")]
    EmptyDataset,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Message produced by the solver's own parameter checker, passed through verbatim.
    #[error("{0}")]
    SolverRejected(String),

    #[error("Failed to train using the data")]
    TrainingFailed,

    #[error("{0}")]
    ModelAbsent(&'static str),

    #[error("Model does not contain probability information")]
    ProbabilityUnavailable,

    #[error("Failed to load the model: {0}")]
    ModelLoad(String),

    #[error("Failed to save the model: {0}")]
    ModelSave(String),
}

impl SVMError {
    /// Stable numeric code for this error
    pub fn code(&self) -> i64 {
        match self {
            SVMError::InvalidParameter(_) => 999,
            SVMError::TrainingFailed => 1000,
            SVMError::ParseError { .. } | SVMError::InvalidDataset(_) | SVMError::EmptyDataset => {
                1001
            }
            SVMError::IoError(_) => 1002,
            SVMError::SolverRejected(_) => 1003,
            SVMError::ModelAbsent(_) => 106,
            SVMError::ProbabilityUnavailable => 107,
            SVMError::ModelSave(_) => 121,
            SVMError::ModelLoad(_) => 1233,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            SVMError::InvalidParameter(_) => ErrorCategory::Configuration,
            SVMError::ParseError { .. } | SVMError::InvalidDataset(_) | SVMError::EmptyDataset => {
                ErrorCategory::Format
            }
            SVMError::IoError(_) | SVMError::ModelLoad(_) | SVMError::ModelSave(_) => {
                ErrorCategory::Io
            }
            SVMError::SolverRejected(_) => ErrorCategory::SolverRejection,
            SVMError::TrainingFailed => ErrorCategory::TrainingFailure,
            SVMError::ModelAbsent(_) | SVMError::ProbabilityUnavailable => {
                ErrorCategory::ModelAbsent
            }
        }
    }

    /// Line number for errors raised while reading line-oriented input
    pub fn line(&self) -> Option<usize> {
        match self {
            SVMError::ParseError { line, .. } => Some(*line),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SVMError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_distinguish_categories() {
        let errors = [
            SVMError::InvalidParameter("svm_type".to_string()),
            SVMError::TrainingFailed,
            SVMError::ParseError {
                line: 3,
                message: "bad".to_string(),
            },
            SVMError::SolverRejected("C <= 0".to_string()),
            SVMError::ModelAbsent("no model available to classify with"),
        ];

        let mut codes: Vec<i64> = errors.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_parse_error_carries_line() {
        let err = SVMError::ParseError {
            line: 7,
            message: "missing label".to_string(),
        };
        assert_eq!(err.line(), Some(7));
        assert_eq!(err.category(), ErrorCategory::Format);
        assert!(err.to_string().contains("line 7"));
    }

    #[test]
    fn test_solver_message_is_verbatim() {
        let err = SVMError::SolverRejected("specified nu is infeasible".to_string());
        assert_eq!(err.to_string(), "specified nu is infeasible");
        assert_eq!(err.category(), ErrorCategory::SolverRejection);
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SVMError = io.into();
        assert_eq!(err.code(), 1002);
        assert_eq!(err.category(), ErrorCategory::Io);
    }
}
