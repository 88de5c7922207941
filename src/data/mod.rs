//! Input handling: the libsvm text codec, training sources and the problem builder

pub mod builder;
pub mod libsvm;
pub mod source;

pub use self::builder::{apply_auto_gamma, build, ProblemBuilder};
pub use self::libsvm::{format_line, from_mapping, parse_line, Key, LabeledRow};
pub use self::source::{read_file, read_rows, Record, TrainingSource};
