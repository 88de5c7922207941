//! Training input sources
//!
//! File paths and readers go through the strict line codec; pre-built records
//! go through the lenient keyed codec.

use crate::core::{Result, SVMError};
use crate::data::libsvm::{from_mapping, parse_line, Key, LabeledRow};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// A pre-parsed training row
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub label: f64,
    pub features: Vec<(Key, f64)>,
}

impl Record {
    pub fn new<K, I>(label: f64, features: I) -> Self
    where
        K: Into<Key>,
        I: IntoIterator<Item = (K, f64)>,
    {
        Self {
            label,
            features: features.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Where training rows come from
pub enum TrainingSource {
    /// libsvm-format text file
    Path(PathBuf),
    /// Already opened libsvm-format stream
    Reader(Box<dyn BufRead>),
    /// Rows built by the caller
    Records(Vec<Record>),
}

impl TrainingSource {
    pub fn reader<R: BufRead + 'static>(reader: R) -> Self {
        TrainingSource::Reader(Box::new(reader))
    }

    /// Resolve the source into labeled rows
    pub fn into_rows(self) -> Result<Vec<LabeledRow>> {
        match self {
            TrainingSource::Path(path) => require_features(read_file(&path)?),
            TrainingSource::Reader(reader) => require_features(read_rows(reader)?),
            TrainingSource::Records(records) => Ok(records
                .into_iter()
                .map(|r| (r.label, from_mapping(r.features)))
                .collect()),
        }
    }
}

impl fmt::Debug for TrainingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainingSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            TrainingSource::Reader(_) => f.write_str("Reader(..)"),
            TrainingSource::Records(records) => {
                write!(f, "Records({} rows)", records.len())
            }
        }
    }
}

impl From<&Path> for TrainingSource {
    fn from(path: &Path) -> Self {
        TrainingSource::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for TrainingSource {
    fn from(path: PathBuf) -> Self {
        TrainingSource::Path(path)
    }
}

impl From<&PathBuf> for TrainingSource {
    fn from(path: &PathBuf) -> Self {
        TrainingSource::Path(path.clone())
    }
}

impl From<&str> for TrainingSource {
    fn from(path: &str) -> Self {
        TrainingSource::Path(PathBuf::from(path))
    }
}

impl From<Vec<Record>> for TrainingSource {
    fn from(records: Vec<Record>) -> Self {
        TrainingSource::Records(records)
    }
}

/// Read every row of a libsvm-format file
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<LabeledRow>> {
    let file = File::open(path).map_err(SVMError::IoError)?;
    read_rows(BufReader::new(file))
}

/// Read rows until end of input; the first malformed line aborts
pub fn read_rows<R: BufRead>(reader: R) -> Result<Vec<LabeledRow>> {
    let mut rows = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.map_err(SVMError::IoError)?;
        let row = parse_line(&line).map_err(|message| SVMError::ParseError {
            line: line_num + 1,
            message,
        })?;
        rows.push(row);
    }

    log::debug!("Read {} rows", rows.len());
    Ok(rows)
}

/// Training rows need at least one feature; one line is one row here
fn require_features(rows: Vec<LabeledRow>) -> Result<Vec<LabeledRow>> {
    match rows.iter().position(|(_, nodes)| nodes.is_empty()) {
        Some(i) => Err(SVMError::ParseError {
            line: i + 1,
            message: "label without index:value pairs".to_string(),
        }),
        None => Ok(rows),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SparseNode;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_rows_from_reader() {
        let data = "+1 1:0.5 2:1.0\n-1 1:-0.5\n";
        let rows = read_rows(Cursor::new(data)).expect("rows should parse");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], (-1.0, vec![SparseNode::new(1, -0.5)]));
    }

    #[test]
    fn test_parse_error_reports_line_number() {
        let data = "+1 1:0.5\n-1 1:0.1\n+1 3:0.5 2:0.1\n";
        match read_rows(Cursor::new(data)) {
            Err(SVMError::ParseError { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_blank_line_is_rejected() {
        let data = "+1 1:0.5\n\n-1 1:0.1\n";
        let err = read_rows(Cursor::new(data)).unwrap_err();
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn test_label_only_line_reports_line_number() {
        let data = "+1 1:0.5\n-1 1:0.1\n+1\n";
        let err = TrainingSource::reader(Cursor::new(data))
            .into_rows()
            .unwrap_err();
        assert!(matches!(err, SVMError::ParseError { .. }));
        assert_eq!(err.line(), Some(3));

        // prediction input may carry all-zero rows
        let rows = read_rows(Cursor::new(data)).expect("rows should parse");
        assert!(rows[2].1.is_empty());
    }

    #[test]
    fn test_read_file() {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(file, "1 1:1 3:1").expect("Failed to write");
        writeln!(file, "2 2:1").expect("Failed to write");
        file.flush().expect("Failed to flush");

        let rows = TrainingSource::from(file.path())
            .into_rows()
            .expect("file should parse");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, 1.0);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = TrainingSource::from("/nonexistent/sparsvm/train.txt")
            .into_rows()
            .unwrap_err();
        assert!(matches!(err, SVMError::IoError(_)));
    }

    #[test]
    fn test_records_are_lenient() {
        let records = vec![Record::new(1.0, vec![(3i64, 0.5), (2i64, 0.1)])];
        let rows = TrainingSource::from(records)
            .into_rows()
            .expect("records never fail to convert");
        assert_eq!(rows[0].1.len(), 2);
    }
}
