//! Dataset compatibility and format validation tests
//!
//! Tests for ensuring the accepted input shapes work across the pipeline

use sparsvm::api::SVM;
use sparsvm::data::{self, Key, Record, TrainingSource};
use sparsvm::utils::stats::problem_stats;
use sparsvm::{KernelType, SVMError, SVMType};
use std::io::{Cursor, Write};
use tempfile::NamedTempFile;

fn data_file(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    write!(temp_file, "{content}").expect("Failed to write");
    temp_file.flush().expect("Failed to flush");
    temp_file
}

/// Test libsvm format variations
#[test]
fn test_libsvm_format_variations() {
    let test_cases = vec![
        // Basic format
        ("+1 1:0.5 3:1.2 7:0.8\n-1 2:0.3 5:2.1\n", "basic format"),
        // Tabs and repeated spaces
        ("+1\t1:0.5   3:1.2\n-1  2:0.3\t5:2.1\n", "mixed whitespace"),
        // Different label formats
        ("1 1:0.5 2:1.0\n-1.0 1:-0.5 2:-1.0\n", "plain and float labels"),
        // Scientific notation values
        ("+1 1:1e-3 2:2.5E2\n-1 1:-1e-3 2:-2.5E2\n", "exponent values"),
        // Sparse indices (non-consecutive)
        (
            "+1 1:1.0 10:2.0 100:3.0\n-1 5:1.5 50:2.5 500:3.5\n",
            "sparse indices",
        ),
        // No trailing newline
        ("+1 1:2.0\n-1 1:-2.0", "missing final newline"),
    ];

    for (content, description) in test_cases {
        let temp_file = data_file(content);

        let rows = data::read_file(temp_file.path())
            .unwrap_or_else(|e| panic!("{description}: failed to read: {e}"));
        assert_eq!(rows.len(), 2, "{description}");
        assert!(rows.iter().all(|(_, nodes)| !nodes.is_empty()), "{description}");

        let mut svm = SVM::new().with_kernel_type(KernelType::Linear);
        let model = svm
            .train(temp_file.path(), None)
            .unwrap_or_else(|e| panic!("{description}: failed to train: {e}"));
        assert_eq!(model.class_count().unwrap(), 2, "{description}");
    }
}

#[test]
fn test_malformed_data_handling() {
    let test_cases = vec![
        ("+1 1:0.5\nfoo 1:0.5\n", 2, "non-numeric label"),
        ("+1 1:0.5 2\n", 1, "token without colon"),
        ("+1 a:0.5\n", 1, "non-numeric index"),
        ("+1 1:abc\n", 1, "non-numeric value"),
        ("+1 1:0.5\n-1 2:0.1 2:0.2\n", 2, "repeated index"),
        ("+1 1:0.5\n-1 5:0.1 3:0.2\n", 2, "decreasing index"),
        ("+1 1:0.5\n\n-1 1:0.2\n", 2, "blank line"),
    ];

    for (content, line, description) in test_cases {
        let temp_file = data_file(content);
        let err = SVM::new().train(temp_file.path(), None).unwrap_err();
        assert_eq!(err.line(), Some(line), "{description}: {err}");
        assert_eq!(err.code(), 1001, "{description}");
    }
}

#[test]
fn test_dataset_validation() {
    // label-only lines are format errors on their line
    let temp_file = data_file("+1 1:0.5\n-1\n");
    let err = SVM::new().train(temp_file.path(), None).unwrap_err();
    assert!(matches!(err, SVMError::ParseError { .. }), "{err}");
    assert_eq!(err.line(), Some(2));
    assert_eq!(err.code(), 1001);

    // empty input
    let temp_file = data_file("");
    let err = SVM::new().train(temp_file.path(), None).unwrap_err();
    assert!(matches!(err, SVMError::EmptyDataset));

    // records whose keys all fail to resolve leave an empty row
    let err = SVM::new()
        .train(vec![Record::new(1.0, [(-4, 1.0)])], None)
        .unwrap_err();
    assert!(matches!(err, SVMError::InvalidDataset(_)));
}

/// The same rows from a path, a reader and records build the same problem
#[test]
fn test_cross_source_compatibility() {
    let content = "+1 1:2.0 3:1.0\n-1 2:-2.0\n+1 1:1.5 3:0.5\n-1 2:-1.5\n";
    let temp_file = data_file(content);

    let from_path = TrainingSource::from(temp_file.path()).into_rows().unwrap();
    let from_reader = TrainingSource::reader(Cursor::new(content.to_string()))
        .into_rows()
        .unwrap();
    let from_records = TrainingSource::from(vec![
        Record::new(1.0, [(3, 1.0), (1, 2.0)]),
        Record::new(-1.0, [("2", -2.0)]),
        Record::new(1.0, [(Key::Int(1), 1.5), (Key::Str("3".into()), 0.5)]),
        Record::new(-1.0, [(2, -1.5)]),
    ])
    .into_rows()
    .unwrap();

    assert_eq!(from_path, from_reader);
    assert_eq!(from_path, from_records);

    let problem = data::build(from_path).unwrap();
    assert_eq!(problem.max_feature_index(), 3);
    assert_eq!(problem.labels(), &[1.0, -1.0, 1.0, -1.0]);
}

/// String keys resolve like a leading decimal integer
#[test]
fn test_string_key_coercion() {
    assert_eq!(Key::from("12").to_index(), Some(12));
    assert_eq!(Key::from(" 7abc").to_index(), Some(7));
    assert_eq!(Key::from("+3").to_index(), Some(3));
    assert_eq!(Key::from("abc").to_index(), Some(0));
    assert_eq!(Key::from("-2").to_index(), None);
    assert_eq!(Key::from(-1_i64).to_index(), None);
    assert_eq!(Key::from(i64::MAX).to_index(), None);

    let nodes = data::from_mapping([("b", 1.0), ("2", 2.0), ("-5", 3.0)]);
    let indices: Vec<i32> = nodes.iter().map(|n| n.index).collect();
    assert_eq!(indices, vec![0, 2]);
}

#[test]
fn test_large_dimensions() {
    let content = "+1 1:1.0 100000:2.0\n-1 50000:1.0\n+1 2:1.0 99999:0.5\n-1 3:1.0\n";
    let temp_file = data_file(content);

    let problem = data::build(data::read_file(temp_file.path()).unwrap()).unwrap();
    let stats = problem_stats(&problem);
    assert_eq!(stats.max_feature_index, 100_000);
    assert_eq!(stats.total_nonzeros, 6);
    assert!(stats.sparsity > 0.9999);

    let mut svm = SVM::new();
    let model = svm.train(temp_file.path(), None).unwrap();
    assert_eq!(model.parameters().unwrap().gamma, 1e-5);
}

/// Rows of a precomputed kernel carry their 1-based id at index 0
#[test]
fn test_precomputed_kernel_rows() {
    // K = x.y for the points 1, -1, 2, -2
    let content = "+1 0:1 1:1 2:-1 3:2 4:-2\n\
                   -1 0:2 1:-1 2:1 3:-2 4:2\n\
                   +1 0:3 1:2 2:-2 3:4 4:-4\n\
                   -1 0:4 1:-2 2:2 3:-4 4:4\n";
    let temp_file = data_file(content);

    let mut svm = SVM::new().with_kernel_type(KernelType::Precomputed);
    let model = svm.train(temp_file.path(), None).unwrap();

    // a query at x = 1.5: kernel values against each training point
    let query = [(0, 0.0), (1, 1.5), (2, -1.5), (3, 3.0), (4, -3.0)];
    assert_eq!(model.predict(query).unwrap(), 1.0);
}

#[test]
fn test_regression_labels_kept_as_floats() {
    let content = "0.25 1:0.1\n1.75 1:0.7\n-3.5 1:-1.4\n2.0 1:0.8\n";
    let temp_file = data_file(content);
    let rows = data::read_file(temp_file.path()).unwrap();
    let labels: Vec<f64> = rows.iter().map(|(label, _)| *label).collect();
    assert_eq!(labels, vec![0.25, 1.75, -3.5, 2.0]);

    let mut svm = SVM::new()
        .with_svm_type(SVMType::NuSvr)
        .with_kernel_type(KernelType::Linear)
        .with_c(10.0);
    let model = svm.train(temp_file.path(), None).unwrap();
    assert!(model.class_labels().unwrap().is_empty());
    assert!((model.predict([(1, 0.4)]).unwrap() - 1.0).abs() < 0.5);
}
