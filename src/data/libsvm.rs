//! Sparse vector codec for the libsvm / SVMLight text format
//!
//! Two entry points with deliberately different strictness:
//!
//! - [`parse_line`] reads one `label index:value ...` line and rejects
//!   anything malformed, including indices that do not strictly increase.
//! - [`from_mapping`] turns keyed features (integer or string keys) into a
//!   node sequence without validating order or uniqueness.
//!
//! Example line:
//! +1 1:0.5 3:1.2 7:0.8

use crate::core::SparseNode;
use std::fmt;

/// A parsed row: label plus its real nodes (no sentinel)
pub type LabeledRow = (f64, Vec<SparseNode>);

/// Feature key accepted by [`from_mapping`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Int(i64),
    Str(String),
}

impl Key {
    /// Feature index this key stands for.
    ///
    /// String keys are read like C `strtol`: optional leading whitespace and
    /// sign, then the longest run of decimal digits. A string without digits
    /// resolves to index 0. Keys that do not fit a non-negative `i32` have no
    /// index.
    pub fn to_index(&self) -> Option<i32> {
        let raw = match self {
            Key::Int(v) => *v,
            Key::Str(s) => leading_integer(s),
        };
        i32::try_from(raw).ok().filter(|&i| i >= 0)
    }
}

impl From<i64> for Key {
    fn from(v: i64) -> Self {
        Key::Int(v)
    }
}

impl From<i32> for Key {
    fn from(v: i32) -> Self {
        Key::Int(i64::from(v))
    }
}

impl From<usize> for Key {
    fn from(v: usize) -> Self {
        Key::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Key::Str(v.to_string())
    }
}

impl From<String> for Key {
    fn from(v: String) -> Self {
        Key::Str(v)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(v) => write!(f, "{v}"),
            Key::Str(s) => write!(f, "{s:?}"),
        }
    }
}

fn leading_integer(s: &str) -> i64 {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let mut value: i64 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        value = value
            .saturating_mul(10)
            .saturating_add(i64::from(b - b'0'));
    }
    if negative {
        -value
    } else {
        value
    }
}

/// Parse one line of training data.
///
/// The error is a description of what was wrong; callers that know the line
/// number wrap it into [`crate::core::SVMError::ParseError`].
pub fn parse_line(line: &str) -> std::result::Result<LabeledRow, String> {
    let mut tokens = line.split_whitespace();

    let label_token = tokens.next().ok_or_else(|| "missing label".to_string())?;
    let label = label_token
        .parse::<f64>()
        .map_err(|_| format!("invalid label: {label_token}"))?;

    let mut nodes = Vec::new();
    let mut previous = -1;

    for token in tokens {
        let (index_str, value_str) = token
            .split_once(':')
            .ok_or_else(|| format!("expected index:value, got {token}"))?;

        let index = index_str
            .parse::<i32>()
            .map_err(|_| format!("invalid feature index: {index_str}"))?;
        let value = value_str
            .parse::<f64>()
            .map_err(|_| format!("invalid feature value: {value_str}"))?;

        if index <= previous {
            return Err(format!(
                "feature index {index} does not exceed previous index {previous}"
            ));
        }
        previous = index;
        nodes.push(SparseNode::new(index, value));
    }

    Ok((label, nodes))
}

/// Encode keyed features as a node sequence.
///
/// Nodes come out in ascending index order. Keys without a usable index are
/// skipped. Duplicate indices are kept as given.
pub fn from_mapping<K, I>(features: I) -> Vec<SparseNode>
where
    K: Into<Key>,
    I: IntoIterator<Item = (K, f64)>,
{
    let mut nodes: Vec<SparseNode> = features
        .into_iter()
        .filter_map(|(key, value)| {
            let key = key.into();
            match key.to_index() {
                Some(index) => Some(SparseNode::new(index, value)),
                None => {
                    log::debug!("Skipping feature key {key} with no usable index");
                    None
                }
            }
        })
        .collect();

    nodes.sort_by_key(|n| n.index);
    nodes
}

/// Format a row back into libsvm text
pub fn format_line(label: f64, nodes: &[SparseNode]) -> String {
    let mut line = format!("{label}");
    for node in nodes {
        line.push_str(&format!(" {}:{}", node.index, node.value));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_valid_line() {
        let (label, nodes) = parse_line("+1 1:0.5 3:1.2 7:-0.8").expect("line should parse");
        assert_eq!(label, 1.0);
        assert_eq!(
            nodes,
            vec![
                SparseNode::new(1, 0.5),
                SparseNode::new(3, 1.2),
                SparseNode::new(7, -0.8)
            ]
        );
    }

    #[test]
    fn test_parse_tabs_and_regression_label() {
        let (label, nodes) = parse_line("2.75\t1:1\t2:2 ").expect("line should parse");
        assert_eq!(label, 2.75);
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn test_parse_label_only_line() {
        let (label, nodes) = parse_line("-1").expect("label-only line is syntactically valid");
        assert_eq!(label, -1.0);
        assert!(nodes.is_empty());
    }

    #[test]
    fn test_parse_precomputed_row_id() {
        let (_, nodes) = parse_line("1 0:3 1:0.5 2:0.25").expect("index 0 is allowed first");
        assert_eq!(nodes[0], SparseNode::new(0, 3.0));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_line("").unwrap_err().contains("missing label"));
        assert!(parse_line("   ").unwrap_err().contains("missing label"));
        assert!(parse_line("abc 1:1").unwrap_err().contains("invalid label"));
        assert!(parse_line("1 x:1").unwrap_err().contains("invalid feature index"));
        assert!(parse_line("1 1:y").unwrap_err().contains("invalid feature value"));
        assert!(parse_line("1 1-2").unwrap_err().contains("expected index:value"));
    }

    #[test]
    fn test_parse_rejects_unordered_indices() {
        let err = parse_line("+1 3:0.5 2:0.1").unwrap_err();
        assert!(err.contains("does not exceed"), "unexpected message: {err}");

        assert!(parse_line("+1 2:0.5 2:0.1").is_err());
        assert!(parse_line("+1 -1:0.5").is_err());
    }

    #[test]
    fn test_key_resolution() {
        assert_eq!(Key::from(5i64).to_index(), Some(5));
        assert_eq!(Key::from("12").to_index(), Some(12));
        assert_eq!(Key::from("  7abc").to_index(), Some(7));
        assert_eq!(Key::from("+3").to_index(), Some(3));
        assert_eq!(Key::from("feature").to_index(), Some(0));
        assert_eq!(Key::from("").to_index(), Some(0));
        assert_eq!(Key::from(-1i64).to_index(), None);
        assert_eq!(Key::from("-4").to_index(), None);
        assert_eq!(Key::from(i64::MAX).to_index(), None);
    }

    #[test]
    fn test_from_mapping_orders_nodes() {
        let nodes = from_mapping(vec![(3i64, 0.5), (2i64, 0.1)]);
        assert_eq!(nodes, vec![SparseNode::new(2, 0.1), SparseNode::new(3, 0.5)]);
    }

    #[test]
    fn test_from_mapping_mixed_keys() {
        let features = vec![
            (Key::Int(4), 1.0),
            (Key::from("2"), 2.0),
            (Key::from("width"), 3.0),
            (Key::Int(-1), 9.0),
        ];
        let nodes = from_mapping(features);
        assert_eq!(
            nodes,
            vec![
                SparseNode::new(0, 3.0),
                SparseNode::new(2, 2.0),
                SparseNode::new(4, 1.0)
            ]
        );
        assert!(!nodes.iter().any(SparseNode::is_sentinel));
    }

    #[test]
    fn test_from_hash_map() {
        let mut map = HashMap::new();
        map.insert(10usize, 1.0);
        map.insert(1usize, 2.0);
        let nodes = from_mapping(map);
        assert_eq!(nodes[0].index, 1);
        assert_eq!(nodes[1].index, 10);
    }

    #[test]
    fn test_format_line() {
        let line = format_line(-1.0, &[SparseNode::new(1, 0.5), SparseNode::new(4, 2.0)]);
        assert_eq!(line, "-1 1:0.5 4:2");
        let (label, nodes) = parse_line(&line).expect("formatted line should parse");
        assert_eq!(label, -1.0);
        assert_eq!(nodes.len(), 2);
    }
}
