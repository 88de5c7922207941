//! Problem builder: packs labeled rows into one sentinel-terminated arena

use crate::core::{NodeArena, Parameters, Problem, Result, SVMError, SparseNode};
use crate::data::libsvm::LabeledRow;

/// Accumulates rows before they are frozen into a [`Problem`]
#[derive(Debug, Default)]
pub struct ProblemBuilder {
    labels: Vec<f64>,
    rows: Vec<Vec<SparseNode>>,
}

impl ProblemBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(rows: usize) -> Self {
        Self {
            labels: Vec::with_capacity(rows),
            rows: Vec::with_capacity(rows),
        }
    }

    pub fn push(&mut self, label: f64, nodes: Vec<SparseNode>) {
        self.labels.push(label);
        self.rows.push(nodes);
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Validate the rows and lay them out in a single allocation.
    ///
    /// Every row needs at least one `index:value` pair and no negative index
    /// (the `-1` index is reserved for the row terminator).
    pub fn build(self) -> Result<Problem> {
        if self.rows.is_empty() {
            return Err(SVMError::EmptyDataset);
        }

        let mut max_index = 0;
        for (i, row) in self.rows.iter().enumerate() {
            if row.is_empty() {
                return Err(SVMError::InvalidDataset(format!(
                    "row {} has a label but no index:value pairs",
                    i + 1
                )));
            }
            for node in row {
                if node.index < 0 {
                    return Err(SVMError::InvalidDataset(format!(
                        "row {} has negative feature index {}",
                        i + 1,
                        node.index
                    )));
                }
                max_index = max_index.max(node.index);
            }
        }

        let (arena, spans) = NodeArena::pack(&self.rows);
        log::debug!(
            "Built problem: {} rows, {} nodes, max feature index {}",
            spans.len(),
            arena.len(),
            max_index
        );

        Ok(Problem::from_parts(self.labels, spans, arena, max_index))
    }
}

impl FromIterator<LabeledRow> for ProblemBuilder {
    fn from_iter<T: IntoIterator<Item = LabeledRow>>(iter: T) -> Self {
        let mut builder = ProblemBuilder::new();
        for (label, nodes) in iter {
            builder.push(label, nodes);
        }
        builder
    }
}

/// Build a problem straight from parsed rows
pub fn build(rows: Vec<LabeledRow>) -> Result<Problem> {
    rows.into_iter().collect::<ProblemBuilder>().build()
}

/// Replace the `gamma == 0` "auto" setting with `1 / max_feature_index`.
///
/// Returns whether gamma was changed.
pub fn apply_auto_gamma(params: &mut Parameters, max_feature_index: i32) -> bool {
    if params.gamma == 0.0 && max_feature_index > 0 {
        params.gamma = 1.0 / f64::from(max_feature_index);
        log::debug!("Using gamma = {} (1 / {max_feature_index})", params.gamma);
        true
    } else {
        false
    }
}
