//! Model serialization and persistence
//!
//! Models are stored as pretty-printed JSON. Floats are written with enough
//! digits to read back bit-for-bit, so a reloaded model predicts exactly like
//! the one that was saved.

use crate::core::{NodeArena, Parameters, Result, SVMError, SparseNode, SVMType};
use crate::optimizer::TrainedSVM;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Version of the on-disk layout written by this library
pub const FORMAT_VERSION: u32 = 1;

/// Serializable representation of a trained SVM model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableModel {
    pub format_version: u32,
    pub metadata: ModelMetadata,
    /// Parameters the model was trained with
    pub params: Parameters,
    pub class_count: usize,
    /// Class labels; empty for regression and one-class models
    #[serde(default)]
    pub labels: Vec<i32>,
    #[serde(default)]
    pub support_vectors_per_class: Vec<usize>,
    pub rho: Vec<f64>,
    #[serde(default)]
    pub prob_a: Vec<f64>,
    #[serde(default)]
    pub prob_b: Vec<f64>,
    /// `(class_count - 1)` rows, one coefficient per support vector
    pub coefficients: Vec<Vec<f64>>,
    pub support_vectors: Vec<Vec<SparseNode>>,
    #[serde(default)]
    pub support_vector_indices: Vec<usize>,
}

/// Model metadata for tracking and validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Library version used to create the model
    pub library_version: String,
    pub n_support_vectors: usize,
    /// RFC 3339 creation timestamp
    pub created_at: String,
}

impl SerializableModel {
    pub fn from_model(model: &TrainedSVM) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            metadata: ModelMetadata {
                library_version: env!("CARGO_PKG_VERSION").to_string(),
                n_support_vectors: model.support_vectors.len(),
                created_at: chrono::Utc::now().to_rfc3339(),
            },
            params: model.params.clone(),
            class_count: model.class_count,
            labels: model.labels.clone(),
            support_vectors_per_class: model.sv_per_class.clone(),
            rho: model.rho.clone(),
            prob_a: model.prob_a.clone(),
            prob_b: model.prob_b.clone(),
            coefficients: model.coefficients.clone(),
            support_vectors: model.support_vectors().map(<[SparseNode]>::to_vec).collect(),
            support_vector_indices: model.support_vector_indices.clone(),
        }
    }

    /// Check that the arrays agree with each other
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.format_version != FORMAT_VERSION {
            return Err(format!(
                "unsupported format version {}",
                self.format_version
            ));
        }

        let n_sv = self.support_vectors.len();
        let classification = self.params.svm_type.is_classification();
        let (coef_rows, machines) = if classification {
            if self.class_count == 0 || self.labels.len() != self.class_count {
                return Err("class count does not match the labels".to_string());
            }
            if self.support_vectors_per_class.len() != self.class_count
                || self.support_vectors_per_class.iter().sum::<usize>() != n_sv
            {
                return Err("per-class support vector counts do not add up".to_string());
            }
            let k = self.class_count;
            (k - 1, k * (k - 1) / 2)
        } else {
            (1, 1)
        };

        if self.coefficients.len() != coef_rows
            || self.coefficients.iter().any(|row| row.len() != n_sv)
        {
            return Err("coefficient matrix has the wrong shape".to_string());
        }
        if self.rho.len() != machines {
            return Err(format!("expected {machines} offsets, found {}", self.rho.len()));
        }
        if self.support_vectors.iter().flatten().any(|n| n.index < 0) {
            return Err("support vector with a negative feature index".to_string());
        }

        let calibrated = match self.params.svm_type {
            SVMType::CSvc | SVMType::NuSvc => !self.prob_a.is_empty() || !self.prob_b.is_empty(),
            _ => false,
        };
        if calibrated && (self.prob_a.len() != machines || self.prob_b.len() != machines) {
            return Err("probability vectors have the wrong length".to_string());
        }
        Ok(())
    }

    /// Name of the first model array holding a NaN or infinity
    fn non_finite_field(&self) -> Option<&'static str> {
        let finite = |values: &[f64]| values.iter().all(|v| v.is_finite());
        if !finite(&self.rho) {
            Some("rho")
        } else if !finite(&self.prob_a) {
            Some("prob_a")
        } else if !finite(&self.prob_b) {
            Some("prob_b")
        } else if !self.coefficients.iter().all(|row| finite(row)) {
            Some("coefficients")
        } else if !self.support_vectors.iter().flatten().all(|n| n.value.is_finite()) {
            Some("support_vectors")
        } else if !self.params.class_weights.values().all(|w| w.is_finite()) {
            Some("class_weights")
        } else {
            None
        }
    }

    /// Rebuild the model, packing the support vectors into a fresh arena
    pub fn into_model(self) -> std::result::Result<TrainedSVM, String> {
        self.validate()?;
        let (arena, support_vectors) = NodeArena::pack(&self.support_vectors);
        Ok(TrainedSVM {
            params: self.params,
            class_count: self.class_count,
            arena,
            support_vectors,
            coefficients: self.coefficients,
            rho: self.rho,
            prob_a: self.prob_a,
            prob_b: self.prob_b,
            support_vector_indices: self.support_vector_indices,
            labels: self.labels,
            sv_per_class: self.support_vectors_per_class,
        })
    }

    /// Save model to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(field) = self.non_finite_field() {
            return Err(SVMError::ModelSave(format!(
                "{field} contains a value that is not finite"
            )));
        }
        let file = File::create(path).map_err(SVMError::IoError)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| SVMError::ModelSave(e.to_string()))?;
        writer.flush()?;
        Ok(())
    }

    /// Load model from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(SVMError::IoError)?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| SVMError::ModelLoad(e.to_string()))
    }

    /// Print model summary
    pub fn print_summary(&self) {
        println!("=== SVM Model Summary ===");
        println!("SVM Type: {}", self.params.svm_type);
        println!("Kernel Type: {}", self.params.kernel_type);
        if self.params.svm_type.is_classification() {
            println!("Classes: {}", self.class_count);
            let labels: Vec<String> = self.labels.iter().map(i32::to_string).collect();
            println!("Labels: {}", labels.join(" "));
        }
        println!("Support Vectors: {}", self.metadata.n_support_vectors);
        println!(
            "Probability Estimates: {}",
            if self.prob_a.is_empty() { "no" } else { "yes" }
        );
        println!("Library Version: {}", self.metadata.library_version);
        println!("Created: {}", self.metadata.created_at);
        println!("Training Parameters:");
        println!("  C: {}", self.params.c);
        println!("  Gamma: {}", self.params.gamma);
        println!("  Eps: {}", self.params.eps);
    }
}

/// Write `model` to `path`; every failure is reported as [`SVMError::ModelSave`]
pub fn save_model(path: &Path, model: &TrainedSVM) -> Result<()> {
    SerializableModel::from_model(model)
        .save_to_file(path)
        .map_err(|e| match e {
            SVMError::ModelSave(_) => e,
            other => SVMError::ModelSave(other.to_string()),
        })?;
    log::debug!("saved model to {}", path.display());
    Ok(())
}

/// Read a model from `path`; every failure is reported as [`SVMError::ModelLoad`]
pub fn load_model(path: &Path) -> Result<TrainedSVM> {
    let serialized = SerializableModel::load_from_file(path).map_err(|e| match e {
        SVMError::ModelLoad(_) => e,
        other => SVMError::ModelLoad(other.to_string()),
    })?;
    let model = serialized.into_model().map_err(SVMError::ModelLoad)?;
    log::debug!(
        "loaded {} model with {} support vectors from {}",
        model.params.svm_type,
        model.support_vectors.len(),
        path.display()
    );
    Ok(model)
}
