//! sparsvm Command Line Interface
//!
//! Train, cross-validate and apply SVM models on libsvm-format data.

use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{error, info};
use sparsvm::api::{Model, SVM};
use sparsvm::core::{KernelType, Result, SVMError, SVMType};
use sparsvm::data::{format_line, read_file};
use sparsvm::params::{DoubleAttribute, LongAttribute};
use sparsvm::persistence::SerializableModel;
use sparsvm::solver::SolverLog;
use sparsvm::utils::metrics;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "sparsvm")]
#[command(about = "Support Vector Machine training and prediction on sparse data")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a new SVM model
    Train(TrainArgs),
    /// Make predictions using a trained model
    Predict(PredictArgs),
    /// k-fold cross-validation on a data file
    Cv(CvArgs),
    /// Display model information
    Info(InfoArgs),
    /// Print the default option table with attribute IDs
    Options,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliSVMType {
    #[value(name = "c-svc")]
    CSvc,
    #[value(name = "nu-svc")]
    NuSvc,
    #[value(name = "one-class")]
    OneClass,
    #[value(name = "epsilon-svr")]
    EpsilonSvr,
    #[value(name = "nu-svr")]
    NuSvr,
}

impl From<CliSVMType> for SVMType {
    fn from(cli_type: CliSVMType) -> Self {
        match cli_type {
            CliSVMType::CSvc => SVMType::CSvc,
            CliSVMType::NuSvc => SVMType::NuSvc,
            CliSVMType::OneClass => SVMType::OneClass,
            CliSVMType::EpsilonSvr => SVMType::EpsilonSvr,
            CliSVMType::NuSvr => SVMType::NuSvr,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliKernelType {
    Linear,
    Polynomial,
    Rbf,
    Sigmoid,
    Precomputed,
}

impl From<CliKernelType> for KernelType {
    fn from(cli_kernel: CliKernelType) -> Self {
        match cli_kernel {
            CliKernelType::Linear => KernelType::Linear,
            CliKernelType::Polynomial => KernelType::Polynomial,
            CliKernelType::Rbf => KernelType::Rbf,
            CliKernelType::Sigmoid => KernelType::Sigmoid,
            CliKernelType::Precomputed => KernelType::Precomputed,
        }
    }
}

/// Hyperparameters shared by `train` and `cv`
#[derive(Args)]
struct SVMArgs {
    /// SVM formulation
    #[arg(short = 's', long, default_value = "c-svc")]
    svm_type: CliSVMType,

    /// Kernel function
    #[arg(short = 't', long, default_value = "rbf")]
    kernel: CliKernelType,

    /// Degree of the polynomial kernel
    #[arg(long, default_value = "3")]
    degree: i32,

    /// Kernel gamma; 0 derives 1/max_feature_index from the data
    #[arg(short, long, default_value = "0")]
    gamma: f64,

    /// Kernel coef0
    #[arg(long, default_value = "0")]
    coef0: f64,

    /// Regularization parameter C
    #[arg(short = 'C', long, default_value = "1.0")]
    c: f64,

    /// nu of nu-SVC, one-class SVM and nu-SVR
    #[arg(short, long, default_value = "0.5")]
    nu: f64,

    /// Width of the epsilon-SVR tube
    #[arg(short, long, default_value = "0.1")]
    p: f64,

    /// Convergence tolerance
    #[arg(short, long, default_value = "0.001")]
    epsilon: f64,

    /// Kernel cache size in MB
    #[arg(short = 'm', long, default_value = "100")]
    cache_size: f64,

    /// Disable the shrinking heuristic
    #[arg(long)]
    no_shrinking: bool,

    /// Train with probability estimates
    #[arg(short = 'b', long)]
    probability: bool,

    /// Forward solver progress to the debug log
    #[arg(long)]
    solver_log: bool,
}

impl SVMArgs {
    fn build(&self) -> SVM {
        let svm = if self.solver_log {
            SVM::with_solver_log(SolverLog::Forward)
        } else {
            SVM::new()
        };
        svm.with_svm_type(self.svm_type.into())
            .with_kernel_type(self.kernel.into())
            .with_degree(self.degree)
            .with_gamma(self.gamma)
            .with_coef0(self.coef0)
            .with_c(self.c)
            .with_nu(self.nu)
            .with_p(self.p)
            .with_eps(self.epsilon)
            .with_cache_size(self.cache_size)
            .with_shrinking(!self.no_shrinking)
            .with_probability(self.probability)
    }
}

#[derive(Args)]
struct TrainArgs {
    /// Training data file (libsvm format)
    #[arg(long)]
    data: PathBuf,

    /// Output model file
    #[arg(short, long)]
    output: PathBuf,

    /// Class weight as LABEL:WEIGHT (c-svc only, repeatable)
    #[arg(short, long = "weight", value_parser = parse_weight, allow_hyphen_values = true)]
    weights: Vec<(i32, f64)>,

    #[command(flatten)]
    svm: SVMArgs,
}

#[derive(Args)]
struct PredictArgs {
    /// Trained model file
    #[arg(short, long)]
    model: PathBuf,

    /// Input data file
    #[arg(long)]
    data: PathBuf,

    /// Output predictions file (optional, prints to stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output probability estimates
    #[arg(short = 'b', long)]
    probability: bool,
}

#[derive(Args)]
struct CvArgs {
    /// Data file (libsvm format)
    #[arg(long)]
    data: PathBuf,

    /// Number of folds
    #[arg(short, long, default_value = "5")]
    folds: usize,

    #[command(flatten)]
    svm: SVMArgs,
}

#[derive(Args)]
struct InfoArgs {
    /// Model file
    model: PathBuf,
}

fn parse_weight(s: &str) -> std::result::Result<(i32, f64), String> {
    let (label, weight) = s
        .split_once(':')
        .ok_or_else(|| format!("expected LABEL:WEIGHT, got {s:?}"))?;
    let label = label
        .trim()
        .parse::<i32>()
        .map_err(|e| format!("bad label {label:?}: {e}"))?;
    let weight = weight
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("bad weight {weight:?}: {e}"))?;
    Ok((label, weight))
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Train(args) => train_command(args),
        Commands::Predict(args) => predict_command(args),
        Commands::Cv(args) => cv_command(args),
        Commands::Info(args) => info_command(args),
        Commands::Options => options_command(),
    };

    if let Err(e) = result {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn train_command(args: TrainArgs) -> Result<()> {
    info!("Training SVM model...");
    info!("Data file: {:?}", args.data);

    let mut svm = args.svm.build();
    let weights: BTreeMap<i32, f64> = args.weights.iter().copied().collect();
    let model = svm.train(
        args.data.as_path(),
        if weights.is_empty() { None } else { Some(&weights) },
    )?;

    info!("Training completed successfully");
    info!("Support vectors: {}", model.support_vector_count()?);

    model.save(&args.output)?;
    info!("Model saved to: {:?}", args.output);
    Ok(())
}

fn predict_command(args: PredictArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let model = Model::load(&args.model)?;
    if args.probability && !model.has_probability()? {
        return Err(SVMError::ProbabilityUnavailable);
    }

    info!("Loading prediction data from: {:?}", args.data);
    let rows = read_file(&args.data)?;

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    let classifier = model.svm_type()?.is_classification();
    if args.probability && classifier {
        // estimates come back keyed by label, in ascending order
        let mut labels = model.class_labels()?;
        labels.sort_unstable();
        let labels: Vec<String> = labels.iter().map(i32::to_string).collect();
        writeln!(out, "labels {}", labels.join(" "))?;
    }

    let mut predictions = Vec::with_capacity(rows.len());
    let mut targets = Vec::with_capacity(rows.len());
    for (target, nodes) in &rows {
        let features = nodes.iter().map(|n| (n.index, n.value));
        if args.probability && classifier {
            let (label, estimates) = model.predict_probability(features)?;
            let estimates: Vec<String> = estimates.values().map(|p| format!("{p}")).collect();
            writeln!(out, "{label} {}", estimates.join(" "))?;
            predictions.push(label);
        } else {
            let prediction = model.predict(features)?;
            writeln!(out, "{prediction}")?;
            predictions.push(prediction);
        }
        targets.push(*target);
    }
    out.flush()?;

    if !model.svm_type()?.is_regression() {
        let accuracy = metrics::accuracy(&predictions, &targets);
        info!(
            "Accuracy = {:.4}% ({}/{})",
            accuracy * 100.0,
            (accuracy * targets.len() as f64).round(),
            targets.len()
        );
    } else {
        info!(
            "Mean squared error = {} (regression)",
            metrics::mean_squared_error(&predictions, &targets)
        );
        info!(
            "Squared correlation coefficient = {} (regression)",
            metrics::squared_correlation(&predictions, &targets)
        );
    }
    if let Some(path) = &args.output {
        info!("Predictions saved to: {path:?}");
    }
    Ok(())
}

fn cv_command(args: CvArgs) -> Result<()> {
    info!("{}-fold cross-validation on {:?}", args.folds, args.data);
    let svm = args.svm.build();
    let score = svm.cross_validate(args.data.as_path(), args.folds)?;

    println!("=== Cross-Validation Results ===");
    println!("Data file: {:?}", args.data);
    println!("Folds: {}", args.folds);
    if svm.parameters().svm_type.is_regression() {
        println!("Cross Validation Mean squared error = {score}");
    } else {
        println!("Cross Validation Accuracy = {:.4}%", score * 100.0);
    }
    Ok(())
}

fn info_command(args: InfoArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let serializable_model = SerializableModel::load_from_file(&args.model)?;
    serializable_model
        .validate()
        .map_err(SVMError::ModelLoad)?;

    serializable_model.print_summary();

    println!("\nSupport Vector Details:");
    println!("  Total: {}", serializable_model.support_vectors.len());
    let first_coef = serializable_model
        .coefficients
        .first()
        .and_then(|row| row.first());
    if let (Some(first_sv), Some(&coef)) = (serializable_model.support_vectors.first(), first_coef)
    {
        println!("  First SV non-zeros: {}", first_sv.len());
        // coefficient followed by the nodes, as in a libsvm model file
        println!("  First SV: {}", format_line(coef, first_sv));
    }

    println!("\nRho values:");
    let rho = &serializable_model.rho;
    let n_show = rho.len().min(10);
    for (i, value) in rho.iter().enumerate().take(n_show) {
        println!("  rho{i}: {value:.6}");
    }
    if rho.len() > n_show {
        println!("  ... ({} more)", rho.len() - n_show);
    }

    Ok(())
}

fn options_command() -> Result<()> {
    println!("{:<6} {:<12} value", "id", "attribute");
    for (id, value) in SVM::new().get_options() {
        let name = LongAttribute::from_id(id)
            .map(|a| format!("{a:?}"))
            .or_else(|| DoubleAttribute::from_id(id).map(|a| format!("{a:?}")))
            .unwrap_or_default();
        println!("{id:<6} {name:<12} {value}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_weight() {
        assert_eq!(parse_weight("1:2.5"), Ok((1, 2.5)));
        assert_eq!(parse_weight("-1: 0.5"), Ok((-1, 0.5)));
        assert!(parse_weight("1").is_err());
        assert!(parse_weight("a:1").is_err());
    }

    #[test]
    fn test_cli_parses_train() {
        let cli = Cli::try_parse_from([
            "sparsvm", "train", "--data", "a.txt", "-o", "m.json", "-t", "linear", "-w", "1:3",
            "-b",
        ])
        .expect("arguments are valid");
        match cli.command {
            Commands::Train(args) => {
                assert_eq!(args.weights, vec![(1, 3.0)]);
                let svm = args.svm.build();
                assert_eq!(svm.parameters().kernel_type, KernelType::Linear);
                assert!(svm.parameters().probability);
                assert!(svm.parameters().shrinking);
            }
            _ => panic!("expected train"),
        }
    }
}
