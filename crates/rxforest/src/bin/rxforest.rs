//! rxforest CLI entry point.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rxforest::data::{self, DatasetSummary, RawRecord};
use rxforest::persist::{self, ArtifactRef};
use rxforest::pipeline::{self, Pipeline, PipelineConfig};
use rxforest::{
    ConfigError, Evaluator, HyperparameterOptimizer, Hyperparameters, InMemoryTracker, ModelHandle,
    ModelTrainer, Parallelism, UnseenCategoryPolicy, run_with_threads,
};

#[derive(Parser)]
#[command(name = "rxforest")]
#[command(about = "Drug classification with schema-aligned random forests")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a dataset
    Explore {
        #[arg(long, default_value = "data/drug200.csv")]
        data: PathBuf,
    },

    /// Split, encode and balance a dataset without training
    Prepare {
        #[arg(long, default_value = "data/drug200.csv")]
        data: PathBuf,

        #[command(flatten)]
        params: ParamArgs,
    },

    /// Train, evaluate and save a model
    Train {
        #[arg(long, default_value = "data/drug200.csv")]
        data: PathBuf,

        /// Where to write the model artifact
        #[arg(long, default_value = "models/random_forest_model.rxf")]
        model: PathBuf,

        #[command(flatten)]
        params: ParamArgs,

        /// Worker threads for tree fitting (0 = all cores)
        #[arg(long, default_value = "1")]
        threads: usize,
    },

    /// Evaluate a saved model on the held-out split it was trained with
    Evaluate {
        #[arg(long, default_value = "data/drug200.csv")]
        data: PathBuf,

        #[arg(long, default_value = "models/random_forest_model.rxf")]
        model: PathBuf,
    },

    /// Sweep one hyperparameter and report the best value
    Optimize {
        #[arg(long, default_value = "data/drug200.csv")]
        data: PathBuf,

        /// max_leaf_nodes or n_estimators
        #[arg(long, default_value = "max_leaf_nodes")]
        param: String,

        /// Candidate values (defaults to the parameter's standard range)
        #[arg(long, value_delimiter = ',')]
        values: Option<Vec<u32>>,

        /// Seed for every candidate
        #[arg(long, default_value = "1")]
        sweep_seed: u64,

        /// Directory for the sweep curve (default: rxforest under the temp dir)
        #[arg(long)]
        artifact_dir: Option<PathBuf>,

        #[command(flatten)]
        params: ParamArgs,
    },

    /// Predict the drug for one patient
    Predict {
        #[arg(long, default_value = "models/random_forest_model.rxf")]
        model: PathBuf,

        #[arg(long)]
        age: u32,

        /// F or M
        #[arg(long)]
        sex: String,

        /// HIGH, NORMAL or LOW
        #[arg(long)]
        bp: String,

        /// HIGH or NORMAL
        #[arg(long)]
        cholesterol: String,

        #[arg(long)]
        na_to_k: f64,

        /// Fail on categories the model was not trained on
        #[arg(long)]
        strict: bool,
    },

    /// Load, explore, prepare, train, evaluate and save in one go
    FullPipeline {
        /// JSON configuration; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long)]
        data: Option<PathBuf>,

        #[arg(long)]
        model: Option<PathBuf>,

        #[arg(long)]
        threads: Option<usize>,

        #[command(flatten)]
        params: ParamArgs,
    },
}

/// Hyperparameter overrides shared by the training commands.
#[derive(Args, Debug, Clone, Default)]
struct ParamArgs {
    /// JSON file with hyperparameters
    #[arg(long)]
    params_file: Option<PathBuf>,

    #[arg(long)]
    n_estimators: Option<u32>,

    #[arg(long)]
    max_leaf_nodes: Option<u32>,

    #[arg(long)]
    random_state: Option<u64>,

    #[arg(long)]
    test_size: Option<f64>,

    /// Skip SMOTE oversampling
    #[arg(long)]
    no_smote: bool,
}

impl ParamArgs {
    /// File values first, then flags; validated.
    fn resolve(&self, base: Hyperparameters) -> Result<Hyperparameters, ConfigError> {
        let mut params = match &self.params_file {
            Some(path) => read_params_file(path)?,
            None => base,
        };
        if let Some(v) = self.n_estimators {
            params.n_estimators = v;
        }
        if let Some(v) = self.max_leaf_nodes {
            params.max_leaf_nodes = v;
        }
        if let Some(v) = self.random_state {
            params.random_state = v;
        }
        if let Some(v) = self.test_size {
            params.test_size = v;
        }
        if self.no_smote {
            params.apply_smote = false;
        }
        params.validate()?;
        Ok(params)
    }
}

fn read_params_file(path: &Path) -> Result<Hyperparameters, ConfigError> {
    let invalid = |message: String| ConfigError::InvalidFile {
        path: path.display().to_string(),
        message,
    };
    let text = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Explore { data } => explore_command(&data),
        Commands::Prepare { data, params } => prepare_command(&data, &params),
        Commands::Train {
            data,
            model,
            params,
            threads,
        } => train_command(&data, &model, &params, threads),
        Commands::Evaluate { data, model } => evaluate_command(&data, &model),
        Commands::Optimize {
            data,
            param,
            values,
            sweep_seed,
            artifact_dir,
            params,
        } => optimize_command(&data, &param, values, sweep_seed, artifact_dir, &params),
        Commands::Predict {
            model,
            age,
            sex,
            bp,
            cholesterol,
            na_to_k,
            strict,
        } => predict_command(&model, RawRecord::new(age, sex, bp, cholesterol, na_to_k), strict),
        Commands::FullPipeline {
            config,
            data,
            model,
            threads,
            params,
        } => full_pipeline_command(config.as_deref(), data, model, threads, &params),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "command failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

type CliResult = rxforest::Result<()>;

fn explore_command(data: &Path) -> CliResult {
    let records = data::load_csv(data)?;
    print!("{}", DatasetSummary::from_records(&records));
    Ok(())
}

fn prepare_command(data: &Path, params: &ParamArgs) -> CliResult {
    let params = params.resolve(Hyperparameters::default())?;
    let records = data::load_csv(data)?;
    let prepared = pipeline::prepare(&records, &params)?;
    println!(
        "train: {} rows{}",
        prepared.train.n_samples(),
        if prepared.balanced { " (balanced)" } else { "" }
    );
    println!("test: {} rows", prepared.test.n_samples());
    println!("features ({}):", prepared.schema.len());
    for column in prepared.schema.iter() {
        println!("  {column}");
    }
    Ok(())
}

fn train_command(data: &Path, model_path: &Path, params: &ParamArgs, threads: usize) -> CliResult {
    let params = params.resolve(Hyperparameters::default())?;
    let records = data::load_csv(data)?;
    let prepared = pipeline::prepare(&records, &params)?;

    let tracker = Arc::new(InMemoryTracker::new());
    let outcome = run_with_threads(threads, |parallelism| {
        Pipeline::new()
            .with_tracker(tracker.clone())
            .with_parallelism(parallelism)
            .train_and_evaluate(&prepared, &params)
    })?;
    let artifact = persist::save(&outcome.model, model_path)?;

    println!("{}", outcome.evaluation.report);
    println!("accuracy: {:.4}", outcome.evaluation.accuracy);
    println!("model saved to {artifact}");
    for run in tracker.runs() {
        println!("run {} ({}): {} params, {} metrics", run.id, run.name, run.params.len(), run.metrics.len());
    }
    Ok(())
}

fn evaluate_command(data: &Path, model_path: &Path) -> CliResult {
    let model = persist::load(&ArtifactRef::new(model_path))?;
    let records = data::load_csv(data)?;

    // Same split as training: the model carries its own test_size and seed.
    let params = model.hyperparameters();
    let (_, test_records) = data::train_test_split(&records, params.test_size, params.random_state);
    let (test, _) = data::encode_labeled(&test_records, Some(model.schema()));

    let result = Evaluator::new().evaluate(&model, &test, None)?;
    println!("{}", result.report);
    println!("{}", result.confusion);
    println!(
        "accuracy: {:.4}  precision: {:.4}  recall: {:.4}  f1: {:.4}",
        result.accuracy, result.precision, result.recall, result.f1_score
    );
    Ok(())
}

fn optimize_command(
    data: &Path,
    param: &str,
    values: Option<Vec<u32>>,
    sweep_seed: u64,
    artifact_dir: Option<PathBuf>,
    params: &ParamArgs,
) -> CliResult {
    // Reject bad names before loading anything.
    let _: rxforest::SweepParam = param.parse()?;
    let params = params.resolve(Hyperparameters::default())?;
    let records = data::load_csv(data)?;
    let prepared = pipeline::prepare(&records, &params)?;

    let tracker = Arc::new(InMemoryTracker::new());
    let trainer = ModelTrainer::new()
        .with_tracker(tracker.clone())
        .with_parallelism(Parallelism::Parallel);
    let mut optimizer = HyperparameterOptimizer::new(trainer).with_random_state(sweep_seed);
    if let Some(dir) = artifact_dir {
        optimizer = optimizer.with_artifact_dir(dir);
    }

    let result = optimizer.sweep_prepared(&prepared, param, values)?;
    for (value, score) in &result.scores {
        println!("{param}={value:<5} accuracy={score:.4}");
    }
    println!("best {param}: {} (accuracy {:.4})", result.best_value, result.best_score);
    if let Some(path) = &result.curve_path {
        println!("curve written to {}", path.display());
    }
    Ok(())
}

fn predict_command(model_path: &Path, record: RawRecord, strict: bool) -> CliResult {
    let model = persist::load(&ArtifactRef::new(model_path))?;
    let policy = if strict {
        UnseenCategoryPolicy::Reject
    } else {
        UnseenCategoryPolicy::Drop
    };
    let handle = ModelHandle::new(model).with_policy(policy);
    let prediction = handle.predict(&record)?;

    println!("{}", prediction.label);
    let served = handle.snapshot();
    for (class, p) in served.model.classes().iter().zip(&prediction.probabilities) {
        println!("  {class}: {p:.3}");
    }
    Ok(())
}

fn full_pipeline_command(
    config_path: Option<&Path>,
    data: Option<PathBuf>,
    model: Option<PathBuf>,
    threads: Option<usize>,
    params: &ParamArgs,
) -> CliResult {
    let mut config = match config_path {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(data) = data {
        config.data_path = data;
    }
    if let Some(model) = model {
        config.model_path = model;
    }
    if let Some(threads) = threads {
        config.n_threads = threads;
    }
    config.hyperparameters = params.resolve(config.hyperparameters.clone())?;

    let report = Pipeline::new().run_full(&config)?;
    print!("{}", report.summary);
    println!("{}", report.evaluation.report);
    println!(
        "train {} / test {} rows, accuracy {:.4}, model saved to {}",
        report.train_samples,
        report.test_samples,
        report.evaluation.accuracy,
        report.artifact.display()
    );
    Ok(())
}
