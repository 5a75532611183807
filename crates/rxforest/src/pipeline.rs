//! End-to-end orchestration: prepare, train, evaluate, persist.
//!
//! [`prepare`] is the only place records are split, encoded and balanced, so
//! training, retraining and the hyperparameter sweep all see identically
//! prepared data.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::data::{
    DatasetSummary, EncodedSplit, FeatureSchema, LabeledRecord, encode_labeled, load_csv,
    train_test_split,
};
use crate::error::Result;
use crate::eval::{EvaluationResult, Evaluator};
use crate::model::{ConfigError, Hyperparameters, ModelInfo, TrainedModel};
use crate::persist::{self, ArtifactRef};
use crate::tracking::{self, NoopTracker, RunStatus, Tracker};
use crate::training::{ModelTrainer, Smote};
use crate::utils::{Parallelism, run_with_threads};

// =============================================================================
// Preparation
// =============================================================================

/// Train/test splits encoded against the schema of the training split.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedData {
    /// Possibly oversampled.
    pub train: EncodedSplit,
    pub test: EncodedSplit,
    pub schema: FeatureSchema,
    /// Whether SMOTE was applied to `train`.
    pub balanced: bool,
}

/// Split, encode and (optionally) balance `records`.
///
/// The schema is derived from the training split only and the test split is
/// projected onto it. Oversampling never touches the test split.
pub fn prepare(records: &[LabeledRecord], params: &Hyperparameters) -> Result<PreparedData> {
    params.validate()?;

    let (train_records, test_records) = train_test_split(records, params.test_size, params.random_state);
    if train_records.is_empty() || test_records.is_empty() {
        return Err(ConfigError::EmptySplit {
            n_samples: records.len(),
            test_size: params.test_size,
        }
        .into());
    }

    let (train, schema) = encode_labeled(&train_records, None);
    let (test, _) = encode_labeled(&test_records, Some(&schema));

    let train = if params.apply_smote {
        let balanced = Smote::default().balance(&train, params.random_state)?;
        tracing::info!(
            before = train.n_samples(),
            after = balanced.n_samples(),
            "balanced training split"
        );
        balanced
    } else {
        train
    };

    tracing::info!(
        train = train.n_samples(),
        test = test.n_samples(),
        features = schema.len(),
        "prepared data"
    );
    Ok(PreparedData {
        train,
        test,
        schema,
        balanced: params.apply_smote,
    })
}

// =============================================================================
// Configuration
// =============================================================================

/// File-level configuration for a full pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data_path: PathBuf,
    pub model_path: PathBuf,
    pub hyperparameters: Hyperparameters,
    /// 0 = all cores, 1 = sequential.
    pub n_threads: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/drug200.csv"),
            model_path: PathBuf::from("models/random_forest_model.rxf"),
            hyperparameters: Hyperparameters::default(),
            n_threads: 1,
        }
    }
}

impl PipelineConfig {
    /// Read a JSON configuration; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let invalid = |message: String| ConfigError::InvalidFile {
            path: path.display().to_string(),
            message,
        };
        let text = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let config: Self = serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))?;
        config.hyperparameters.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// A model and its held-out evaluation.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: TrainedModel,
    pub evaluation: EvaluationResult,
}

/// Result of [`Pipeline::retrain`].
#[derive(Debug, Clone)]
pub struct RetrainOutcome {
    pub model: TrainedModel,
    pub evaluation: EvaluationResult,
    pub artifact: ArtifactRef,
}

/// Summary of [`Pipeline::run_full`].
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub summary: DatasetSummary,
    pub train_samples: usize,
    pub test_samples: usize,
    pub balanced: bool,
    pub evaluation: EvaluationResult,
    pub model: ModelInfo,
    pub artifact: PathBuf,
}

/// Trainer and evaluator sharing one tracker.
#[derive(Clone)]
pub struct Pipeline {
    trainer: ModelTrainer,
    evaluator: Evaluator,
    tracker: Arc<dyn Tracker>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("trainer", &self.trainer)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        let tracker: Arc<dyn Tracker> = Arc::new(NoopTracker);
        Self {
            trainer: ModelTrainer::new(),
            evaluator: Evaluator::new(),
            tracker,
        }
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn Tracker>) -> Self {
        self.trainer = self.trainer.with_tracker(Arc::clone(&tracker));
        self.evaluator = self.evaluator.with_tracker(Arc::clone(&tracker));
        self.tracker = tracker;
        self
    }

    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.trainer = self.trainer.with_parallelism(parallelism);
        self
    }

    pub fn trainer(&self) -> &ModelTrainer {
        &self.trainer
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn tracker(&self) -> &Arc<dyn Tracker> {
        &self.tracker
    }

    /// Fit on `prepared.train` and evaluate on `prepared.test` in one run.
    pub fn train_and_evaluate(&self, prepared: &PreparedData, params: &Hyperparameters) -> Result<TrainingOutcome> {
        let tracker = self.tracker.as_ref();
        let run = tracking::try_start_run(tracker, "random_forest_training", None);

        let result = (|| -> Result<TrainingOutcome> {
            let model = self
                .trainer
                .fit_in_run(&prepared.train, &prepared.schema, params, run.as_ref())?;
            let evaluation = self.evaluator.evaluate(&model, &prepared.test, run.as_ref())?;
            Ok(TrainingOutcome { model, evaluation })
        })();

        let status = if result.is_ok() {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
        tracking::finish_run(tracker, run.as_ref(), status);
        result
    }

    /// Prepare, fit, evaluate and persist a fresh model.
    pub fn retrain(
        &self,
        records: &[LabeledRecord],
        params: &Hyperparameters,
        artifact_path: impl AsRef<Path>,
    ) -> Result<RetrainOutcome> {
        let prepared = prepare(records, params)?;
        let TrainingOutcome { model, evaluation } = self.train_and_evaluate(&prepared, params)?;
        let artifact = persist::save(&model, artifact_path)?;
        Ok(RetrainOutcome {
            model,
            evaluation,
            artifact,
        })
    }

    /// Load, explore, prepare, train, evaluate and save.
    ///
    /// Tree fitting uses `config.n_threads`; the rest is sequential.
    pub fn run_full(&self, config: &PipelineConfig) -> Result<PipelineReport> {
        let records = load_csv(&config.data_path)?;
        let summary = DatasetSummary::from_records(&records);
        tracing::info!(rows = summary.n_rows, classes = summary.class_counts.len(), "explored dataset");

        let params = &config.hyperparameters;
        let prepared = prepare(&records, params)?;
        let outcome = run_with_threads(config.n_threads, |parallelism| {
            self.clone()
                .with_parallelism(parallelism)
                .train_and_evaluate(&prepared, params)
        })?;
        let artifact = persist::save(&outcome.model, &config.model_path)?;

        Ok(PipelineReport {
            summary,
            train_samples: prepared.train.n_samples(),
            test_samples: prepared.test.n_samples(),
            balanced: prepared.balanced,
            evaluation: outcome.evaluation,
            model: outcome.model.info(),
            artifact: artifact.path().to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::testing::{synthetic_records, to_csv};
    use crate::tracking::InMemoryTracker;

    fn params() -> Hyperparameters {
        Hyperparameters::builder()
            .n_estimators(15)
            .max_leaf_nodes(12)
            .random_state(42)
            .build()
            .unwrap()
    }

    #[test]
    fn prepare_balances_train_only() {
        let records = synthetic_records(200, 1);
        let prepared = prepare(&records, &params()).unwrap();

        assert_eq!(prepared.test.n_samples(), 60);
        assert_eq!(prepared.train.n_features(), prepared.schema.len());
        assert_eq!(prepared.test.n_features(), prepared.schema.len());
        assert!(prepared.balanced);

        let mut counts = std::collections::BTreeMap::<&str, usize>::new();
        for label in &prepared.train.labels {
            *counts.entry(label).or_default() += 1;
        }
        let max = counts.values().copied().max().unwrap();
        assert!(counts.values().all(|&c| c == max));
    }

    #[test]
    fn prepare_without_smote_keeps_split_sizes() {
        let records = synthetic_records(200, 1);
        let mut p = params();
        p.apply_smote = false;
        let prepared = prepare(&records, &p).unwrap();
        assert_eq!(prepared.train.n_samples(), 140);
        assert!(!prepared.balanced);
    }

    #[test]
    fn prepare_rejects_degenerate_split() {
        let records = synthetic_records(1, 0);
        let err = prepare(&records, &params()).unwrap_err();
        assert!(matches!(err, Error::Validation(ConfigError::EmptySplit { n_samples: 1, .. })));
    }

    #[test]
    fn prepare_rejects_invalid_params() {
        let records = synthetic_records(50, 0);
        let mut p = params();
        p.n_estimators = 0;
        assert!(matches!(
            prepare(&records, &p),
            Err(Error::Validation(ConfigError::InvalidNEstimators))
        ));
    }

    #[test]
    fn train_and_evaluate_uses_one_run() {
        let tracker = Arc::new(InMemoryTracker::new());
        let pipeline = Pipeline::new().with_tracker(tracker.clone());
        let prepared = prepare(&synthetic_records(200, 2), &params()).unwrap();

        let outcome = pipeline.train_and_evaluate(&prepared, &params()).unwrap();
        assert!(outcome.evaluation.accuracy > 0.8);

        let runs = tracker.runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Completed);
        assert!(runs[0].params.contains_key("n_estimators"));
        assert!(runs[0].metrics.contains_key("test_accuracy"));
        assert_eq!(runs[0].models.len(), 1);
    }

    #[test]
    fn run_full_writes_artifact_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = dir.path().join("drug200.csv");
        std::fs::write(&data_path, to_csv(&synthetic_records(200, 5))).unwrap();

        let config = PipelineConfig {
            data_path,
            model_path: dir.path().join("out").join("model.rxf"),
            hyperparameters: params(),
            n_threads: 2,
            ..PipelineConfig::default()
        };
        let report = Pipeline::new().run_full(&config).unwrap();

        assert_eq!(report.summary.n_rows, 200);
        assert_eq!(report.test_samples, 60);
        assert_eq!(report.model.n_trees, 15);
        let loaded = persist::load(&ArtifactRef::new(&report.artifact)).unwrap();
        assert_eq!(loaded.info(), report.model);
    }

    #[test]
    fn config_file_defaults_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"hyperparameters": {"n_estimators": 25}, "n_threads": 0}"#).unwrap();

        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.hyperparameters.n_estimators, 25);
        assert_eq!(config.hyperparameters.max_leaf_nodes, 30);
        assert_eq!(config.n_threads, 0);
        assert_eq!(config.model_path, PipelineConfig::default().model_path);
    }

    #[test]
    fn config_file_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"hyperparameters": {"max_leaf_nodes": 1}}"#).unwrap();
        assert_eq!(
            PipelineConfig::from_json_file(&path).unwrap_err(),
            ConfigError::InvalidMaxLeafNodes(1)
        );

        std::fs::write(&path, "not json").unwrap();
        let err = PipelineConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFile { .. }));
        assert!(err.to_string().contains("bad.json"));
    }
}
