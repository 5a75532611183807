//! One-dimensional hyperparameter sweeps.
//!
//! Every candidate is fitted from scratch through
//! [`ModelTrainer::fit_untracked`], the same path regular training uses, so a
//! sweep score for a value equals the score of training with that value.

mod curve;

pub use curve::render_svg;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;

use crate::data::{EncodedSplit, FeatureSchema};
use crate::error::Result;
use crate::eval::exact_match;
use crate::model::{ConfigError, Hyperparameters};
use crate::pipeline::PreparedData;
use crate::tracking::{self, RunHandle, RunStatus};
use crate::training::ModelTrainer;

/// Value of the parameter that is not being swept.
const FIXED_N_ESTIMATORS: u32 = 100;
const FIXED_MAX_LEAF_NODES: u32 = 30;

/// Seed used for every sweep candidate unless overridden.
pub const DEFAULT_SWEEP_RANDOM_STATE: u64 = 1;

// =============================================================================
// SweepParam
// =============================================================================

/// A hyperparameter that can be swept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepParam {
    MaxLeafNodes,
    NEstimators,
}

impl SweepParam {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MaxLeafNodes => "max_leaf_nodes",
            Self::NEstimators => "n_estimators",
        }
    }

    /// `2..=49` for `max_leaf_nodes`, `50..=275` step 25 for `n_estimators`.
    pub fn default_range(self) -> Vec<u32> {
        match self {
            Self::MaxLeafNodes => (2..50).collect(),
            Self::NEstimators => (50..300).step_by(25).collect(),
        }
    }

    /// Hyperparameters for one candidate: `value` for this parameter, the
    /// fixed default for the other.
    pub fn candidate(self, value: u32, random_state: u64) -> Hyperparameters {
        let base = Hyperparameters::default().with_random_state(random_state);
        match self {
            Self::MaxLeafNodes => base
                .with_n_estimators(FIXED_N_ESTIMATORS)
                .with_max_leaf_nodes(value),
            Self::NEstimators => base
                .with_n_estimators(value)
                .with_max_leaf_nodes(FIXED_MAX_LEAF_NODES),
        }
    }

    fn check_range(self, range: &[u32]) -> std::result::Result<(), ConfigError> {
        if range.is_empty() {
            return Err(ConfigError::EmptySweepRange {
                param: self.as_str(),
            });
        }
        let min_valid = match self {
            Self::MaxLeafNodes => 2,
            Self::NEstimators => 1,
        };
        match range.iter().find(|&&v| v < min_valid) {
            Some(&value) => Err(ConfigError::InvalidSweepValue {
                param: self.as_str(),
                value,
            }),
            None => Ok(()),
        }
    }
}

impl FromStr for SweepParam {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "max_leaf_nodes" => Ok(Self::MaxLeafNodes),
            "n_estimators" => Ok(Self::NEstimators),
            other => Err(ConfigError::UnsupportedSweepParam(other.to_string())),
        }
    }
}

impl std::fmt::Display for SweepParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// OptimizationResult
// =============================================================================

/// Outcome of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationResult {
    pub param: SweepParam,
    /// `(value, accuracy)` in sweep order.
    pub scores: Vec<(u32, f64)>,
    /// First value reaching [`Self::best_score`].
    pub best_value: u32,
    pub best_score: f64,
    #[serde(skip)]
    pub curve_svg: String,
    /// Where the curve was written; `None` if writing it failed.
    pub curve_path: Option<PathBuf>,
}

impl OptimizationResult {
    pub fn values(&self) -> impl Iterator<Item = u32> + '_ {
        self.scores.iter().map(|&(v, _)| v)
    }
}

// =============================================================================
// HyperparameterOptimizer
// =============================================================================

/// Sweeps one hyperparameter, scoring each candidate on a held-out split.
#[derive(Debug, Clone)]
pub struct HyperparameterOptimizer {
    trainer: ModelTrainer,
    random_state: u64,
    artifact_dir: PathBuf,
}

impl Default for HyperparameterOptimizer {
    fn default() -> Self {
        Self::new(ModelTrainer::new())
    }
}

impl HyperparameterOptimizer {
    /// Runs are logged to the trainer's tracker.
    pub fn new(trainer: ModelTrainer) -> Self {
        Self {
            trainer,
            random_state: DEFAULT_SWEEP_RANDOM_STATE,
            artifact_dir: default_artifact_dir(),
        }
    }

    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = random_state;
        self
    }

    /// Directory the sweep curve is written to before it is attached to the
    /// parent run. Defaults to [`default_artifact_dir`].
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    pub fn trainer(&self) -> &ModelTrainer {
        &self.trainer
    }

    /// Sweep over prepared data.
    pub fn sweep_prepared(
        &self,
        prepared: &PreparedData,
        param_name: &str,
        range: Option<Vec<u32>>,
    ) -> Result<OptimizationResult> {
        self.sweep(&prepared.train, &prepared.test, &prepared.schema, param_name, range)
    }

    /// Fit one model per value of `param_name` and score it on `test`.
    ///
    /// `range` defaults to [`SweepParam::default_range`]. The parameter name
    /// and every candidate value are validated before any training.
    pub fn sweep(
        &self,
        train: &EncodedSplit,
        test: &EncodedSplit,
        schema: &FeatureSchema,
        param_name: &str,
        range: Option<Vec<u32>>,
    ) -> Result<OptimizationResult> {
        let param: SweepParam = param_name.parse()?;
        let range = range.unwrap_or_else(|| param.default_range());
        param.check_range(&range)?;

        let tracker = self.trainer.tracker().as_ref();
        let parent_name = format!("hyperparameter_optimization_{param}");
        let parent = tracking::try_start_run(tracker, &parent_name, None);

        let result = self.run_candidates(train, test, schema, param, &range, parent.as_ref());
        let status = if result.is_ok() {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
        tracking::finish_run(tracker, parent.as_ref(), status);
        result
    }

    fn run_candidates(
        &self,
        train: &EncodedSplit,
        test: &EncodedSplit,
        schema: &FeatureSchema,
        param: SweepParam,
        range: &[u32],
        parent: Option<&RunHandle>,
    ) -> Result<OptimizationResult> {
        let tracker = self.trainer.tracker().as_ref();
        let (first, last) = (range[0], range[range.len() - 1]);
        tracking::log_params(
            tracker,
            parent,
            &[
                ("optimization_param", param.to_string()),
                ("param_range_start", first.to_string()),
                ("param_range_end", last.to_string()),
            ],
        );

        let mut scores = Vec::with_capacity(range.len());
        for &value in range {
            let params = param.candidate(value, self.random_state);
            let child = parent
                .and_then(|p| tracking::try_start_run(tracker, &format!("{param}_{value}"), Some(p)));

            let outcome = self.score_candidate(train, test, schema, &params);
            match &outcome {
                Ok(accuracy) => {
                    tracking::log_params(
                        tracker,
                        child.as_ref(),
                        &[
                            ("n_estimators", params.n_estimators.to_string()),
                            ("max_leaf_nodes", params.max_leaf_nodes.to_string()),
                            ("random_state", params.random_state.to_string()),
                        ],
                    );
                    tracking::log_metrics(
                        tracker,
                        child.as_ref(),
                        &[("test_accuracy", *accuracy), (param.as_str(), f64::from(value))],
                    );
                    tracking::finish_run(tracker, child.as_ref(), RunStatus::Completed);
                }
                Err(_) => tracking::finish_run(tracker, child.as_ref(), RunStatus::Failed),
            }
            let accuracy = outcome?;
            tracing::debug!(param = param.as_str(), value, accuracy, "scored sweep candidate");
            scores.push((value, accuracy));
        }

        let (best_value, best_score) = best_of(&scores);
        tracing::info!(param = param.as_str(), best_value, best_score, "sweep finished");

        let best_key = format!("best_{param}");
        tracking::log_params(tracker, parent, &[(best_key.as_str(), best_value.to_string())]);
        tracking::log_metrics(tracker, parent, &[("best_accuracy", best_score)]);

        let curve_svg = render_svg(param.as_str(), &scores);
        let curve_path = self.write_curve(param, &curve_svg);
        if let (Some(run), Some(path)) = (parent, curve_path.as_deref()) {
            tracking::best_effort("log_artifact", tracker.log_artifact(run, path));
        }

        Ok(OptimizationResult {
            param,
            scores,
            best_value,
            best_score,
            curve_svg,
            curve_path,
        })
    }

    fn score_candidate(
        &self,
        train: &EncodedSplit,
        test: &EncodedSplit,
        schema: &FeatureSchema,
        params: &Hyperparameters,
    ) -> Result<f64> {
        let model = self.trainer.fit_untracked(train, schema, params)?;
        let predictions = model.predict(test.features.view())?;
        Ok(exact_match(&test.labels, &predictions))
    }

    /// The curve is auxiliary output; failing to write it is logged only.
    fn write_curve(&self, param: SweepParam, svg: &str) -> Option<PathBuf> {
        let dir = &self.artifact_dir;
        let path = dir.join(format!("random_forest_{param}_optimization.svg"));
        let written = std::fs::create_dir_all(dir).and_then(|()| std::fs::write(&path, svg));
        match written {
            Ok(()) => Some(path),
            Err(err) => {
                tracing::warn!(%err, path = %path.display(), "failed to write sweep curve");
                None
            }
        }
    }
}

/// `rxforest` under the system temp directory.
pub fn default_artifact_dir() -> PathBuf {
    std::env::temp_dir().join("rxforest")
}

/// First `(value, score)` with the maximum score. `scores` is non-empty.
fn best_of(scores: &[(u32, f64)]) -> (u32, f64) {
    let mut best = scores[0];
    for &(value, score) in &scores[1..] {
        if score > best.1 {
            best = (value, score);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::pipeline::prepare;
    use crate::testing::synthetic_records;
    use crate::tracking::InMemoryTracker;
    use rstest::rstest;
    use std::sync::Arc;

    fn prepared() -> PreparedData {
        let params = Hyperparameters::default().with_random_state(42);
        prepare(&synthetic_records(200, 7), &params).unwrap()
    }

    #[rstest]
    #[case("max_leaf_nodes", SweepParam::MaxLeafNodes)]
    #[case("n_estimators", SweepParam::NEstimators)]
    fn parses_supported_params(#[case] name: &str, #[case] expected: SweepParam) {
        assert_eq!(name.parse::<SweepParam>().unwrap(), expected);
        assert_eq!(expected.as_str(), name);
    }

    #[test]
    fn default_ranges() {
        let leaves = SweepParam::MaxLeafNodes.default_range();
        assert_eq!((leaves[0], *leaves.last().unwrap(), leaves.len()), (2, 49, 48));
        assert_eq!(
            SweepParam::NEstimators.default_range(),
            vec![50, 75, 100, 125, 150, 175, 200, 225, 250, 275]
        );
    }

    #[test]
    fn candidates_fix_the_other_parameter() {
        let p = SweepParam::MaxLeafNodes.candidate(7, 1);
        assert_eq!((p.n_estimators, p.max_leaf_nodes, p.random_state), (100, 7, 1));
        let p = SweepParam::NEstimators.candidate(75, 1);
        assert_eq!((p.n_estimators, p.max_leaf_nodes), (75, 30));
    }

    #[test]
    fn invalid_requests_fail_before_training() {
        let tracker = Arc::new(InMemoryTracker::new());
        let optimizer = HyperparameterOptimizer::new(ModelTrainer::new().with_tracker(tracker.clone()));
        let data = prepared();

        let err = optimizer.sweep_prepared(&data, "min_samples_leaf", None).unwrap_err();
        assert!(matches!(err, Error::Validation(ConfigError::UnsupportedSweepParam(ref p)) if p == "min_samples_leaf"));

        let err = optimizer.sweep_prepared(&data, "max_leaf_nodes", Some(vec![])).unwrap_err();
        assert!(matches!(err, Error::Validation(ConfigError::EmptySweepRange { .. })));

        let err = optimizer.sweep_prepared(&data, "max_leaf_nodes", Some(vec![4, 1])).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ConfigError::InvalidSweepValue { value: 1, .. })
        ));
        assert!(tracker.runs().is_empty());
    }

    #[test]
    fn best_is_first_maximum() {
        assert_eq!(best_of(&[(2, 0.5), (3, 0.9), (4, 0.9), (5, 0.7)]), (3, 0.9));
        assert_eq!(best_of(&[(10, 0.4)]), (10, 0.4));
    }

    #[test]
    fn sweep_logs_parent_and_children() {
        let tracker = Arc::new(InMemoryTracker::new());
        let dir = tempfile::tempdir().unwrap();
        let optimizer = HyperparameterOptimizer::new(ModelTrainer::new().with_tracker(tracker.clone()))
            .with_artifact_dir(dir.path());

        let result = optimizer
            .sweep_prepared(&prepared(), "max_leaf_nodes", Some(vec![2, 3, 4]))
            .unwrap();

        let parent = tracker.run_named("hyperparameter_optimization_max_leaf_nodes").unwrap();
        assert_eq!(parent.params["optimization_param"], "max_leaf_nodes");
        assert_eq!(parent.params["param_range_start"], "2");
        assert_eq!(parent.params["param_range_end"], "4");
        assert_eq!(parent.params["best_max_leaf_nodes"], result.best_value.to_string());
        assert_eq!(parent.metrics["best_accuracy"], result.best_score);

        let children = tracker.children_of(&parent.id);
        let names: Vec<&str> = children.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["max_leaf_nodes_2", "max_leaf_nodes_3", "max_leaf_nodes_4"]);
        assert_eq!(children[1].metrics["max_leaf_nodes"], 3.0);
        assert_eq!(children[1].params["n_estimators"], "100");

        let curve = result.curve_path.unwrap();
        assert_eq!(curve, dir.path().join("random_forest_max_leaf_nodes_optimization.svg"));
        assert!(curve.exists());
        assert_eq!(parent.artifacts, vec![curve]);
    }

    #[test]
    fn default_sweep_attaches_curve_to_parent_run() {
        let tracker = Arc::new(InMemoryTracker::new());
        let optimizer = HyperparameterOptimizer::new(ModelTrainer::new().with_tracker(tracker.clone()));
        assert_eq!(optimizer.artifact_dir(), default_artifact_dir().as_path());

        let result = optimizer
            .sweep_prepared(&prepared(), "n_estimators", Some(vec![5, 10]))
            .unwrap();
        assert!(result.curve_svg.contains("<svg"));
        assert_eq!(result.values().collect::<Vec<_>>(), vec![5, 10]);

        let curve = result.curve_path.unwrap();
        assert_eq!(
            curve,
            default_artifact_dir().join("random_forest_n_estimators_optimization.svg")
        );
        let parent = tracker.run_named("hyperparameter_optimization_n_estimators").unwrap();
        assert_eq!(parent.artifacts, vec![curve]);
    }

    #[test]
    fn unwritable_curve_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        let tracker = Arc::new(InMemoryTracker::new());
        let result = HyperparameterOptimizer::new(ModelTrainer::new().with_tracker(tracker.clone()))
            .with_artifact_dir(blocker.join("curves"))
            .sweep_prepared(&prepared(), "n_estimators", Some(vec![5]))
            .unwrap();
        assert!(result.curve_path.is_none());
        let parent = tracker.run_named("hyperparameter_optimization_n_estimators").unwrap();
        assert_eq!(parent.status, RunStatus::Completed);
        assert!(parent.artifacts.is_empty());
    }
}
