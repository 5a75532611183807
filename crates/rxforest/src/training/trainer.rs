//! Random forest trainer.

use std::collections::BTreeSet;
use std::sync::Arc;

use ndarray::ArrayView2;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use thiserror::Error;

use super::grower::{GrowerParams, TreeGrower};
use crate::data::{EncodedSplit, FeatureSchema};
use crate::model::{ConfigError, Hyperparameters, TrainedModel};
use crate::repr::{Forest, Tree};
use crate::tracking::{self, NoopTracker, RunHandle, RunStatus, Tracker};
use crate::utils::Parallelism;

/// Model type reported to the tracker.
pub const MODEL_TYPE: &str = "RandomForestClassifier";

/// Errors from fitting a forest. None of them are retried.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrainError {
    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("{labels} labels for {rows} rows")]
    LabelCountMismatch { rows: usize, labels: usize },

    #[error("feature matrix has {actual} columns but the schema has {expected}")]
    FeatureWidthMismatch { expected: usize, actual: usize },

    #[error("training split has only class `{class}`; at least two classes are required")]
    SingleClass { class: String },

    #[error("invalid hyperparameters: {0}")]
    InvalidHyperparameters(#[from] ConfigError),
}

/// Fits random forests and reports them to a [`Tracker`].
///
/// # Example
///
/// ```ignore
/// let trainer = ModelTrainer::new().with_parallelism(Parallelism::Parallel);
/// let model = trainer.fit(&prepared.train, &prepared.schema, &params)?;
/// ```
#[derive(Clone)]
pub struct ModelTrainer {
    tracker: Arc<dyn Tracker>,
    parallelism: Parallelism,
}

impl Default for ModelTrainer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ModelTrainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelTrainer")
            .field("parallelism", &self.parallelism)
            .finish_non_exhaustive()
    }
}

impl ModelTrainer {
    /// Sequential trainer with no tracking.
    pub fn new() -> Self {
        Self {
            tracker: Arc::new(NoopTracker),
            parallelism: Parallelism::Sequential,
        }
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn Tracker>) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn tracker(&self) -> &Arc<dyn Tracker> {
        &self.tracker
    }

    pub fn parallelism(&self) -> Parallelism {
        self.parallelism
    }

    /// Fit a model in its own tracking run.
    pub fn fit(
        &self,
        train: &EncodedSplit,
        schema: &FeatureSchema,
        params: &Hyperparameters,
    ) -> Result<TrainedModel, TrainError> {
        let run = tracking::try_start_run(self.tracker.as_ref(), "random_forest_training", None);
        let result = self.fit_in_run(train, schema, params, run.as_ref());
        let status = if result.is_ok() {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
        tracking::finish_run(self.tracker.as_ref(), run.as_ref(), status);
        result
    }

    /// Fit a model, logging parameters and the fitted model to `run`.
    pub fn fit_in_run(
        &self,
        train: &EncodedSplit,
        schema: &FeatureSchema,
        params: &Hyperparameters,
        run: Option<&RunHandle>,
    ) -> Result<TrainedModel, TrainError> {
        let tracker = self.tracker.as_ref();
        tracking::log_params(
            tracker,
            run,
            &[
                ("model_type", MODEL_TYPE.to_string()),
                ("n_estimators", params.n_estimators.to_string()),
                ("max_leaf_nodes", params.max_leaf_nodes.to_string()),
                ("random_state", params.random_state.to_string()),
                ("training_samples", train.n_samples().to_string()),
            ],
        );

        let model = self.fit_untracked(train, schema, params)?;

        if let Some(run) = run {
            tracking::best_effort("log_model", tracker.log_model(run, &model));
        }
        Ok(model)
    }

    /// Fit a model without touching the tracker.
    ///
    /// This is the single training path: [`Self::fit`], [`Self::fit_in_run`]
    /// and the hyperparameter sweep all end up here.
    pub fn fit_untracked(
        &self,
        train: &EncodedSplit,
        schema: &FeatureSchema,
        params: &Hyperparameters,
    ) -> Result<TrainedModel, TrainError> {
        if train.features.ncols() != schema.len() {
            return Err(TrainError::FeatureWidthMismatch {
                expected: schema.len(),
                actual: train.features.ncols(),
            });
        }
        let forest = self.fit_forest(train.features.view(), &train.labels, params)?;
        Ok(TrainedModel::new(forest, schema.clone(), params.clone()))
    }

    fn fit_forest(
        &self,
        x: ArrayView2<'_, f32>,
        labels: &[String],
        params: &Hyperparameters,
    ) -> Result<Forest, TrainError> {
        params.validate()?;
        let n_rows = x.nrows();
        if n_rows == 0 {
            return Err(TrainError::EmptyTrainingSet);
        }
        if labels.len() != n_rows {
            return Err(TrainError::LabelCountMismatch {
                rows: n_rows,
                labels: labels.len(),
            });
        }

        let classes: Vec<String> = labels
            .iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .cloned()
            .collect();
        if classes.len() < 2 {
            return Err(TrainError::SingleClass {
                class: classes.into_iter().next().unwrap_or_default(),
            });
        }
        let y: Vec<usize> = labels
            .iter()
            .map(|l| classes.binary_search(l).unwrap_or_default())
            .collect();

        let n_features = x.ncols();
        let grower_params = GrowerParams {
            max_leaf_nodes: params.max_leaf_nodes as usize,
            max_features: ((n_features as f64).sqrt().floor() as usize).max(1),
        };
        let grower = TreeGrower::new(x.reborrow(), &y, classes.len(), grower_params);

        // Seeds are drawn up front so tree i is identical whatever thread grows it.
        let mut master = Xoshiro256PlusPlus::seed_from_u64(params.random_state);
        let seeds: Vec<u64> = (0..params.n_estimators).map(|_| master.next_u64()).collect();

        tracing::debug!(
            n_trees = params.n_estimators,
            n_rows,
            n_features,
            n_classes = classes.len(),
            max_features = grower_params.max_features,
            "fitting forest"
        );

        let trees: Vec<Tree> = self.parallelism.maybe_par_map(seeds, |seed| {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
            let weights = bootstrap_weights(n_rows, &mut rng);
            grower.grow(&weights, &mut rng)
        });

        let mut forest = Forest::new(classes, n_features);
        for tree in trees {
            forest.push_tree(tree);
        }
        Ok(forest)
    }
}

/// Draw `n` rows with replacement; returns how often each row was drawn.
fn bootstrap_weights<R: Rng>(n: usize, rng: &mut R) -> Vec<f32> {
    let mut weights = vec![0.0f32; n];
    for _ in 0..n {
        weights[rng.gen_range(0..n)] += 1.0;
    }
    weights
}
