//! Model evaluation on a held-out split.

mod confusion;
mod report;

pub use confusion::ConfusionMatrix;
pub use report::{ClassMetrics, classification_report, macro_average, per_class_metrics, weighted_average};

use std::sync::Arc;

use serde::Serialize;

use crate::data::EncodedSplit;
use crate::model::TrainedModel;
use crate::serving::SchemaMismatch;
use crate::tracking::{self, NoopTracker, RunHandle, Tracker};

/// Metrics of one model on one split.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResult {
    pub accuracy: f64,
    /// Support-weighted precision.
    pub precision: f64,
    /// Support-weighted recall.
    pub recall: f64,
    /// Support-weighted F1.
    pub f1_score: f64,
    pub confusion: ConfusionMatrix,
    pub report: String,
    pub predictions: Vec<String>,
}

impl EvaluationResult {
    /// Score predictions against true labels.
    pub fn from_predictions(y_true: &[String], predictions: Vec<String>) -> Self {
        let confusion = ConfusionMatrix::from_labels(y_true, predictions.as_slice());
        let metrics = per_class_metrics(&confusion);
        let (precision, recall, f1_score) = weighted_average(&metrics);
        let report = classification_report(&confusion);
        Self {
            accuracy: exact_match(y_true, &predictions),
            precision,
            recall,
            f1_score,
            confusion,
            report,
            predictions,
        }
    }

    pub fn n_samples(&self) -> usize {
        self.predictions.len()
    }
}

/// Fraction of positions where both sequences agree; 0 when empty.
pub fn exact_match(y_true: &[String], y_pred: &[String]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

/// Scores fitted models and reports metrics to a tracker.
#[derive(Clone)]
pub struct Evaluator {
    tracker: Arc<dyn Tracker>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator").finish_non_exhaustive()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self {
            tracker: Arc::new(NoopTracker),
        }
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn Tracker>) -> Self {
        self.tracker = tracker;
        self
    }

    /// Evaluate `model` on `test`, logging metrics to `run` when given.
    ///
    /// Tracking failures are logged and ignored.
    pub fn evaluate(
        &self,
        model: &TrainedModel,
        test: &EncodedSplit,
        run: Option<&RunHandle>,
    ) -> Result<EvaluationResult, SchemaMismatch> {
        if test.labels.len() != test.n_samples() {
            return Err(SchemaMismatch::LabelCountMismatch {
                rows: test.n_samples(),
                labels: test.labels.len(),
            });
        }
        let predictions = model.predict(test.features.view())?;
        let result = EvaluationResult::from_predictions(&test.labels, predictions);

        tracing::info!(
            accuracy = result.accuracy,
            precision = result.precision,
            recall = result.recall,
            f1 = result.f1_score,
            samples = result.n_samples(),
            "evaluated model"
        );
        tracking::log_metrics(
            self.tracker.as_ref(),
            run,
            &[
                ("test_accuracy", result.accuracy),
                ("test_precision", result.precision),
                ("test_recall", result.recall),
                ("test_f1_score", result.f1_score),
                ("test_samples", result.n_samples() as f64),
            ],
        );
        Ok(result)
    }
}
