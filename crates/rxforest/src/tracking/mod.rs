//! Experiment tracking interface.
//!
//! The pipeline reports parameters, metrics, fitted models and artifact files
//! to a [`Tracker`]. Runs are explicit [`RunHandle`] values; nesting is
//! expressed by passing the parent handle to [`Tracker::start_run`].
//!
//! Tracking is best-effort: a failing tracker is logged and otherwise
//! ignored, so it can never change a pipeline result.

mod memory;

pub use memory::{InMemoryTracker, RecordedRun};

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::TrainedModel;

/// Status a run is closed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Active,
    Completed,
    Failed,
}

/// Handle to a started run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    id: String,
    name: String,
    parent_id: Option<String>,
}

impl RunHandle {
    pub fn new(id: impl Into<String>, name: impl Into<String>, parent: Option<&RunHandle>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_id: parent.map(|p| p.id.clone()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }
}

/// Errors reported by tracker implementations.
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("run not found: {0}")]
    RunNotFound(String),

    #[error("run is not active: {0}")]
    RunNotActive(String),

    #[error("tracking backend error: {0}")]
    Backend(String),
}

/// Tracking collaborator.
///
/// Implementations own their synchronization; all methods take `&self`.
pub trait Tracker: Send + Sync {
    fn start_run(&self, name: &str, parent: Option<&RunHandle>) -> Result<RunHandle, TrackingError>;

    fn log_param(&self, run: &RunHandle, key: &str, value: &str) -> Result<(), TrackingError>;

    fn log_metric(&self, run: &RunHandle, key: &str, value: f64) -> Result<(), TrackingError>;

    fn log_model(&self, run: &RunHandle, model: &TrainedModel) -> Result<(), TrackingError>;

    fn log_artifact(&self, run: &RunHandle, path: &Path) -> Result<(), TrackingError>;

    fn end_run(&self, run: &RunHandle, status: RunStatus) -> Result<(), TrackingError>;
}

/// Tracker that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracker;

impl Tracker for NoopTracker {
    fn start_run(&self, name: &str, parent: Option<&RunHandle>) -> Result<RunHandle, TrackingError> {
        Ok(RunHandle::new("", name, parent))
    }

    fn log_param(&self, _: &RunHandle, _: &str, _: &str) -> Result<(), TrackingError> {
        Ok(())
    }

    fn log_metric(&self, _: &RunHandle, _: &str, _: f64) -> Result<(), TrackingError> {
        Ok(())
    }

    fn log_model(&self, _: &RunHandle, _: &TrainedModel) -> Result<(), TrackingError> {
        Ok(())
    }

    fn log_artifact(&self, _: &RunHandle, _: &Path) -> Result<(), TrackingError> {
        Ok(())
    }

    fn end_run(&self, _: &RunHandle, _: RunStatus) -> Result<(), TrackingError> {
        Ok(())
    }
}

// =============================================================================
// Best-effort helpers
// =============================================================================

/// Log a failed tracking call and carry on.
pub(crate) fn best_effort(op: &'static str, result: Result<(), TrackingError>) {
    if let Err(err) = result {
        tracing::warn!(%err, op, "tracking call failed; continuing");
    }
}

/// Start a run, or return `None` if the tracker refuses.
pub(crate) fn try_start_run(
    tracker: &dyn Tracker,
    name: &str,
    parent: Option<&RunHandle>,
) -> Option<RunHandle> {
    match tracker.start_run(name, parent) {
        Ok(run) => Some(run),
        Err(err) => {
            tracing::warn!(%err, run = name, "could not start tracking run; continuing untracked");
            None
        }
    }
}

/// Log several string parameters to an optional run.
pub(crate) fn log_params(tracker: &dyn Tracker, run: Option<&RunHandle>, params: &[(&str, String)]) {
    if let Some(run) = run {
        for (key, value) in params {
            best_effort("log_param", tracker.log_param(run, key, value));
        }
    }
}

/// Log several metrics to an optional run.
pub(crate) fn log_metrics(tracker: &dyn Tracker, run: Option<&RunHandle>, metrics: &[(&str, f64)]) {
    if let Some(run) = run {
        for (key, value) in metrics {
            best_effort("log_metric", tracker.log_metric(run, key, *value));
        }
    }
}

/// Close an optional run.
pub(crate) fn finish_run(tracker: &dyn Tracker, run: Option<&RunHandle>, status: RunStatus) {
    if let Some(run) = run {
        best_effort("end_run", tracker.end_run(run, status));
    }
}
