//! In-process tracker that keeps every run in memory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::{RunHandle, RunStatus, Tracker, TrackingError};
use crate::model::{ModelInfo, TrainedModel};

/// Everything logged to one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRun {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub status: RunStatus,
    pub params: BTreeMap<String, String>,
    /// Last value logged per key.
    pub metrics: BTreeMap<String, f64>,
    pub models: Vec<ModelInfo>,
    pub artifacts: Vec<PathBuf>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    runs: Vec<RecordedRun>,
}

/// Thread-safe in-memory tracker.
#[derive(Debug, Default)]
pub struct InMemoryTracker {
    state: Mutex<State>,
}

impl InMemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all runs in start order.
    pub fn runs(&self) -> Vec<RecordedRun> {
        self.state.lock().runs.clone()
    }

    /// First run with the given name.
    pub fn run_named(&self, name: &str) -> Option<RecordedRun> {
        self.state.lock().runs.iter().find(|r| r.name == name).cloned()
    }

    /// Runs whose parent is `parent_id`, in start order.
    pub fn children_of(&self, parent_id: &str) -> Vec<RecordedRun> {
        self.state
            .lock()
            .runs
            .iter()
            .filter(|r| r.parent_id.as_deref() == Some(parent_id))
            .cloned()
            .collect()
    }

    fn with_active_run<T>(
        &self,
        run: &RunHandle,
        f: impl FnOnce(&mut RecordedRun) -> T,
    ) -> Result<T, TrackingError> {
        let mut state = self.state.lock();
        let recorded = state
            .runs
            .iter_mut()
            .find(|r| r.id == run.id())
            .ok_or_else(|| TrackingError::RunNotFound(run.id().to_string()))?;
        if recorded.status != RunStatus::Active {
            return Err(TrackingError::RunNotActive(run.id().to_string()));
        }
        Ok(f(recorded))
    }
}

impl Tracker for InMemoryTracker {
    fn start_run(&self, name: &str, parent: Option<&RunHandle>) -> Result<RunHandle, TrackingError> {
        let mut state = self.state.lock();
        if let Some(parent) = parent {
            if !state.runs.iter().any(|r| r.id == parent.id()) {
                return Err(TrackingError::RunNotFound(parent.id().to_string()));
            }
        }
        state.next_id += 1;
        let handle = RunHandle::new(format!("run-{}", state.next_id), name, parent);
        state.runs.push(RecordedRun {
            id: handle.id().to_string(),
            name: name.to_string(),
            parent_id: handle.parent_id().map(str::to_string),
            status: RunStatus::Active,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            models: Vec::new(),
            artifacts: Vec::new(),
        });
        Ok(handle)
    }

    fn log_param(&self, run: &RunHandle, key: &str, value: &str) -> Result<(), TrackingError> {
        self.with_active_run(run, |r| {
            r.params.insert(key.to_string(), value.to_string());
        })
    }

    fn log_metric(&self, run: &RunHandle, key: &str, value: f64) -> Result<(), TrackingError> {
        self.with_active_run(run, |r| {
            r.metrics.insert(key.to_string(), value);
        })
    }

    fn log_model(&self, run: &RunHandle, model: &TrainedModel) -> Result<(), TrackingError> {
        let info = model.info();
        self.with_active_run(run, |r| r.models.push(info))
    }

    fn log_artifact(&self, run: &RunHandle, path: &Path) -> Result<(), TrackingError> {
        self.with_active_run(run, |r| r.artifacts.push(path.to_path_buf()))
    }

    fn end_run(&self, run: &RunHandle, status: RunStatus) -> Result<(), TrackingError> {
        self.with_active_run(run, |r| r.status = status)
    }
}
