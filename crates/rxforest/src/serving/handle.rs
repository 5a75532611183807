//! Versioned, atomically swappable model slot.

use std::path::Path;
use std::sync::Arc;

use ndarray::Array2;
use parking_lot::{Mutex, RwLock};

use super::{SchemaMismatch, UnseenCategoryPolicy, preprocess_batch, preprocess_with_policy};
use crate::data::{LabeledRecord, RawRecord};
use crate::error::Result;
use crate::eval::EvaluationResult;
use crate::model::{Hyperparameters, ModelInfo, TrainedModel};
use crate::pipeline::Pipeline;

/// A model as installed in a [`ModelHandle`].
///
/// The schema lives inside the model, so a snapshot can never pair one
/// model with another model's schema.
#[derive(Debug)]
pub struct ServedModel {
    pub version: u64,
    pub model: TrainedModel,
}

/// One prediction with the version of the model that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    /// Class probabilities, in [`TrainedModel::classes`] order.
    pub probabilities: Vec<f32>,
    pub version: u64,
}

/// Serving slot shared between request handlers and the retrain path.
///
/// Readers clone the current `Arc` under a short read lock and predict from
/// that snapshot without holding the lock. `install` replaces the `Arc` under
/// the write lock; in-flight readers keep their old snapshot.
///
/// Retrains are serialized, so the last model installed is also the last
/// artifact written.
#[derive(Debug)]
pub struct ModelHandle {
    slot: RwLock<Arc<ServedModel>>,
    retrain_lock: Mutex<()>,
    policy: UnseenCategoryPolicy,
}

impl ModelHandle {
    /// Serve `model` as version 1.
    pub fn new(model: TrainedModel) -> Self {
        Self {
            slot: RwLock::new(Arc::new(ServedModel { version: 1, model })),
            retrain_lock: Mutex::new(()),
            policy: UnseenCategoryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: UnseenCategoryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> UnseenCategoryPolicy {
        self.policy
    }

    /// Current model; stays valid across later installs.
    pub fn snapshot(&self) -> Arc<ServedModel> {
        Arc::clone(&self.slot.read())
    }

    pub fn version(&self) -> u64 {
        self.slot.read().version
    }

    /// Replace the served model; returns the new version.
    pub fn install(&self, model: TrainedModel) -> u64 {
        let mut slot = self.slot.write();
        let version = slot.version + 1;
        *slot = Arc::new(ServedModel { version, model });
        tracing::info!(version, "installed model");
        version
    }

    /// Predict one raw record.
    pub fn predict(&self, record: &RawRecord) -> std::result::Result<Prediction, SchemaMismatch> {
        let served = self.snapshot();
        let model = &served.model;
        let row = preprocess_with_policy(record, model.schema(), self.policy)?;

        let (label, probabilities) = model.predict_one_with_proba(row.view())?;
        Ok(Prediction {
            label,
            probabilities,
            version: served.version,
        })
    }

    /// Predict a batch of raw records against a single snapshot.
    ///
    /// Returns the labels and the version that produced them.
    pub fn predict_batch<R: AsRef<RawRecord>>(
        &self,
        records: &[R],
    ) -> std::result::Result<(Vec<String>, u64), SchemaMismatch> {
        let served = self.snapshot();
        let model = &served.model;
        let x = match self.policy {
            UnseenCategoryPolicy::Drop => preprocess_batch(records, model.schema()),
            UnseenCategoryPolicy::Reject => {
                let mut x = Array2::<f32>::zeros((records.len(), model.n_features()));
                for (record, mut row) in records.iter().zip(x.rows_mut()) {
                    row.assign(&preprocess_with_policy(record.as_ref(), model.schema(), self.policy)?);
                }
                x
            }
        };
        Ok((model.predict(x.view())?, served.version))
    }

    /// Metadata of the served model, including its version.
    pub fn info(&self) -> ModelInfo {
        let served = self.snapshot();
        ModelInfo {
            version: Some(served.version),
            ..served.model.info()
        }
    }

    /// Train on `records`, persist to `artifact_path`, then install.
    ///
    /// The new model is only installed after it has been written; on any
    /// failure the served model is unchanged. Concurrent retrains run one at
    /// a time, so the served model always matches the artifact on disk.
    pub fn retrain(
        &self,
        pipeline: &Pipeline,
        records: &[LabeledRecord],
        params: &Hyperparameters,
        artifact_path: impl AsRef<Path>,
    ) -> Result<EvaluationResult> {
        let _guard = self.retrain_lock.lock();
        let outcome = pipeline.retrain(records, params, artifact_path)?;
        self.install(outcome.model);
        Ok(outcome.evaluation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::encode_labeled;
    use crate::persist::{ArtifactRef, load};
    use crate::serving::preprocess;
    use ndarray::Axis;
    use crate::testing::synthetic_records;
    use crate::training::ModelTrainer;
    use approx::assert_abs_diff_eq;

    fn model(n_estimators: u32, seed: u64) -> TrainedModel {
        let records = synthetic_records(120, seed);
        let (split, schema) = encode_labeled(&records, None);
        let params = Hyperparameters::default()
            .with_n_estimators(n_estimators)
            .with_max_leaf_nodes(10);
        ModelTrainer::new().fit_untracked(&split, &schema, &params).unwrap()
    }

    fn patient() -> RawRecord {
        RawRecord::new(47, "M", "LOW", "HIGH", 10.114)
    }

    #[test]
    fn predict_reports_version_and_probabilities() {
        let handle = ModelHandle::new(model(5, 0));
        let p = handle.predict(&patient()).unwrap();
        assert_eq!(p.version, 1);
        assert_eq!(p.probabilities.len(), handle.snapshot().model.class_count());
        assert_abs_diff_eq!(p.probabilities.iter().sum::<f32>(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn install_bumps_version_and_keeps_old_snapshots() {
        let handle = ModelHandle::new(model(5, 0));
        let before = handle.snapshot();
        assert_eq!(handle.install(model(7, 1)), 2);

        assert_eq!(before.model.n_trees(), 5);
        assert_eq!(handle.snapshot().model.n_trees(), 7);
        let info = handle.info();
        assert_eq!(info.version, Some(2));
        assert_eq!(info.n_trees, 7);
    }

    #[test]
    fn batch_matches_single_predictions() {
        let handle = ModelHandle::new(model(5, 0));
        let records: Vec<RawRecord> = synthetic_records(15, 4).into_iter().map(|r| r.record).collect();
        let (labels, version) = handle.predict_batch(&records).unwrap();
        assert_eq!(version, 1);
        for (label, record) in labels.iter().zip(&records) {
            assert_eq!(*label, handle.predict(record).unwrap().label);
        }
    }

    #[test]
    fn reject_policy_surfaces_unseen_categories() {
        let handle = ModelHandle::new(model(5, 0)).with_policy(UnseenCategoryPolicy::Reject);
        let odd = RawRecord::new(47, "M", "EXTREME", "HIGH", 10.114);
        assert!(matches!(
            handle.predict(&odd),
            Err(SchemaMismatch::UnseenCategory { attribute: "BP", .. })
        ));
        assert!(handle.predict_batch(&[patient(), odd]).is_err());
    }

    #[test]
    fn concurrent_readers_see_consistent_models() {
        let handle = ModelHandle::new(model(3, 0));
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..50 {
                        let served = handle.snapshot();
                        let expected_trees = if served.version == 1 { 3 } else { 6 };
                        assert_eq!(served.model.n_trees(), expected_trees);
                        assert_eq!(served.model.forest().n_features(), served.model.schema().len());
                    }
                });
            }
            s.spawn(|| handle.install(model(6, 2)));
        });
        assert_eq!(handle.version(), 2);
    }

    #[test]
    fn failed_retrain_keeps_serving_model() {
        let handle = ModelHandle::new(model(3, 0));
        let dir = tempfile::tempdir().unwrap();
        let mut params = Hyperparameters::default();
        params.test_size = 1.5;

        let result = handle.retrain(&Pipeline::new(), &synthetic_records(100, 0), &params, dir.path().join("m.rxf"));
        assert!(result.is_err());
        assert_eq!(handle.version(), 1);
        assert!(!dir.path().join("m.rxf").exists());
    }

    #[test]
    fn retrain_persists_then_installs() {
        let handle = ModelHandle::new(model(3, 0));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.rxf");
        let params = Hyperparameters::default()
            .with_n_estimators(10)
            .with_max_leaf_nodes(12);

        let evaluation = handle
            .retrain(&Pipeline::new(), &synthetic_records(200, 3), &params, &path)
            .unwrap();
        assert_eq!(evaluation.n_samples(), 60);
        assert_eq!(handle.version(), 2);
        let loaded = load(&ArtifactRef::new(&path)).unwrap();
        assert_eq!(&loaded, &handle.snapshot().model);
    }

    #[test]
    fn concurrent_retrains_leave_served_model_on_disk() {
        let handle = ModelHandle::new(model(3, 0));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.rxf");
        let records = synthetic_records(200, 5);
        let pipeline = Pipeline::new();
        let params = |n_estimators| {
            Hyperparameters::default()
                .with_n_estimators(n_estimators)
                .with_max_leaf_nodes(6)
        };

        for round in 0..8u64 {
            std::thread::scope(|s| {
                for n_estimators in [3, 4] {
                    let (handle, pipeline, records, path) = (&handle, &pipeline, &records, &path);
                    s.spawn(move || {
                        handle
                            .retrain(pipeline, records, &params(n_estimators), path)
                            .unwrap();
                    });
                }
            });
            assert_eq!(handle.version(), 1 + 2 * (round + 1));
            let persisted = load(&ArtifactRef::new(&path)).unwrap();
            assert_eq!(persisted.n_trees(), handle.snapshot().model.n_trees());
            assert_eq!(&persisted, &handle.snapshot().model);
        }
    }

    #[test]
    fn label_is_argmax_of_reported_probabilities() {
        let handle = ModelHandle::new(model(9, 1));
        let served = handle.snapshot();
        for labeled in synthetic_records(20, 6) {
            let prediction = handle.predict(&labeled.record).unwrap();
            let row = preprocess(&labeled.record, served.model.schema());
            assert_eq!(prediction.label, served.model.predict_one(row.view()).unwrap());
            let proba = served
                .model
                .predict_proba(row.view().insert_axis(Axis(0)))
                .unwrap();
            assert_eq!(prediction.probabilities, proba.row(0).to_vec());
        }
    }
}
