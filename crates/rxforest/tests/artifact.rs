//! Artifact persistence: round-trip, corruption and serving from disk.

use std::fs;

use rxforest::data::RawRecord;
use rxforest::persist::{self, ArtifactRef, DeserializeError, HEADER_SIZE};
use rxforest::pipeline::{self, Pipeline};
use rxforest::testing::synthetic_records;
use rxforest::{ArtifactError, Hyperparameters, ModelHandle, TrainedModel, serving};

fn trained() -> (TrainedModel, pipeline::PreparedData) {
    let params = Hyperparameters::default()
        .with_n_estimators(25)
        .with_max_leaf_nodes(20)
        .with_random_state(42);
    let prepared = pipeline::prepare(&synthetic_records(200, 21), &params).unwrap();
    let outcome = Pipeline::new().train_and_evaluate(&prepared, &params).unwrap();
    (outcome.model, prepared)
}

#[test]
fn roundtrip_preserves_predictions_and_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let (model, prepared) = trained();
    let artifact = persist::save(&model, dir.path().join("model.rxf")).unwrap();
    let loaded = persist::load(&artifact).unwrap();

    let x = prepared.test.features.view();
    assert_eq!(loaded.predict(x).unwrap(), model.predict(x).unwrap());
    assert_eq!(loaded.predict_proba(x).unwrap(), model.predict_proba(x).unwrap());
    assert_eq!(loaded.schema(), model.schema());
    assert_eq!(loaded.classes(), model.classes());
    assert_eq!(loaded.hyperparameters(), model.hyperparameters());
    assert_eq!(loaded.info(), model.info());
}

#[test]
fn loaded_schema_drives_serving() {
    let dir = tempfile::tempdir().unwrap();
    let (model, _) = trained();
    let artifact = persist::save(&model, dir.path().join("model.rxf")).unwrap();
    let loaded = persist::load(&artifact).unwrap();

    let record = RawRecord::new(23, "F", "HIGH", "HIGH", 25.355);
    let x = serving::preprocess(&record, loaded.schema());
    assert_eq!(x, serving::preprocess(&record, model.schema()));

    let handle = ModelHandle::new(loaded);
    assert_eq!(handle.predict(&record).unwrap().label, model.predict_one(x.view()).unwrap());
}

#[test]
fn flipped_payload_byte_is_a_checksum_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.rxf");
    persist::save(&trained().0, &path).unwrap();

    let mut bytes = fs::read(&path).unwrap();
    bytes[HEADER_SIZE + 10] ^= 0x5A;
    fs::write(&path, &bytes).unwrap();

    let err = persist::load(&ArtifactRef::new(&path)).unwrap_err();
    assert!(matches!(
        err,
        ArtifactError::Read {
            source: DeserializeError::ChecksumMismatch { .. },
            ..
        }
    ));
    assert_eq!(err.path(), path);
}

#[test]
fn truncated_artifact_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.rxf");
    persist::save(&trained().0, &path).unwrap();

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    let err = persist::load(&ArtifactRef::new(&path)).unwrap_err();
    assert!(matches!(
        err,
        ArtifactError::Read {
            source: DeserializeError::Truncated { .. },
            ..
        }
    ));
}

#[test]
fn missing_artifact_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = persist::load(&ArtifactRef::new(dir.path().join("nope.rxf"))).unwrap_err();
    assert!(matches!(err, ArtifactError::Missing { .. }));
}

#[test]
fn error_converts_into_crate_error() {
    let dir = tempfile::tempdir().unwrap();
    let result: rxforest::Result<TrainedModel> =
        persist::load(&ArtifactRef::new(dir.path().join("nope.rxf"))).map_err(Into::into);
    assert!(matches!(result, Err(rxforest::Error::Artifact(ArtifactError::Missing { .. }))));
}
