//! Model artifacts on disk.
//!
//! An artifact bundles the forest, its class list, the [`FeatureSchema`] and
//! the [`Hyperparameters`] it was trained with, so a loaded model encodes
//! serving input exactly as it was encoded during training.
//!
//! Saving writes to a temporary file in the destination directory and
//! renames it into place; a reader never observes a partially written file.
//!
//! [`FeatureSchema`]: crate::data::FeatureSchema
//! [`Hyperparameters`]: crate::model::Hyperparameters

mod native;
mod payload;

pub use native::{
    CURRENT_VERSION_MAJOR, CURRENT_VERSION_MINOR, DeserializeError, FormatHeader, HEADER_SIZE,
    MAGIC, ModelType, NativeCodec, SerializeError, compute_checksum,
};
pub use payload::{Payload, PayloadV1};

use std::fs;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::model::TrainedModel;

/// Location of a persisted model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactRef(PathBuf);

impl ArtifactRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for ArtifactRef {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl From<PathBuf> for ArtifactRef {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl std::fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Failure to save or load an artifact. Always carries the path.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("model artifact not found: {}", path.display())]
    Missing { path: PathBuf },

    #[error("failed to write model artifact {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: SerializeError,
    },

    #[error("failed to read model artifact {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: DeserializeError,
    },
}

impl ArtifactError {
    pub fn path(&self) -> &Path {
        match self {
            Self::Missing { path } | Self::Write { path, .. } | Self::Read { path, .. } => path,
        }
    }
}

// ============================================================================
// Bytes
// ============================================================================

/// Encode a model into the artifact byte format.
pub fn to_bytes(model: &TrainedModel) -> Result<Vec<u8>, SerializeError> {
    let payload = Payload::V1(PayloadV1::from(model));
    NativeCodec::new().serialize(
        ModelType::RandomForestClassifier,
        model.n_features() as u32,
        model.class_count() as u32,
        &payload,
    )
}

/// Decode and validate a model from artifact bytes.
pub fn from_bytes(bytes: &[u8]) -> Result<TrainedModel, DeserializeError> {
    let (header, payload) = NativeCodec::new().deserialize::<Payload>(bytes)?;
    decode_payload(header, payload)
}

fn decode_payload(header: FormatHeader, payload: Payload) -> Result<TrainedModel, DeserializeError> {
    let Payload::V1(v1) = payload;

    check_agrees("features", header.num_features, v1.metadata.num_features)?;
    check_agrees("classes", header.num_classes, v1.metadata.num_classes)?;

    let (forest, schema, params) = v1.into_parts();
    check_agrees("features", header.num_features, schema.len() as u32)?;
    check_agrees("classes", header.num_classes, forest.n_classes() as u32)?;
    forest.validate()?;

    Ok(TrainedModel::new(forest, schema, params))
}

fn check_agrees(field: &'static str, header: u32, payload: u32) -> Result<(), DeserializeError> {
    if header != payload {
        return Err(DeserializeError::HeaderMismatch {
            field,
            header,
            payload,
        });
    }
    Ok(())
}

// ============================================================================
// Files
// ============================================================================

/// Persist `model` at `path`, creating parent directories as needed.
pub fn save(model: &TrainedModel, path: impl AsRef<Path>) -> Result<ArtifactRef, ArtifactError> {
    let path = path.as_ref();
    let write_err = |source: SerializeError| ArtifactError::Write {
        path: path.to_path_buf(),
        source,
    };

    let bytes = to_bytes(model).map_err(write_err)?;
    write_atomic(path, &bytes).map_err(|e| write_err(SerializeError::Io(e)))?;

    tracing::info!(
        path = %path.display(),
        bytes = bytes.len(),
        n_trees = model.n_trees(),
        "saved model artifact"
    );
    Ok(ArtifactRef::new(path))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".rxforest-artifact")
        .tempfile_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Load and validate the model at `artifact`.
pub fn load(artifact: &ArtifactRef) -> Result<TrainedModel, ArtifactError> {
    let path = artifact.path();
    if !path.exists() {
        return Err(ArtifactError::Missing {
            path: path.to_path_buf(),
        });
    }
    let read_err = |source: DeserializeError| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    };

    let file = fs::File::open(path).map_err(|e| read_err(e.into()))?;
    let (header, payload_bytes) = NativeCodec::new()
        .read_from(&mut BufReader::new(file))
        .map_err(read_err)?;
    let payload: Payload = postcard::from_bytes(&payload_bytes).map_err(|e| read_err(e.into()))?;
    let model = decode_payload(header, payload).map_err(read_err)?;

    tracing::info!(
        path = %path.display(),
        n_trees = model.n_trees(),
        n_features = model.n_features(),
        "loaded model artifact"
    );
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{self, FeatureSchema};
    use crate::model::Hyperparameters;
    use crate::repr::{Forest, TreeBuilder};
    use crate::testing::synthetic_records;
    use crate::training::ModelTrainer;

    fn small_model() -> TrainedModel {
        let records = synthetic_records(60, 3);
        let (split, schema) = data::encode_labeled(&records, None);
        let params = Hyperparameters::default()
            .with_n_estimators(5)
            .with_max_leaf_nodes(8);
        ModelTrainer::new()
            .fit_untracked(&split, &schema, &params)
            .unwrap()
    }

    fn stump_model(split_feature: u32) -> TrainedModel {
        let mut builder = TreeBuilder::new(&[0.5, 0.5]);
        builder.split(0, split_feature, 0.5, &[1.0, 0.0], &[0.0, 1.0]);
        let mut forest = Forest::new(vec!["a".into(), "b".into()], 2);
        forest.push_tree(builder.finish());
        let schema = FeatureSchema::new(["Sex_F", "Sex_M"]);
        TrainedModel::new(forest, schema, Hyperparameters::default())
    }

    #[test]
    fn bytes_roundtrip_preserves_model() {
        let model = small_model();
        let restored = from_bytes(&to_bytes(&model).unwrap()).unwrap();
        assert_eq!(restored, model);
    }

    #[test]
    fn save_creates_parent_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("drug.rxf");
        let model = stump_model(1);

        let artifact = save(&model, &path).unwrap();
        assert_eq!(artifact.path(), path);
        let entries: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(load(&artifact).unwrap(), model);
    }

    #[test]
    fn save_overwrites_existing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.rxf");
        save(&stump_model(0), &path).unwrap();
        save(&stump_model(1), &path).unwrap();

        let loaded = load(&ArtifactRef::new(&path)).unwrap();
        assert_eq!(loaded.forest().tree(0).split_index(0), 1);
    }

    #[test]
    fn split_feature_outside_schema_fails_validation() {
        let err = from_bytes(&to_bytes(&stump_model(7)).unwrap()).unwrap_err();
        assert!(matches!(err, DeserializeError::InvalidModel(_)));
    }

    #[test]
    fn header_disagreement_is_rejected() {
        let mut bytes = to_bytes(&stump_model(0)).unwrap();
        // num_classes lives at offset 24; it is not covered by the checksum.
        bytes[24] = 3;
        let err = from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            DeserializeError::HeaderMismatch {
                field: "classes",
                header: 3,
                payload: 2
            }
        ));
    }

    #[test]
    fn missing_artifact_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = ArtifactRef::new(dir.path().join("absent.rxf"));
        let err = load(&artifact).unwrap_err();
        assert!(matches!(err, ArtifactError::Missing { .. }));
        assert_eq!(err.path(), artifact.path());
        assert!(err.to_string().contains("absent.rxf"));
    }

    #[test]
    fn non_artifact_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, b"Age,Sex,BP,Cholesterol,Na_to_K,Drug\n23,F,HIGH,HIGH,25.355,DrugY\n").unwrap();
        let err = load(&ArtifactRef::new(&path)).unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::Read {
                source: DeserializeError::NotAModel,
                ..
            }
        ));
    }
}
