//! Crate-level error type.
//!
//! Each stage owns its error enum; [`Error`] aggregates them so pipeline code
//! can use `?` across stage boundaries. Nothing in the crate retries.

use thiserror::Error;

use crate::data::DataLoadError;
use crate::model::ConfigError;
use crate::persist::ArtifactError;
use crate::serving::SchemaMismatch;
use crate::training::{BalanceError, TrainError};

/// Any failure surfaced by the pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Dataset could not be read or is missing required columns.
    #[error(transparent)]
    DataLoad(#[from] DataLoadError),

    /// Invalid hyperparameters or sweep request.
    #[error("invalid configuration: {0}")]
    Validation(#[from] ConfigError),

    /// A class is too small for synthetic oversampling.
    #[error(transparent)]
    Balance(#[from] BalanceError),

    /// Fitting the forest failed.
    #[error(transparent)]
    Training(#[from] TrainError),

    /// Reading or writing a model artifact failed.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    /// Input does not conform to the model's feature schema.
    #[error(transparent)]
    SchemaMismatch(#[from] SchemaMismatch),
}

/// Result alias used by pipeline-level functions.
pub type Result<T, E = Error> = std::result::Result<T, E>;
