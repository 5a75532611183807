//! rxforest: a drug-classification pipeline built on random forests.
//!
//! The crate turns tabular patient records into one-hot feature vectors,
//! balances the training split with SMOTE, fits a seeded random forest,
//! evaluates it, sweeps hyperparameters through the same training path, and
//! persists the model together with the feature schema it was trained on.
//!
//! # Key Types
//!
//! - [`LabeledRecord`] / [`RawRecord`] - Input rows
//! - [`FeatureSchema`] - Ordered indicator columns fixed by the training split
//! - [`Hyperparameters`] - Validated training configuration
//! - [`TrainedModel`] - Forest + schema + hyperparameters
//! - [`ModelTrainer`] / [`Evaluator`] / [`HyperparameterOptimizer`] - Pipeline stages
//! - [`ModelHandle`] - Swappable serving slot
//!
//! # Training
//!
//! ```ignore
//! use rxforest::{pipeline, Hyperparameters};
//!
//! let records = rxforest::data::load_csv("drug200.csv")?;
//! let params = Hyperparameters::builder().n_estimators(50).build()?;
//! let prepared = pipeline::prepare(&records, &params)?;
//! let model = rxforest::ModelTrainer::new().fit(&prepared.train, &prepared.schema, &params)?;
//! ```
//!
//! # Serving
//!
//! Serving code loads the artifact, wraps it in a [`ModelHandle`], and runs
//! raw records through [`serving::preprocess`] against the persisted schema.

pub mod data;
pub mod error;
pub mod eval;
pub mod model;
pub mod persist;
pub mod pipeline;
pub mod repr;
pub mod serving;
pub mod testing;
pub mod tracking;
pub mod training;
pub mod tuning;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use error::{Error, Result};

pub use data::{EncodedSplit, FeatureSchema, LabeledRecord, RawRecord, encode};
pub use model::{ConfigError, Hyperparameters, ModelInfo, TrainedModel};

pub use eval::{EvaluationResult, Evaluator};
pub use training::{BalanceError, ModelTrainer, Smote, TrainError};
pub use tuning::{HyperparameterOptimizer, OptimizationResult, SweepParam};

pub use persist::{ArtifactError, ArtifactRef};
pub use serving::{ModelHandle, SchemaMismatch, UnseenCategoryPolicy};
pub use tracking::{InMemoryTracker, NoopTracker, RunHandle, RunStatus, Tracker};

pub use utils::{Parallelism, run_with_threads};
