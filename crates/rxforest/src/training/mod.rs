//! Training: class balancing, tree growth and the forest trainer.
//!
//! # Overview
//!
//! - [`Smote`]: synthetic minority oversampling of the encoded training split
//! - [`ModelTrainer`]: fits a seeded random forest and reports to a tracker
//!
//! Trees are grown best-first: the leaf whose split most reduces weighted
//! Gini impurity is expanded next, until the leaf budget is used up or no
//! leaf can be split.

mod balance;
mod grower;
mod trainer;

pub use balance::{BalanceError, DEFAULT_K_NEIGHBORS, Smote};
pub use trainer::{MODEL_TYPE, ModelTrainer, TrainError};
