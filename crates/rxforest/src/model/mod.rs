//! Model configuration and the trained model type.

mod config;

pub use config::{ConfigError, Hyperparameters};

use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::Serialize;

use crate::data::FeatureSchema;
use crate::repr::{Forest, argmax};
use crate::serving::SchemaMismatch;

/// A fitted forest bundled with the schema and hyperparameters that produced it.
///
/// The schema travels with the model everywhere (persistence, serving) so the
/// encoding used at prediction time is always the one used for training.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    forest: Forest,
    schema: FeatureSchema,
    params: Hyperparameters,
}

/// Serializable model metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    /// Serving version; `None` outside a [`crate::ModelHandle`].
    pub version: Option<u64>,
    pub classes: Vec<String>,
    pub n_trees: usize,
    pub n_features: usize,
    pub features: Vec<String>,
    pub hyperparameters: Hyperparameters,
}

impl TrainedModel {
    /// Assemble a model. The forest must have been fitted on `schema`.
    pub fn new(forest: Forest, schema: FeatureSchema, params: Hyperparameters) -> Self {
        debug_assert_eq!(forest.n_features(), schema.len());
        Self {
            forest,
            schema,
            params,
        }
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.params
    }

    pub fn class_count(&self) -> usize {
        self.forest.n_classes()
    }

    /// Sorted class labels.
    pub fn classes(&self) -> &[String] {
        self.forest.classes()
    }

    pub fn n_features(&self) -> usize {
        self.schema.len()
    }

    pub fn n_trees(&self) -> usize {
        self.forest.n_trees()
    }

    fn check_width(&self, actual: usize) -> Result<(), SchemaMismatch> {
        if actual != self.schema.len() {
            return Err(SchemaMismatch::WidthMismatch {
                expected: self.schema.len(),
                actual,
            });
        }
        Ok(())
    }

    /// Predicted labels for rows encoded against this model's schema.
    pub fn predict(&self, x: ArrayView2<'_, f32>) -> Result<Vec<String>, SchemaMismatch> {
        self.check_width(x.ncols())?;
        Ok(self
            .forest
            .predict(x)
            .into_iter()
            .map(|k| self.classes()[k].clone())
            .collect())
    }

    /// Predicted label for one encoded row.
    pub fn predict_one(&self, row: ArrayView1<'_, f32>) -> Result<String, SchemaMismatch> {
        self.check_width(row.len())?;
        Ok(self.classes()[self.forest.predict_row(row)].clone())
    }

    /// Label and class probabilities for one encoded row, from a single pass
    /// over the forest.
    pub fn predict_one_with_proba(
        &self,
        row: ArrayView1<'_, f32>,
    ) -> Result<(String, Vec<f32>), SchemaMismatch> {
        self.check_width(row.len())?;
        let probabilities = self.forest.predict_proba_row(row);
        let label = self.classes()[argmax(&probabilities)].clone();
        Ok((label, probabilities))
    }

    /// `[n_samples, n_classes]` probabilities, columns in [`Self::classes`] order.
    pub fn predict_proba(&self, x: ArrayView2<'_, f32>) -> Result<Array2<f32>, SchemaMismatch> {
        self.check_width(x.ncols())?;
        Ok(self.forest.predict_proba(x))
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            version: None,
            classes: self.classes().to_vec(),
            n_trees: self.n_trees(),
            n_features: self.n_features(),
            features: self.schema.columns().to_vec(),
            hyperparameters: self.params.clone(),
        }
    }
}
