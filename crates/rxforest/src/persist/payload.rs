//! Payload structures for the artifact format.
//!
//! These mirror the runtime types but stay stable across refactors of
//! [`Forest`] and [`Tree`]; conversion happens at the edges.

use serde::{Deserialize, Serialize};

use crate::data::FeatureSchema;
use crate::model::{Hyperparameters, TrainedModel};
use crate::repr::{Forest, Tree};

// ============================================================================
// Top-Level Payload
// ============================================================================

/// Version-tagged payload enum.
///
/// New format versions add variants rather than modifying existing ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Payload {
    V1(PayloadV1),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadV1 {
    pub metadata: ModelMetadata,
    pub forest: ForestPayload,
    /// Ordered indicator column names.
    pub schema: Vec<String>,
    pub hyperparameters: HyperparametersPayload,
}

// ============================================================================
// Metadata
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// e.g. "RandomForestClassifier".
    pub model_type: String,
    pub num_features: u32,
    pub num_classes: u32,
    pub crate_version: String,
}

/// Postcard is not self-describing, so `#[serde(default)]` on
/// [`Hyperparameters`] cannot be relied on; the payload carries every field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HyperparametersPayload {
    pub n_estimators: u32,
    pub max_leaf_nodes: u32,
    pub random_state: u64,
    pub test_size: f64,
    pub apply_smote: bool,
}

// ============================================================================
// Forest
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestPayload {
    /// Sorted class labels.
    pub classes: Vec<String>,
    pub trees: Vec<TreePayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreePayload {
    pub split_features: Vec<u32>,
    pub thresholds: Vec<f32>,
    pub left_children: Vec<u32>,
    pub right_children: Vec<u32>,
    pub is_leaf: Vec<bool>,
    /// `num_nodes * num_classes` class fractions, node-major.
    pub distributions: Vec<f32>,
}

// ============================================================================
// Conversions
// ============================================================================

impl From<&Tree> for TreePayload {
    fn from(tree: &Tree) -> Self {
        Self {
            split_features: tree.split_indices().to_vec(),
            thresholds: tree.split_thresholds().to_vec(),
            left_children: tree.left_children().to_vec(),
            right_children: tree.right_children().to_vec(),
            is_leaf: tree.leaf_flags().to_vec(),
            distributions: tree.distributions().to_vec(),
        }
    }
}

impl TreePayload {
    fn into_tree(self, n_classes: usize) -> Tree {
        Tree::new(
            self.split_features,
            self.thresholds,
            self.left_children,
            self.right_children,
            self.is_leaf,
            self.distributions,
            n_classes,
        )
    }
}

impl From<&Hyperparameters> for HyperparametersPayload {
    fn from(p: &Hyperparameters) -> Self {
        Self {
            n_estimators: p.n_estimators,
            max_leaf_nodes: p.max_leaf_nodes,
            random_state: p.random_state,
            test_size: p.test_size,
            apply_smote: p.apply_smote,
        }
    }
}

impl From<HyperparametersPayload> for Hyperparameters {
    fn from(p: HyperparametersPayload) -> Self {
        Hyperparameters {
            n_estimators: p.n_estimators,
            max_leaf_nodes: p.max_leaf_nodes,
            random_state: p.random_state,
            test_size: p.test_size,
            apply_smote: p.apply_smote,
        }
    }
}

impl From<&TrainedModel> for PayloadV1 {
    fn from(model: &TrainedModel) -> Self {
        let forest = model.forest();
        Self {
            metadata: ModelMetadata {
                model_type: crate::training::MODEL_TYPE.to_string(),
                num_features: model.n_features() as u32,
                num_classes: model.class_count() as u32,
                crate_version: env!("CARGO_PKG_VERSION").to_string(),
            },
            forest: ForestPayload {
                classes: forest.classes().to_vec(),
                trees: forest.trees().map(TreePayload::from).collect(),
            },
            schema: model.schema().columns().to_vec(),
            hyperparameters: model.hyperparameters().into(),
        }
    }
}

impl PayloadV1 {
    /// Rebuild runtime types. Structure is not validated here.
    pub fn into_parts(self) -> (Forest, FeatureSchema, Hyperparameters) {
        let schema = FeatureSchema::new(self.schema);
        let n_classes = self.forest.classes.len();
        let mut forest = Forest::new(self.forest.classes, schema.len());
        for tree in self.forest.trees {
            forest.push_tree(tree.into_tree(n_classes));
        }
        (forest, schema, self.hyperparameters.into())
    }
}
