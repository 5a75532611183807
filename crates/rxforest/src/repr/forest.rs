//! Random forest: trees averaged over a shared class list.

use ndarray::{Array2, ArrayView1, ArrayView2};

use super::tree::{Tree, TreeValidationError};

/// Structural validation errors for [`Forest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForestValidationError {
    /// Fewer than two classes.
    TooFewClasses { n_classes: usize },
    /// Forest holds no trees.
    NoTrees,
    /// A tree's distribution width differs from the class count.
    ClassCountMismatch { tree_idx: usize, n_classes: usize, expected: usize },
    InvalidTree { tree_idx: usize, error: TreeValidationError },
}

impl std::fmt::Display for ForestValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewClasses { n_classes } => {
                write!(f, "forest needs at least 2 classes, has {n_classes}")
            }
            Self::NoTrees => write!(f, "forest has no trees"),
            Self::ClassCountMismatch {
                tree_idx,
                n_classes,
                expected,
            } => write!(
                f,
                "tree {tree_idx} predicts {n_classes} classes, forest has {expected}"
            ),
            Self::InvalidTree { tree_idx, error } => write!(f, "tree {tree_idx}: {error}"),
        }
    }
}

impl std::error::Error for ForestValidationError {}

/// Ensemble of classification trees.
///
/// `classes` is sorted; class index `k` in every tree distribution refers to
/// `classes[k]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Forest {
    trees: Vec<Tree>,
    classes: Vec<String>,
    n_features: usize,
}

impl Forest {
    /// Create an empty forest over `classes` and `n_features` inputs.
    pub fn new(classes: Vec<String>, n_features: usize) -> Self {
        Self {
            trees: Vec::new(),
            classes,
            n_features,
        }
    }

    pub fn push_tree(&mut self, tree: Tree) {
        debug_assert_eq!(tree.n_classes(), self.classes.len());
        self.trees.push(tree);
    }

    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    #[inline]
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    #[inline]
    pub fn tree(&self, idx: usize) -> &Tree {
        &self.trees[idx]
    }

    pub fn trees(&self) -> impl Iterator<Item = &Tree> {
        self.trees.iter()
    }

    /// Mean class distribution over all trees for one row.
    pub fn predict_proba_row(&self, row: ArrayView1<'_, f32>) -> Vec<f32> {
        let mut acc = vec![0.0f32; self.n_classes()];
        for tree in &self.trees {
            for (a, &p) in acc.iter_mut().zip(tree.predict_proba(row)) {
                *a += p;
            }
        }
        if !self.trees.is_empty() {
            let n = self.trees.len() as f32;
            acc.iter_mut().for_each(|a| *a /= n);
        }
        acc
    }

    /// Class index with the highest mean probability; ties go to the lower index.
    pub fn predict_row(&self, row: ArrayView1<'_, f32>) -> usize {
        argmax(&self.predict_proba_row(row))
    }

    /// `[n_samples, n_classes]` probabilities.
    pub fn predict_proba(&self, x: ArrayView2<'_, f32>) -> Array2<f32> {
        let mut out = Array2::<f32>::zeros((x.nrows(), self.n_classes()));
        for (row, mut dst) in x.rows().into_iter().zip(out.rows_mut()) {
            for (d, p) in dst.iter_mut().zip(self.predict_proba_row(row)) {
                *d = p;
            }
        }
        out
    }

    /// Predicted class index per row.
    pub fn predict(&self, x: ArrayView2<'_, f32>) -> Vec<usize> {
        x.rows().into_iter().map(|row| self.predict_row(row)).collect()
    }

    /// Validate class list, tree shapes and each tree's structure.
    pub fn validate(&self) -> Result<(), ForestValidationError> {
        if self.classes.len() < 2 {
            return Err(ForestValidationError::TooFewClasses {
                n_classes: self.classes.len(),
            });
        }
        if self.trees.is_empty() {
            return Err(ForestValidationError::NoTrees);
        }
        for (tree_idx, tree) in self.trees.iter().enumerate() {
            if tree.n_classes() != self.classes.len() {
                return Err(ForestValidationError::ClassCountMismatch {
                    tree_idx,
                    n_classes: tree.n_classes(),
                    expected: self.classes.len(),
                });
            }
            tree.validate(self.n_features)
                .map_err(|error| ForestValidationError::InvalidTree { tree_idx, error })?;
        }
        Ok(())
    }
}

/// Index of the first maximum.
pub(crate) fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}
