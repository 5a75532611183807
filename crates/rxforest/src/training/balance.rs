//! SMOTE class balancing.

use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use thiserror::Error;

use crate::data::EncodedSplit;

/// Default neighbour count.
pub const DEFAULT_K_NEIGHBORS: usize = 5;

/// Errors from oversampling.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BalanceError {
    /// A class that needs synthetic rows is not larger than `k_neighbors`.
    #[error(
        "class `{class}` has {size} samples; oversampling needs more than {k_neighbors} per class"
    )]
    NotEnoughNeighbors {
        class: String,
        size: usize,
        k_neighbors: usize,
    },

    #[error("{labels} labels for {rows} rows")]
    LabelCountMismatch { rows: usize, labels: usize },
}

/// Synthetic Minority Oversampling.
///
/// Every class is raised to the size of the largest class. Each synthetic row
/// lies on the segment between a class member and one of its `k_neighbors`
/// nearest (Euclidean) same-class neighbours. Classes are processed in sorted
/// label order and synthetic rows are appended after the original rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Smote {
    pub k_neighbors: usize,
}

impl Default for Smote {
    fn default() -> Self {
        Self {
            k_neighbors: DEFAULT_K_NEIGHBORS,
        }
    }
}

impl Smote {
    pub fn new(k_neighbors: usize) -> Self {
        Self { k_neighbors }
    }

    /// Balance an encoded training split. Deterministic for a given `seed`.
    pub fn balance(&self, split: &EncodedSplit, seed: u64) -> Result<EncodedSplit, BalanceError> {
        let x = split.features.view();
        let y = &split.labels;
        if x.nrows() != y.len() {
            return Err(BalanceError::LabelCountMismatch {
                rows: x.nrows(),
                labels: y.len(),
            });
        }

        let mut members: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, label) in y.iter().enumerate() {
            members.entry(label.as_str()).or_default().push(i);
        }
        let majority = members.values().map(Vec::len).max().unwrap_or(0);
        let k = self.k_neighbors.max(1);

        // Validate every class before generating anything.
        for (class, rows) in &members {
            if rows.len() < majority && rows.len() <= k {
                return Err(BalanceError::NotEnoughNeighbors {
                    class: class.to_string(),
                    size: rows.len(),
                    k_neighbors: k,
                });
            }
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut synthetic: Vec<f32> = Vec::new();
        let mut labels = y.clone();
        for (class, rows) in &members {
            let n_new = majority - rows.len();
            if n_new == 0 {
                continue;
            }
            let neighbors = nearest_neighbors(x, rows, k);
            for _ in 0..n_new {
                let pick = rng.gen_range(0..rows.len() * k);
                let (i, nn) = (pick / k, pick % k);
                let gap: f32 = rng.r#gen();
                let base = x.row(rows[i]);
                let other = x.row(neighbors[i][nn]);
                synthetic.extend(base.iter().zip(other.iter()).map(|(&a, &b)| a + gap * (b - a)));
                labels.push(class.to_string());
            }
            tracing::debug!(class = %class, original = rows.len(), synthetic = n_new, "oversampled class");
        }

        let n_cols = x.ncols();
        let n_synthetic = synthetic.len() / n_cols.max(1);
        let mut features = Array2::<f32>::zeros((x.nrows() + n_synthetic, n_cols));
        features.slice_mut(ndarray::s![..x.nrows(), ..]).assign(&x);
        if n_synthetic > 0 {
            let extra = ArrayView2::from_shape((n_synthetic, n_cols), synthetic.as_slice())
                .map_err(|_| BalanceError::LabelCountMismatch {
                    rows: n_synthetic,
                    labels: labels.len() - x.nrows(),
                })?;
            features.slice_mut(ndarray::s![x.nrows().., ..]).assign(&extra);
        }

        Ok(EncodedSplit::new(features, labels))
    }
}

/// For each member (by position in `rows`), the dataset indices of its `k`
/// nearest other members, nearest first, ties by index.
fn nearest_neighbors(x: ArrayView2<'_, f32>, rows: &[usize], k: usize) -> Vec<Vec<usize>> {
    rows.iter()
        .map(|&i| {
            let mut dists: Vec<(f32, usize)> = rows
                .iter()
                .filter(|&&j| j != i)
                .map(|&j| (squared_distance(x.row(i), x.row(j)), j))
                .collect();
            dists.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            dists.into_iter().take(k).map(|(_, j)| j).collect()
        })
        .collect()
}

#[inline]
fn squared_distance(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    a.iter().zip(b.iter()).map(|(&p, &q)| (p - q) * (p - q)).sum()
}
