//! Best-first classification tree growth.
//!
//! Uses a **priority queue** (max-heap) of splittable leaves keyed by the
//! weighted impurity decrease of their best split:
//! 1. Evaluate the root's best split and push it
//! 2. Pop the highest-gain leaf and split it
//! 3. Evaluate both children and push the splittable ones
//! 4. Repeat until the leaf budget is reached or the queue is empty

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ndarray::ArrayView2;
use rand::Rng;

use crate::repr::{NodeId, Tree, TreeBuilder};

/// Nodes with impurity at or below this are pure.
const IMPURITY_EPSILON: f64 = 1e-7;

#[derive(Debug, Clone, Copy)]
pub(crate) struct GrowerParams {
    /// Leaf budget (>= 2).
    pub max_leaf_nodes: usize,
    /// Non-constant features examined per node.
    pub max_features: usize,
}

/// Best split found for a node.
#[derive(Debug, Clone)]
struct SplitInfo {
    feature: u32,
    threshold: f32,
    left_counts: Vec<f64>,
    right_counts: Vec<f64>,
}

/// A splittable leaf waiting in the queue.
#[derive(Debug, Clone)]
struct LeafCandidate {
    node_id: NodeId,
    /// Impurity decrease weighted by the node's share of the root weight.
    gain: f64,
    rows: Vec<u32>,
    split: SplitInfo,
}

// Higher gain first; on equal gain the older (lower id) node wins.
impl PartialEq for LeafCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for LeafCandidate {}

impl PartialOrd for LeafCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LeafCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.gain
            .total_cmp(&other.gain)
            .then_with(|| other.node_id.cmp(&self.node_id))
    }
}

/// Grows one tree over a fixed training matrix.
pub(crate) struct TreeGrower<'a> {
    x: ArrayView2<'a, f32>,
    /// Class index per row.
    y: &'a [usize],
    n_classes: usize,
    params: GrowerParams,
}

impl<'a> TreeGrower<'a> {
    pub fn new(x: ArrayView2<'a, f32>, y: &'a [usize], n_classes: usize, params: GrowerParams) -> Self {
        debug_assert_eq!(x.nrows(), y.len());
        Self {
            x,
            y,
            n_classes,
            params,
        }
    }

    /// Grow a tree. `weights[i]` is how often row `i` was drawn (0 = out of bag).
    pub fn grow<R: Rng>(&self, weights: &[f32], rng: &mut R) -> Tree {
        let rows: Vec<u32> = (0..self.x.nrows() as u32)
            .filter(|&i| weights[i as usize] > 0.0)
            .collect();
        let root_counts = self.class_counts(&rows, weights);
        let root_weight: f64 = root_counts.iter().sum();

        let mut builder = TreeBuilder::new(&normalize(&root_counts));
        let mut queue = BinaryHeap::new();
        self.push_candidate(&mut queue, 0, rows, &root_counts, root_weight, weights, rng);

        let mut n_leaves = 1;
        while n_leaves < self.params.max_leaf_nodes {
            let Some(candidate) = queue.pop() else {
                break;
            };
            let SplitInfo {
                feature,
                threshold,
                left_counts,
                right_counts,
            } = candidate.split;

            let (left_rows, right_rows): (Vec<u32>, Vec<u32>) = candidate
                .rows
                .into_iter()
                .partition(|&r| self.x[[r as usize, feature as usize]] < threshold);
            let (left, right) = builder.split(
                candidate.node_id,
                feature,
                threshold,
                &normalize(&left_counts),
                &normalize(&right_counts),
            );
            n_leaves += 1;

            self.push_candidate(&mut queue, left, left_rows, &left_counts, root_weight, weights, rng);
            self.push_candidate(&mut queue, right, right_rows, &right_counts, root_weight, weights, rng);
        }

        builder.finish()
    }

    #[allow(clippy::too_many_arguments)]
    fn push_candidate<R: Rng>(
        &self,
        queue: &mut BinaryHeap<LeafCandidate>,
        node_id: NodeId,
        rows: Vec<u32>,
        counts: &[f64],
        root_weight: f64,
        weights: &[f32],
        rng: &mut R,
    ) {
        let weight: f64 = counts.iter().sum();
        let impurity = gini(counts, weight);
        if rows.len() < 2 || impurity <= IMPURITY_EPSILON {
            return;
        }
        let Some(split) = self.best_split(&rows, counts, weights, rng) else {
            return;
        };

        let wl: f64 = split.left_counts.iter().sum();
        let wr: f64 = split.right_counts.iter().sum();
        let child_impurity =
            (wl / weight) * gini(&split.left_counts, wl) + (wr / weight) * gini(&split.right_counts, wr);
        let gain = (weight / root_weight) * (impurity - child_impurity);

        queue.push(LeafCandidate {
            node_id,
            gain,
            rows,
            split,
        });
    }

    /// Search features in random order until `max_features` non-constant
    /// features have been examined.
    fn best_split<R: Rng>(
        &self,
        rows: &[u32],
        counts: &[f64],
        weights: &[f32],
        rng: &mut R,
    ) -> Option<SplitInfo> {
        let n_features = self.x.ncols();
        let mut features: Vec<u32> = (0..n_features as u32).collect();
        let mut examined = 0;
        let mut best: Option<(f64, SplitInfo)> = None;
        let mut order: Vec<(f32, u32)> = Vec::with_capacity(rows.len());

        for i in 0..n_features {
            if examined >= self.params.max_features {
                break;
            }
            let j = rng.gen_range(i..n_features);
            features.swap(i, j);
            let feature = features[i];

            order.clear();
            order.extend(rows.iter().map(|&r| (self.x[[r as usize, feature as usize]], r)));
            order.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            let (first, last) = (order[0].0, order[order.len() - 1].0);
            if first >= last {
                continue;
            }
            examined += 1;

            if let Some(found) = self.scan_feature(feature, &order, counts, weights) {
                if best.as_ref().is_none_or(|(score, _)| found.0 > *score) {
                    best = Some(found);
                }
            }
        }

        best.map(|(_, split)| split)
    }

    /// Best threshold on one feature. Score is `sum(l^2)/wl + sum(r^2)/wr`,
    /// which is maximal where the weighted child Gini is minimal.
    fn scan_feature(
        &self,
        feature: u32,
        order: &[(f32, u32)],
        counts: &[f64],
        weights: &[f32],
    ) -> Option<(f64, SplitInfo)> {
        let mut left = vec![0.0f64; self.n_classes];
        let mut right = counts.to_vec();
        let mut best: Option<(f64, usize, Vec<f64>)> = None;

        for pos in 0..order.len() - 1 {
            let row = order[pos].1 as usize;
            let w = f64::from(weights[row]);
            left[self.y[row]] += w;
            right[self.y[row]] -= w;

            if order[pos + 1].0 <= order[pos].0 {
                continue;
            }
            let score = sum_sq_over_weight(&left) + sum_sq_over_weight(&right);
            if best.as_ref().is_none_or(|(s, _, _)| score > *s) {
                best = Some((score, pos, left.clone()));
            }
        }

        let (score, pos, left_counts) = best?;
        let right_counts: Vec<f64> = counts.iter().zip(&left_counts).map(|(c, l)| c - l).collect();
        let (lo, hi) = (order[pos].0, order[pos + 1].0);
        let mut threshold = lo / 2.0 + hi / 2.0;
        if threshold <= lo {
            threshold = hi;
        }
        Some((
            score,
            SplitInfo {
                feature,
                threshold,
                left_counts,
                right_counts,
            },
        ))
    }

    fn class_counts(&self, rows: &[u32], weights: &[f32]) -> Vec<f64> {
        let mut counts = vec![0.0f64; self.n_classes];
        for &r in rows {
            counts[self.y[r as usize]] += f64::from(weights[r as usize]);
        }
        counts
    }
}

fn gini(counts: &[f64], weight: f64) -> f64 {
    if weight <= 0.0 {
        return 0.0;
    }
    1.0 - counts.iter().map(|c| (c / weight).powi(2)).sum::<f64>()
}

fn sum_sq_over_weight(counts: &[f64]) -> f64 {
    let w: f64 = counts.iter().sum();
    if w <= 0.0 {
        return 0.0;
    }
    counts.iter().map(|c| c * c).sum::<f64>() / w
}

fn normalize(counts: &[f64]) -> Vec<f32> {
    let total: f64 = counts.iter().sum();
    if total <= 0.0 {
        return vec![0.0; counts.len()];
    }
    counts.iter().map(|&c| (c / total) as f32).collect()
}
