//! Classification tree in Structure-of-Arrays layout.

use ndarray::ArrayView1;

use super::NodeId;

// ============================================================================
// TreeValidationError
// ============================================================================

/// Structural validation errors for [`Tree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeValidationError {
    /// Tree has no nodes.
    EmptyTree,
    /// Per-node arrays have different lengths.
    ArrayLenMismatch { field: &'static str, len: usize, n_nodes: usize },
    /// Class distributions are not `n_nodes * n_classes` long.
    DistributionLenMismatch { expected: usize, actual: usize },
    /// A child pointer references an out-of-bounds node.
    ChildOutOfBounds {
        node: NodeId,
        side: &'static str,
        child: NodeId,
        n_nodes: usize,
    },
    /// A node references itself as a child.
    SelfLoop { node: NodeId },
    /// A node was reached by more than one path, or through a cycle.
    DuplicateVisit { node: NodeId },
    /// A node exists in storage but is unreachable from the root.
    UnreachableNode { node: NodeId },
    /// A split tests a feature the model does not have.
    FeatureOutOfRange { node: NodeId, feature: u32, n_features: usize },
}

impl std::fmt::Display for TreeValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTree => write!(f, "tree has no nodes"),
            Self::ArrayLenMismatch { field, len, n_nodes } => {
                write!(f, "{field} has {len} entries for {n_nodes} nodes")
            }
            Self::DistributionLenMismatch { expected, actual } => {
                write!(f, "expected {expected} distribution values, got {actual}")
            }
            Self::ChildOutOfBounds {
                node,
                side,
                child,
                n_nodes,
            } => write!(
                f,
                "node {node} has {side} child {child} outside 0..{n_nodes}"
            ),
            Self::SelfLoop { node } => write!(f, "node {node} is its own child"),
            Self::DuplicateVisit { node } => write!(f, "node {node} is reachable twice"),
            Self::UnreachableNode { node } => write!(f, "node {node} is unreachable"),
            Self::FeatureOutOfRange {
                node,
                feature,
                n_features,
            } => write!(
                f,
                "node {node} splits on feature {feature}, model has {n_features}"
            ),
        }
    }
}

impl std::error::Error for TreeValidationError {}

// ============================================================================
// Tree
// ============================================================================

/// Immutable classification tree.
///
/// Every node stores the class distribution of the training rows that reached
/// it; prediction reads the distribution of the leaf a sample lands in.
/// A sample goes left when `value < threshold`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    split_indices: Box<[u32]>,
    split_thresholds: Box<[f32]>,
    left_children: Box<[NodeId]>,
    right_children: Box<[NodeId]>,
    is_leaf: Box<[bool]>,
    /// `n_nodes * n_classes`, node-major.
    distributions: Box<[f32]>,
    n_classes: usize,
}

impl Tree {
    /// Create a tree from parallel per-node arrays.
    ///
    /// Lengths are not checked here; call [`Tree::validate`] on untrusted input.
    pub fn new(
        split_indices: Vec<u32>,
        split_thresholds: Vec<f32>,
        left_children: Vec<NodeId>,
        right_children: Vec<NodeId>,
        is_leaf: Vec<bool>,
        distributions: Vec<f32>,
        n_classes: usize,
    ) -> Self {
        Self {
            split_indices: split_indices.into_boxed_slice(),
            split_thresholds: split_thresholds.into_boxed_slice(),
            left_children: left_children.into_boxed_slice(),
            right_children: right_children.into_boxed_slice(),
            is_leaf: is_leaf.into_boxed_slice(),
            distributions: distributions.into_boxed_slice(),
            n_classes,
        }
    }

    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    #[inline]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_leaves(&self) -> usize {
        self.is_leaf.iter().filter(|&&l| l).count()
    }

    #[inline]
    pub fn is_leaf(&self, node: NodeId) -> bool {
        self.is_leaf[node as usize]
    }

    #[inline]
    pub fn split_index(&self, node: NodeId) -> u32 {
        self.split_indices[node as usize]
    }

    #[inline]
    pub fn split_threshold(&self, node: NodeId) -> f32 {
        self.split_thresholds[node as usize]
    }

    #[inline]
    pub fn left_child(&self, node: NodeId) -> NodeId {
        self.left_children[node as usize]
    }

    #[inline]
    pub fn right_child(&self, node: NodeId) -> NodeId {
        self.right_children[node as usize]
    }

    /// Class distribution at a node.
    #[inline]
    pub fn distribution(&self, node: NodeId) -> &[f32] {
        let start = node as usize * self.n_classes;
        &self.distributions[start..start + self.n_classes]
    }

    /// Walk from the root to the leaf reached by `sample`.
    #[inline]
    pub fn traverse_to_leaf(&self, sample: ArrayView1<'_, f32>) -> NodeId {
        let mut node = 0;
        while !self.is_leaf(node) {
            let value = sample[self.split_index(node) as usize];
            node = if value < self.split_threshold(node) {
                self.left_child(node)
            } else {
                self.right_child(node)
            };
        }
        node
    }

    /// Class distribution of the leaf reached by `sample`.
    #[inline]
    pub fn predict_proba(&self, sample: ArrayView1<'_, f32>) -> &[f32] {
        self.distribution(self.traverse_to_leaf(sample))
    }

    /// Maximum root-to-leaf edge count.
    pub fn depth(&self) -> usize {
        if self.n_nodes() == 0 {
            return 0;
        }
        let mut max_depth = 0;
        let mut stack = vec![(0 as NodeId, 0usize)];
        while let Some((node, d)) = stack.pop() {
            if self.is_leaf(node) {
                max_depth = max_depth.max(d);
            } else {
                stack.push((self.left_child(node), d + 1));
                stack.push((self.right_child(node), d + 1));
            }
        }
        max_depth
    }

    // =========================================================================
    // Raw accessors (persistence)
    // =========================================================================

    pub fn split_indices(&self) -> &[u32] {
        &self.split_indices
    }

    pub fn split_thresholds(&self) -> &[f32] {
        &self.split_thresholds
    }

    pub fn left_children(&self) -> &[NodeId] {
        &self.left_children
    }

    pub fn right_children(&self) -> &[NodeId] {
        &self.right_children
    }

    pub fn leaf_flags(&self) -> &[bool] {
        &self.is_leaf
    }

    pub fn distributions(&self) -> &[f32] {
        &self.distributions
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Validate structural invariants against the model's feature count.
    ///
    /// Checks array lengths, child bounds, and that every node is reached from
    /// the root exactly once.
    pub fn validate(&self, n_features: usize) -> Result<(), TreeValidationError> {
        let n_nodes = self.n_nodes();
        if n_nodes == 0 {
            return Err(TreeValidationError::EmptyTree);
        }

        for (field, len) in [
            ("split_indices", self.split_indices.len()),
            ("split_thresholds", self.split_thresholds.len()),
            ("left_children", self.left_children.len()),
            ("right_children", self.right_children.len()),
        ] {
            if len != n_nodes {
                return Err(TreeValidationError::ArrayLenMismatch { field, len, n_nodes });
            }
        }
        let expected = n_nodes * self.n_classes;
        if self.distributions.len() != expected {
            return Err(TreeValidationError::DistributionLenMismatch {
                expected,
                actual: self.distributions.len(),
            });
        }

        let mut visited = vec![false; n_nodes];
        let mut stack: Vec<NodeId> = vec![0];
        while let Some(node) = stack.pop() {
            let idx = node as usize;
            if visited[idx] {
                return Err(TreeValidationError::DuplicateVisit { node });
            }
            visited[idx] = true;

            if self.is_leaf(node) {
                continue;
            }

            let feature = self.split_index(node);
            if feature as usize >= n_features {
                return Err(TreeValidationError::FeatureOutOfRange {
                    node,
                    feature,
                    n_features,
                });
            }

            for (side, child) in [("left", self.left_child(node)), ("right", self.right_child(node))] {
                if child == node {
                    return Err(TreeValidationError::SelfLoop { node });
                }
                if child as usize >= n_nodes {
                    return Err(TreeValidationError::ChildOutOfBounds {
                        node,
                        side,
                        child,
                        n_nodes,
                    });
                }
                stack.push(child);
            }
        }

        if let Some(idx) = visited.iter().position(|&v| !v) {
            return Err(TreeValidationError::UnreachableNode { node: idx as NodeId });
        }
        Ok(())
    }
}

// ============================================================================
// TreeBuilder
// ============================================================================

/// Append-only tree under construction.
///
/// Starts as a single root leaf; [`TreeBuilder::split`] turns a leaf into an
/// internal node with two new leaf children.
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    split_indices: Vec<u32>,
    split_thresholds: Vec<f32>,
    left_children: Vec<NodeId>,
    right_children: Vec<NodeId>,
    is_leaf: Vec<bool>,
    distributions: Vec<f32>,
    n_classes: usize,
}

impl TreeBuilder {
    /// Create a builder whose root leaf holds `root_distribution`.
    pub fn new(root_distribution: &[f32]) -> Self {
        let mut builder = Self {
            split_indices: Vec::new(),
            split_thresholds: Vec::new(),
            left_children: Vec::new(),
            right_children: Vec::new(),
            is_leaf: Vec::new(),
            distributions: Vec::new(),
            n_classes: root_distribution.len(),
        };
        builder.push_leaf(root_distribution);
        builder
    }

    fn push_leaf(&mut self, distribution: &[f32]) -> NodeId {
        debug_assert_eq!(distribution.len(), self.n_classes);
        let id = self.is_leaf.len() as NodeId;
        self.split_indices.push(0);
        self.split_thresholds.push(0.0);
        self.left_children.push(0);
        self.right_children.push(0);
        self.is_leaf.push(true);
        self.distributions.extend_from_slice(distribution);
        id
    }

    /// Split leaf `node` on `feature < threshold`; returns `(left, right)`.
    pub fn split(
        &mut self,
        node: NodeId,
        feature: u32,
        threshold: f32,
        left_distribution: &[f32],
        right_distribution: &[f32],
    ) -> (NodeId, NodeId) {
        debug_assert!(self.is_leaf[node as usize], "only leaves can be split");
        let left = self.push_leaf(left_distribution);
        let right = self.push_leaf(right_distribution);
        let idx = node as usize;
        self.split_indices[idx] = feature;
        self.split_thresholds[idx] = threshold;
        self.left_children[idx] = left;
        self.right_children[idx] = right;
        self.is_leaf[idx] = false;
        (left, right)
    }

    pub fn n_leaves(&self) -> usize {
        self.is_leaf.iter().filter(|&&l| l).count()
    }

    pub fn finish(self) -> Tree {
        Tree::new(
            self.split_indices,
            self.split_thresholds,
            self.left_children,
            self.right_children,
            self.is_leaf,
            self.distributions,
            self.n_classes,
        )
    }
}
