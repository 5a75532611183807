//! Canonical model representations.
//!
//! - [`Tree`]: immutable SoA classification tree
//! - [`TreeBuilder`]: append-only construction used by the grower
//! - [`Forest`]: ensemble of trees sharing one class list

mod forest;
mod tree;

pub use forest::{Forest, ForestValidationError};
pub(crate) use forest::argmax;
pub use tree::{Tree, TreeBuilder, TreeValidationError};

/// Node index local to one tree (0 = root).
pub type NodeId = u32;
