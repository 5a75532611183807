//! Training hyperparameters with builder pattern.
//!
//! [`Hyperparameters`] is built with `bon`; the finishing `build()` validates.
//! It also (de)serializes with per-field defaults, so a JSON config only needs
//! the fields it overrides.
//!
//! # Example
//!
//! ```
//! use rxforest::Hyperparameters;
//!
//! let params = Hyperparameters::builder().build().unwrap();
//! assert_eq!(params.n_estimators, 100);
//!
//! let params = Hyperparameters::builder()
//!     .max_leaf_nodes(12)
//!     .random_state(7)
//!     .apply_smote(false)
//!     .build()
//!     .unwrap();
//! assert_eq!(params.max_leaf_nodes, 12);
//! ```

use bon::Builder;
use serde::{Deserialize, Serialize};

// =============================================================================
// ConfigError
// =============================================================================

/// Errors raised while validating configuration, before any training starts.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// `n_estimators` must be at least 1.
    InvalidNEstimators,
    /// `max_leaf_nodes` must be at least 2.
    InvalidMaxLeafNodes(u32),
    /// `test_size` must lie in (0, 1).
    InvalidTestSize(f64),
    /// The split leaves the train or test side empty.
    EmptySplit { n_samples: usize, test_size: f64 },
    /// Sweep over a parameter that is not supported.
    UnsupportedSweepParam(String),
    /// Sweep range has no candidates.
    EmptySweepRange { param: &'static str },
    /// Sweep candidate is not a valid value for its parameter.
    InvalidSweepValue { param: &'static str, value: u32 },
    /// A configuration file could not be read or parsed.
    InvalidFile { path: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNEstimators => write!(f, "n_estimators must be at least 1"),
            Self::InvalidMaxLeafNodes(v) => {
                write!(f, "max_leaf_nodes must be at least 2, got {}", v)
            }
            Self::InvalidTestSize(v) => write!(f, "test_size must be in (0, 1), got {}", v),
            Self::EmptySplit {
                n_samples,
                test_size,
            } => write!(
                f,
                "test_size {} leaves an empty split for {} samples",
                test_size, n_samples
            ),
            Self::UnsupportedSweepParam(name) => write!(
                f,
                "unsupported sweep parameter `{}` (expected max_leaf_nodes or n_estimators)",
                name
            ),
            Self::EmptySweepRange { param } => write!(f, "sweep range for {} is empty", param),
            Self::InvalidSweepValue { param, value } => {
                write!(f, "{} is not a valid value for {}", value, param)
            }
            Self::InvalidFile { path, message } => {
                write!(f, "cannot load config {}: {}", path, message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// =============================================================================
// Hyperparameters
// =============================================================================

/// Random forest training configuration.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
#[serde(default)]
pub struct Hyperparameters {
    /// Number of trees. Default: 100.
    #[builder(default = 100)]
    pub n_estimators: u32,

    /// Leaf budget per tree (best-first growth). Default: 30.
    #[builder(default = 30)]
    pub max_leaf_nodes: u32,

    /// Seed for the split, SMOTE and the forest. Default: 0.
    #[builder(default = 0)]
    pub random_state: u64,

    /// Fraction of rows held out for evaluation. Default: 0.3.
    #[builder(default = 0.3)]
    pub test_size: f64,

    /// Oversample minority classes in the training split. Default: true.
    #[builder(default = true)]
    pub apply_smote: bool,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self::builder().__build_internal()
    }
}

/// Custom finishing function that validates the configuration.
impl<S: hyperparameters_builder::IsComplete> HyperparametersBuilder<S> {
    /// Build and validate.
    ///
    /// # Errors
    ///
    /// - `n_estimators == 0`
    /// - `max_leaf_nodes < 2`
    /// - `test_size` outside (0, 1)
    pub fn build(self) -> Result<Hyperparameters, ConfigError> {
        let params = self.__build_internal();
        params.validate()?;
        Ok(params)
    }
}

impl Hyperparameters {
    /// Validate a configuration obtained without the builder (e.g. from JSON).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_estimators == 0 {
            return Err(ConfigError::InvalidNEstimators);
        }
        if self.max_leaf_nodes < 2 {
            return Err(ConfigError::InvalidMaxLeafNodes(self.max_leaf_nodes));
        }
        // NaN fails both comparisons.
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(ConfigError::InvalidTestSize(self.test_size));
        }
        Ok(())
    }

    pub fn with_n_estimators(mut self, n_estimators: u32) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    pub fn with_max_leaf_nodes(mut self, max_leaf_nodes: u32) -> Self {
        self.max_leaf_nodes = max_leaf_nodes;
        self
    }

    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = random_state;
        self
    }
}
