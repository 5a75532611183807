//! Dataset handling: records, CSV loading, splitting and feature encoding.
//!
//! # Encoding overview
//!
//! Raw records carry two continuous attributes (`Age`, `Na_to_K`) and three
//! categorical ones (`Sex`, `BP`, `Cholesterol`). Encoding bins the continuous
//! attributes into named buckets, then one-hot encodes all five groups into
//! indicator columns named `<attribute>_<category>`.
//!
//! The ordered list of indicator columns is a [`FeatureSchema`]. It is derived
//! once from the training split; every other matrix (test split, sweep
//! candidates, serving records) is projected onto it.

mod binning;
mod encode;
mod loader;
mod record;
mod schema;
mod split;
mod summary;

pub use binning::{AGE_BINS, Binning, NA_TO_K_BINS};
pub use encode::{ATTRIBUTE_GROUPS, EncodedSplit, encode, encode_labeled, encode_record};
pub(crate) use encode::{BinnedRecord, indicator_name};
pub use loader::{DataLoadError, REQUIRED_COLUMNS, load_csv, read_csv};
pub use record::{LabeledRecord, RawRecord};
pub use schema::FeatureSchema;
pub use split::train_test_split;
pub use summary::{DatasetSummary, NumericSummary};
