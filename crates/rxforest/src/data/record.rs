//! Typed dataset rows.

use serde::{Deserialize, Serialize};

/// One patient record as it arrives from the dataset or a serving request.
///
/// Categorical attributes are kept as open strings: the training data decides
/// which categories exist, and serving may see values that training never did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "Age")]
    pub age: u32,
    #[serde(rename = "Sex")]
    pub sex: String,
    #[serde(rename = "BP")]
    pub bp: String,
    #[serde(rename = "Cholesterol")]
    pub cholesterol: String,
    #[serde(rename = "Na_to_K")]
    pub na_to_k: f64,
}

impl RawRecord {
    pub fn new(
        age: u32,
        sex: impl Into<String>,
        bp: impl Into<String>,
        cholesterol: impl Into<String>,
        na_to_k: f64,
    ) -> Self {
        Self {
            age,
            sex: sex.into(),
            bp: bp.into(),
            cholesterol: cholesterol.into(),
            na_to_k,
        }
    }
}

impl AsRef<RawRecord> for RawRecord {
    fn as_ref(&self) -> &RawRecord {
        self
    }
}

/// A training row: the raw attributes plus the prescribed drug.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRecord {
    pub record: RawRecord,
    pub drug: String,
}

impl LabeledRecord {
    pub fn new(record: RawRecord, drug: impl Into<String>) -> Self {
        Self {
            record,
            drug: drug.into(),
        }
    }
}

impl AsRef<RawRecord> for LabeledRecord {
    fn as_ref(&self) -> &RawRecord {
        &self.record
    }
}
