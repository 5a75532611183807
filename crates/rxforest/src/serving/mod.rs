//! Serving-side preprocessing and the live model slot.
//!
//! Serving encodes raw records against the schema persisted with the model,
//! never against a schema derived from the request. Two policies exist for
//! values the training data never produced:
//!
//! - [`UnseenCategoryPolicy::Drop`] (default): the indicator is dropped and an
//!   out-of-range continuous value leaves its whole group zero.
//! - [`UnseenCategoryPolicy::Reject`]: both cases fail with [`SchemaMismatch`].

mod handle;

pub use handle::{ModelHandle, Prediction, ServedModel};

use ndarray::{Array1, Array2};
use thiserror::Error;

use crate::data::{
    ATTRIBUTE_GROUPS, BinnedRecord, FeatureSchema, RawRecord, encode, encode_record, indicator_name,
};

/// Input that does not conform to a model's feature schema.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaMismatch {
    #[error("expected {expected} feature columns, got {actual}")]
    WidthMismatch { expected: usize, actual: usize },

    #[error("{labels} labels for {rows} rows")]
    LabelCountMismatch { rows: usize, labels: usize },

    #[error("category `{category}` of {attribute} was not seen during training")]
    UnseenCategory { attribute: &'static str, category: String },

    #[error("{attribute} value {value} is outside the binning range")]
    OutOfRange { attribute: &'static str, value: f64 },
}

/// How serving treats values the training schema has no column for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnseenCategoryPolicy {
    #[default]
    Drop,
    Reject,
}

/// Encode one record against `schema`, dropping anything the schema lacks.
///
/// Output length equals `schema.len()` and columns follow schema order.
pub fn preprocess(record: &RawRecord, schema: &FeatureSchema) -> Array1<f32> {
    encode_record(record, schema)
}

/// Encode a batch of records against `schema`, dropping anything it lacks.
pub fn preprocess_batch<R: AsRef<RawRecord>>(records: &[R], schema: &FeatureSchema) -> Array2<f32> {
    encode(records, Some(schema)).0
}

/// Encode one record, failing on unseen categories or out-of-range values.
pub fn preprocess_strict(record: &RawRecord, schema: &FeatureSchema) -> Result<Array1<f32>, SchemaMismatch> {
    check_conforms(record, schema)?;
    Ok(encode_record(record, schema))
}

/// Encode one record under `policy`.
pub fn preprocess_with_policy(
    record: &RawRecord,
    schema: &FeatureSchema,
    policy: UnseenCategoryPolicy,
) -> Result<Array1<f32>, SchemaMismatch> {
    match policy {
        UnseenCategoryPolicy::Drop => Ok(preprocess(record, schema)),
        UnseenCategoryPolicy::Reject => preprocess_strict(record, schema),
    }
}

fn check_conforms(record: &RawRecord, schema: &FeatureSchema) -> Result<(), SchemaMismatch> {
    let binned = BinnedRecord::from_raw(record);
    for (attribute, category) in ATTRIBUTE_GROUPS.into_iter().zip(binned.categories()) {
        let Some(category) = category else {
            let value = match attribute {
                "Age_binned" => f64::from(record.age),
                _ => record.na_to_k,
            };
            return Err(SchemaMismatch::OutOfRange { attribute, value });
        };
        if !schema.contains(&indicator_name(attribute, category)) {
            return Err(SchemaMismatch::UnseenCategory {
                attribute,
                category: category.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::synthetic_records;
    use rstest::rstest;

    fn schema() -> FeatureSchema {
        FeatureSchema::new([
            "Sex_F",
            "Sex_M",
            "BP_HIGH",
            "BP_LOW",
            "BP_NORMAL",
            "Cholesterol_HIGH",
            "Cholesterol_NORMAL",
            "Age_binned_20s",
            "Age_binned_40s",
            "Na_to_K_binned_20-30",
            "Na_to_K_binned_10-20",
        ])
    }

    fn record(age: u32, sex: &str, bp: &str, na_to_k: f64) -> RawRecord {
        RawRecord::new(age, sex, bp, "HIGH", na_to_k)
    }

    #[test]
    fn output_follows_schema_order() {
        let x = preprocess(&record(23, "F", "HIGH", 25.355), &schema());
        assert_eq!(x.len(), 11);
        let hot: Vec<usize> = x.iter().enumerate().filter(|(_, v)| **v == 1.0).map(|(i, _)| i).collect();
        assert_eq!(hot, vec![0, 2, 5, 7, 9]);
    }

    #[test]
    fn unseen_category_is_dropped_by_default() {
        let x = preprocess(&record(23, "X", "HIGH", 25.0), &schema());
        assert_eq!(x[0] + x[1], 0.0);
        assert_eq!(x.sum(), 4.0);
    }

    #[rstest]
    #[case(record(23, "X", "HIGH", 25.0), SchemaMismatch::UnseenCategory { attribute: "Sex", category: "X".into() })]
    #[case(record(65, "F", "HIGH", 25.0), SchemaMismatch::UnseenCategory { attribute: "Age_binned", category: "60s".into() })]
    #[case(record(150, "F", "HIGH", 25.0), SchemaMismatch::OutOfRange { attribute: "Age_binned", value: 150.0 })]
    #[case(record(23, "F", "HIGH", 75.0), SchemaMismatch::OutOfRange { attribute: "Na_to_K_binned", value: 75.0 })]
    fn strict_mode_rejects(#[case] input: RawRecord, #[case] expected: SchemaMismatch) {
        assert_eq!(preprocess_strict(&input, &schema()).unwrap_err(), expected);
    }

    #[test]
    fn policy_selects_behaviour() {
        let input = record(23, "X", "HIGH", 25.0);
        assert!(preprocess_with_policy(&input, &schema(), UnseenCategoryPolicy::Drop).is_ok());
        assert!(preprocess_with_policy(&input, &schema(), UnseenCategoryPolicy::Reject).is_err());

        let known = record(45, "M", "LOW", 12.0);
        assert_eq!(
            preprocess_with_policy(&known, &schema(), UnseenCategoryPolicy::Reject).unwrap(),
            preprocess(&known, &schema())
        );
    }

    #[test]
    fn batch_matches_single_records() {
        let records = synthetic_records(20, 9);
        let raw: Vec<RawRecord> = records.iter().map(|r| r.record.clone()).collect();
        let x = preprocess_batch(&raw, &schema());
        for (row, r) in x.rows().into_iter().zip(&raw) {
            assert_eq!(row.to_owned(), preprocess(r, &schema()));
        }
    }
}
