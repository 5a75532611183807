//! Binning + one-hot encoding + schema projection.

use ndarray::{Array1, Array2, ArrayViewMut1};

use super::binning::{AGE_BINS, NA_TO_K_BINS};
use super::record::{LabeledRecord, RawRecord};
use super::schema::FeatureSchema;

/// Attribute groups in encoding order.
pub const ATTRIBUTE_GROUPS: [&str; 5] = ["Sex", "BP", "Cholesterol", "Age_binned", "Na_to_K_binned"];

/// A record after binning: one optional category per attribute group.
///
/// `None` means the continuous value fell outside its edges, so the whole
/// group stays zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BinnedRecord<'a> {
    pub sex: &'a str,
    pub bp: &'a str,
    pub cholesterol: &'a str,
    pub age: Option<&'static str>,
    pub na_to_k: Option<&'static str>,
}

impl<'a> BinnedRecord<'a> {
    pub fn from_raw(record: &'a RawRecord) -> Self {
        Self {
            sex: &record.sex,
            bp: &record.bp,
            cholesterol: &record.cholesterol,
            age: AGE_BINS.bucket(f64::from(record.age)),
            na_to_k: NA_TO_K_BINS.bucket(record.na_to_k),
        }
    }

    /// Category per group, aligned with [`ATTRIBUTE_GROUPS`].
    pub fn categories(&self) -> [Option<&'a str>; 5] {
        [
            Some(self.sex),
            Some(self.bp),
            Some(self.cholesterol),
            self.age,
            self.na_to_k,
        ]
    }

    /// Indicator column names this record sets to 1.
    pub fn indicators(&self) -> impl Iterator<Item = String> + 'a {
        ATTRIBUTE_GROUPS
            .into_iter()
            .zip(self.categories())
            .filter_map(|(group, cat)| cat.map(|c| indicator_name(group, c)))
    }
}

pub(crate) fn indicator_name(group: &str, category: &str) -> String {
    format!("{group}_{category}")
}

/// Encoded feature matrix with its labels, one row per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedSplit {
    pub features: Array2<f32>,
    pub labels: Vec<String>,
}

impl EncodedSplit {
    pub fn new(features: Array2<f32>, labels: Vec<String>) -> Self {
        debug_assert_eq!(features.nrows(), labels.len());
        Self { features, labels }
    }

    #[inline]
    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }
}

/// Encode records into a `[n_samples, n_columns]` indicator matrix.
///
/// Without a schema, one is derived from the records: groups in
/// [`ATTRIBUTE_GROUPS`] order, categories within a group in first-seen order.
/// With a schema, the output is projected onto it: schema columns the records
/// never produce are zero, produced columns absent from the schema are
/// dropped, and columns follow schema order.
///
/// Returns the matrix and the schema it conforms to.
pub fn encode<R: AsRef<RawRecord>>(
    records: &[R],
    schema: Option<&FeatureSchema>,
) -> (Array2<f32>, FeatureSchema) {
    let schema = match schema {
        Some(s) => s.clone(),
        None => derive_schema(records),
    };

    let lookup = schema.lookup();
    let mut out = Array2::<f32>::zeros((records.len(), schema.len()));
    let mut dropped = 0usize;
    for (record, row) in records.iter().zip(out.rows_mut()) {
        dropped += fill_row(&BinnedRecord::from_raw(record.as_ref()), &lookup, row);
    }
    if dropped > 0 {
        tracing::debug!(dropped, "indicators outside the schema were dropped");
    }

    (out, schema)
}

/// Encode labelled records, keeping labels aligned with rows.
pub fn encode_labeled(
    records: &[LabeledRecord],
    schema: Option<&FeatureSchema>,
) -> (EncodedSplit, FeatureSchema) {
    let (features, schema) = encode(records, schema);
    let labels = records.iter().map(|r| r.drug.clone()).collect();
    (EncodedSplit::new(features, labels), schema)
}

/// Encode a single record against `schema`.
pub fn encode_record(record: &RawRecord, schema: &FeatureSchema) -> Array1<f32> {
    let lookup = schema.lookup();
    let mut out = Array1::<f32>::zeros(schema.len());
    fill_row(&BinnedRecord::from_raw(record), &lookup, out.view_mut());
    out
}

/// Set the record's indicators in `row`; returns how many were not in the schema.
fn fill_row(
    binned: &BinnedRecord<'_>,
    lookup: &std::collections::HashMap<&str, usize>,
    mut row: ArrayViewMut1<'_, f32>,
) -> usize {
    let mut dropped = 0;
    for name in binned.indicators() {
        match lookup.get(name.as_str()) {
            Some(&j) => row[j] = 1.0,
            None => dropped += 1,
        }
    }
    dropped
}

fn derive_schema<R: AsRef<RawRecord>>(records: &[R]) -> FeatureSchema {
    let binned: Vec<BinnedRecord<'_>> = records
        .iter()
        .map(|r| BinnedRecord::from_raw(r.as_ref()))
        .collect();

    let mut columns = Vec::new();
    for (g, group) in ATTRIBUTE_GROUPS.iter().enumerate() {
        let mut seen: Vec<&str> = Vec::new();
        for record in &binned {
            if let Some(cat) = record.categories()[g] {
                if !seen.contains(&cat) {
                    seen.push(cat);
                }
            }
        }
        columns.extend(seen.into_iter().map(|c| indicator_name(group, c)));
    }
    FeatureSchema::new(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::train_test_split;
    use crate::testing::synthetic_records;
    use proptest::prelude::*;

    fn rec(age: u32, sex: &str, bp: &str, chol: &str, na_to_k: f64) -> RawRecord {
        RawRecord::new(age, sex, bp, chol, na_to_k)
    }

    #[test]
    fn derived_schema_is_group_major_first_seen() {
        let records = vec![
            rec(45, "M", "HIGH", "NORMAL", 15.5),
            rec(23, "F", "LOW", "HIGH", 25.0),
            rec(61, "M", "NORMAL", "HIGH", 8.0),
        ];
        let (x, schema) = encode(&records, None);
        assert_eq!(
            schema.columns(),
            [
                "Sex_M",
                "Sex_F",
                "BP_HIGH",
                "BP_LOW",
                "BP_NORMAL",
                "Cholesterol_NORMAL",
                "Cholesterol_HIGH",
                "Age_binned_40s",
                "Age_binned_20s",
                "Age_binned_60s",
                "Na_to_K_binned_10-20",
                "Na_to_K_binned_20-30",
                "Na_to_K_binned_<10",
            ]
        );
        assert_eq!(x.shape(), &[3, 13]);
        // Every row has exactly five indicators set.
        for row in x.rows() {
            assert_eq!(row.sum(), 5.0);
        }
    }

    #[test]
    fn scenario_b_binning() {
        let record = rec(45, "M", "HIGH", "NORMAL", 15.5);
        let binned = BinnedRecord::from_raw(&record);
        assert_eq!(binned.age, Some("40s"));
        assert_eq!(binned.na_to_k, Some("10-20"));

        let schema = FeatureSchema::new([
            "Age_binned_20s",
            "Age_binned_40s",
            "Na_to_K_binned_<10",
            "Na_to_K_binned_10-20",
        ]);
        let v = encode_record(&record, &schema);
        let age_ones: f32 = schema.group_indices("Age_binned").iter().map(|&i| v[i]).sum();
        let nak_ones: f32 = schema.group_indices("Na_to_K_binned").iter().map(|&i| v[i]).sum();
        assert_eq!(age_ones, 1.0);
        assert_eq!(nak_ones, 1.0);
        assert_eq!(v[1], 1.0);
        assert_eq!(v[3], 1.0);
    }

    #[test]
    fn out_of_range_age_zeroes_group() {
        let train = vec![rec(45, "M", "HIGH", "NORMAL", 15.5), rec(23, "F", "LOW", "HIGH", 25.0)];
        let (_, schema) = encode(&train, None);
        let v = encode_record(&rec(150, "M", "HIGH", "NORMAL", 15.5), &schema);
        assert_eq!(v.len(), schema.len());
        for i in schema.group_indices("Age_binned") {
            assert_eq!(v[i], 0.0);
        }
        assert_eq!(v.sum(), 4.0);
    }

    #[test]
    fn projection_fills_missing_and_drops_extra() {
        let schema = FeatureSchema::new(["BP_LOW", "Sex_F", "Sex_X"]);
        let (x, out_schema) = encode(&[rec(30, "F", "HIGH", "HIGH", 12.0)], Some(&schema));
        assert_eq!(out_schema, schema);
        assert_eq!(x.row(0).to_vec(), vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn encoding_is_deterministic() {
        let records = synthetic_records(120, 3);
        let (a, sa) = encode(&records, None);
        let (b, sb) = encode(&records, None);
        assert_eq!(sa, sb);
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn projected_splits_share_schema(seed in 0u64..500, test_size in 0.1f64..0.9) {
            let records = synthetic_records(60, seed);
            let (train, test) = train_test_split(&records, test_size, seed);
            let (x_train, schema) = encode(&train, None);
            let (x_test, test_schema) = encode(&test, Some(&schema));
            prop_assert_eq!(&test_schema, &schema);
            prop_assert_eq!(x_train.ncols(), schema.len());
            prop_assert_eq!(x_test.ncols(), schema.len());
            prop_assert!(x_test.iter().all(|&v| v == 0.0 || v == 1.0));
        }
    }
}
