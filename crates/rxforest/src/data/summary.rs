//! Dataset exploration summary.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::record::LabeledRecord;

/// Min / max / mean / standard deviation of a numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NumericSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
}

impl NumericSummary {
    fn from_values(values: impl Iterator<Item = f64> + Clone) -> Option<Self> {
        let n = values.clone().count();
        if n == 0 {
            return None;
        }
        let (mut min, mut max, mut sum) = (f64::INFINITY, f64::NEG_INFINITY, 0.0);
        for v in values.clone() {
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }
        let mean = sum / n as f64;
        // Sample standard deviation, matching the usual `describe()` output.
        let std = if n > 1 {
            let ss: f64 = values.map(|v| (v - mean).powi(2)).sum();
            (ss / (n - 1) as f64).sqrt()
        } else {
            0.0
        };
        Some(Self { min, max, mean, std })
    }
}

/// Overview of a labeled dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub n_rows: usize,
    pub age: Option<NumericSummary>,
    pub na_to_k: Option<NumericSummary>,
    /// Value counts per categorical attribute, most frequent first.
    pub categories: BTreeMap<&'static str, Vec<(String, usize)>>,
    /// Label counts, most frequent first.
    pub class_counts: Vec<(String, usize)>,
}

impl DatasetSummary {
    pub fn from_records(records: &[LabeledRecord]) -> Self {
        let mut categories = BTreeMap::new();
        categories.insert("Sex", value_counts(records.iter().map(|r| r.record.sex.as_str())));
        categories.insert("BP", value_counts(records.iter().map(|r| r.record.bp.as_str())));
        categories.insert(
            "Cholesterol",
            value_counts(records.iter().map(|r| r.record.cholesterol.as_str())),
        );

        Self {
            n_rows: records.len(),
            age: NumericSummary::from_values(records.iter().map(|r| f64::from(r.record.age))),
            na_to_k: NumericSummary::from_values(records.iter().map(|r| r.record.na_to_k)),
            categories,
            class_counts: value_counts(records.iter().map(|r| r.drug.as_str())),
        }
    }
}

/// Counts sorted by descending frequency, ties broken by value.
fn value_counts<'a>(values: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_default() += 1;
    }
    let mut out: Vec<(String, usize)> = counts.into_iter().map(|(k, c)| (k.to_string(), c)).collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "rows: {}", self.n_rows)?;
        for (name, stats) in [("Age", &self.age), ("Na_to_K", &self.na_to_k)] {
            if let Some(s) = stats {
                writeln!(
                    f,
                    "{name:<12} min {:>8.3}  max {:>8.3}  mean {:>8.3}  std {:>8.3}",
                    s.min, s.max, s.mean, s.std
                )?;
            }
        }
        for (name, counts) in &self.categories {
            let parts: Vec<String> = counts.iter().map(|(v, c)| format!("{v}={c}")).collect();
            writeln!(f, "{name:<12} {}", parts.join(", "))?;
        }
        writeln!(f, "class distribution:")?;
        for (label, count) in &self.class_counts {
            writeln!(f, "  {label:<10} {count}")?;
        }
        Ok(())
    }
}
