//! CSV ingestion.
//!
//! Columns are matched by header name, so any column order is accepted.
//! Extra columns are ignored.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use serde::Deserialize;
use thiserror::Error;

use super::record::{LabeledRecord, RawRecord};

/// Header names every dataset must provide. `Drug` is the label.
pub const REQUIRED_COLUMNS: [&str; 6] = ["Age", "Sex", "BP", "Cholesterol", "Na_to_K", "Drug"];

/// Errors raised while loading a dataset.
#[derive(Debug, Error)]
pub enum DataLoadError {
    #[error("dataset not found: {origin}")]
    NotFound { origin: String },

    #[error("failed to read dataset {origin}: {source}")]
    Io {
        origin: String,
        #[source]
        source: std::io::Error,
    },

    #[error("dataset {origin} is missing required column `{column}`")]
    MissingColumn { origin: String, column: &'static str },

    #[error("malformed row at line {line} of {origin}: {message}")]
    Malformed {
        origin: String,
        line: u64,
        message: String,
    },

    #[error("dataset {origin} contains no rows")]
    Empty { origin: String },
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Age")]
    age: u32,
    #[serde(rename = "Sex")]
    sex: String,
    #[serde(rename = "BP")]
    bp: String,
    #[serde(rename = "Cholesterol")]
    cholesterol: String,
    #[serde(rename = "Na_to_K")]
    na_to_k: f64,
    #[serde(rename = "Drug")]
    drug: String,
}

impl From<CsvRow> for LabeledRecord {
    fn from(row: CsvRow) -> Self {
        LabeledRecord::new(
            RawRecord::new(row.age, row.sex, row.bp, row.cholesterol, row.na_to_k),
            row.drug,
        )
    }
}

/// Load a labeled dataset from a CSV file.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<LabeledRecord>, DataLoadError> {
    let path = path.as_ref();
    let origin = path.display().to_string();
    let file = File::open(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            DataLoadError::NotFound {
                origin: origin.clone(),
            }
        } else {
            DataLoadError::Io {
                origin: origin.clone(),
                source,
            }
        }
    })?;
    let records = read_csv(file, &origin)?;
    tracing::info!(path = %origin, rows = records.len(), "loaded dataset");
    Ok(records)
}

/// Read a labeled dataset from any reader. `origin` names the source in errors.
pub fn read_csv<R: Read>(reader: R, origin: &str) -> Result<Vec<LabeledRecord>, DataLoadError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| csv_error(origin, e))?
        .clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(DataLoadError::MissingColumn {
                origin: origin.to_string(),
                column,
            });
        }
    }

    let mut records = Vec::new();
    for row in reader.deserialize::<CsvRow>() {
        let row = row.map_err(|e| csv_error(origin, e))?;
        records.push(LabeledRecord::from(row));
    }

    if records.is_empty() {
        return Err(DataLoadError::Empty {
            origin: origin.to_string(),
        });
    }
    Ok(records)
}

fn csv_error(origin: &str, err: csv::Error) -> DataLoadError {
    let line = err.position().map_or(0, |p| p.line());
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(source) => DataLoadError::Io {
            origin: origin.to_string(),
            source,
        },
        _ => DataLoadError::Malformed {
            origin: origin.to_string(),
            line,
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Age,Sex,BP,Cholesterol,Na_to_K,Drug
23,F,HIGH,HIGH,25.355,DrugY
47,M,LOW,HIGH,13.093,drugC
";

    #[test]
    fn reads_rows_in_file_order() {
        let records = read_csv(SAMPLE.as_bytes(), "sample").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].record, RawRecord::new(23, "F", "HIGH", "HIGH", 25.355));
        assert_eq!(records[0].drug, "DrugY");
        assert_eq!(records[1].drug, "drugC");
    }

    #[test]
    fn column_order_is_irrelevant() {
        let permuted = "\
Drug,Na_to_K,Cholesterol,BP,Sex,Age
DrugY,25.355,HIGH,HIGH,F,23
drugC,13.093,HIGH,LOW,M,47
";
        let a = read_csv(SAMPLE.as_bytes(), "a").unwrap();
        let b = read_csv(permuted.as_bytes(), "b").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_label_column_is_rejected() {
        let data = "Age,Sex,BP,Cholesterol,Na_to_K\n23,F,HIGH,HIGH,25.3\n";
        let err = read_csv(data.as_bytes(), "nolabel").unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::MissingColumn { column: "Drug", .. }
        ));
    }

    #[test]
    fn malformed_age_reports_line() {
        let data = "Age,Sex,BP,Cholesterol,Na_to_K,Drug\nold,F,HIGH,HIGH,25.3,DrugY\n";
        let err = read_csv(data.as_bytes(), "bad").unwrap_err();
        assert!(matches!(err, DataLoadError::Malformed { line: 2, .. }));
    }

    #[test]
    fn header_only_is_empty() {
        let data = "Age,Sex,BP,Cholesterol,Na_to_K,Drug\n";
        let err = read_csv(data.as_bytes(), "empty").unwrap_err();
        assert!(matches!(err, DataLoadError::Empty { .. }));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_csv(dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, DataLoadError::NotFound { .. }));
    }
}
