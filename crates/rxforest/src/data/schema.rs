//! Ordered indicator-column schema.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Ordered, de-duplicated indicator column names (`<attribute>_<category>`).
///
/// A schema is fixed when the training split is encoded and persisted with
/// the model. It is never mutated afterwards; retraining replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema {
    columns: Vec<String>,
}

impl FeatureSchema {
    /// Build a schema, keeping the first occurrence of any repeated name.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for name in columns {
            let name = name.into();
            if !out.contains(&name) {
                out.push(name);
            }
        }
        Self { columns: out }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    /// Position of a column, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Indices of the columns belonging to one attribute group.
    pub fn group_indices(&self, attribute: &str) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                c.strip_prefix(attribute)
                    .is_some_and(|rest| rest.starts_with('_'))
            })
            .map(|(i, _)| i)
            .collect()
    }

    pub(crate) fn lookup(&self) -> HashMap<&str, usize> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deduplicates_keeping_first() {
        let schema = FeatureSchema::new(["Sex_F", "Sex_M", "Sex_F", "BP_HIGH"]);
        assert_eq!(schema.columns(), ["Sex_F", "Sex_M", "BP_HIGH"]);
        assert_eq!(schema.index_of("BP_HIGH"), Some(2));
        assert_eq!(schema.index_of("BP_LOW"), None);
    }

    #[test]
    fn group_indices_respect_prefix_boundary() {
        let schema = FeatureSchema::new(["Na_to_K_binned_<10", "BP_LOW", "BPX_1", "BP_HIGH"]);
        assert_eq!(schema.group_indices("BP"), vec![1, 3]);
        assert_eq!(schema.group_indices("Na_to_K_binned"), vec![0]);
    }

    #[test]
    fn serializes_as_plain_list() {
        let schema = FeatureSchema::new(["Sex_F", "Sex_M"]);
        let json = serde_json::to_string(&schema).unwrap();
        assert_eq!(json, r#"["Sex_F","Sex_M"]"#);
        let back: FeatureSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
    }
}
