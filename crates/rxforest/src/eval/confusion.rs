//! Label-indexed confusion matrix.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// Confusion matrix over string labels.
///
/// Rows are true labels, columns predicted labels; both are indexed by the
/// sorted union of labels seen in either sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    labels: Vec<String>,
    /// `matrix[true][predicted]`
    matrix: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    /// Build from aligned true and predicted labels (extra entries of the
    /// longer slice are ignored).
    pub fn from_labels<S: AsRef<str>>(y_true: &[S], y_pred: &[S]) -> Self {
        let labels: Vec<String> = y_true
            .iter()
            .chain(y_pred)
            .map(|s| s.as_ref())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        let index = |s: &str| labels.binary_search_by(|l| l.as_str().cmp(s)).ok();

        let mut matrix = vec![vec![0usize; labels.len()]; labels.len()];
        for (t, p) in y_true.iter().zip(y_pred) {
            if let (Some(i), Some(j)) = (index(t.as_ref()), index(p.as_ref())) {
                matrix[i][j] += 1;
            }
        }
        Self { labels, matrix }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn n_classes(&self) -> usize {
        self.labels.len()
    }

    pub fn matrix(&self) -> &[Vec<usize>] {
        &self.matrix
    }

    /// Count at `[true_idx][pred_idx]`.
    pub fn get(&self, true_idx: usize, pred_idx: usize) -> usize {
        self.matrix[true_idx][pred_idx]
    }

    /// Count for a (true, predicted) label pair; 0 for unknown labels.
    pub fn count(&self, true_label: &str, predicted: &str) -> usize {
        match (self.index_of(true_label), self.index_of(predicted)) {
            (Some(i), Some(j)) => self.matrix[i][j],
            _ => 0,
        }
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub fn total(&self) -> usize {
        self.matrix.iter().flatten().sum()
    }

    pub fn true_positives(&self, class: usize) -> usize {
        self.matrix[class][class]
    }

    /// Predicted as `class` but was something else.
    pub fn false_positives(&self, class: usize) -> usize {
        (0..self.n_classes())
            .filter(|&i| i != class)
            .map(|i| self.matrix[i][class])
            .sum()
    }

    /// Was `class` but predicted as something else.
    pub fn false_negatives(&self, class: usize) -> usize {
        (0..self.n_classes())
            .filter(|&j| j != class)
            .map(|j| self.matrix[class][j])
            .sum()
    }

    /// Number of true samples of `class`.
    pub fn support(&self, class: usize) -> usize {
        self.matrix[class].iter().sum()
    }

    /// Exact-match fraction; 0 for an empty matrix.
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let correct: usize = (0..self.n_classes()).map(|k| self.matrix[k][k]).sum();
        correct as f64 / total as f64
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .labels
            .iter()
            .map(String::len)
            .max()
            .unwrap_or(0)
            .max(6);
        write!(f, "{:>width$}", "")?;
        for label in &self.labels {
            write!(f, " {label:>width$}")?;
        }
        writeln!(f)?;
        for (label, row) in self.labels.iter().zip(&self.matrix) {
            write!(f, "{label:>width$}")?;
            for count in row {
                write!(f, " {count:>width$}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
