//! Fixed-edge binning of continuous attributes.

/// A named set of ordered bucket edges.
///
/// Buckets are right-closed `(edges[i], edges[i + 1]]`, except the first one
/// which also includes its lower edge. Values below the first edge, above the
/// last edge, or NaN fall into no bucket.
#[derive(Debug, Clone, Copy)]
pub struct Binning {
    /// Attribute prefix used for indicator columns (e.g. `Age_binned`).
    pub attribute: &'static str,
    pub edges: &'static [f64],
    /// One label per bucket; `labels.len() == edges.len() - 1`.
    pub labels: &'static [&'static str],
}

/// Age buckets.
pub const AGE_BINS: Binning = Binning {
    attribute: "Age_binned",
    edges: &[0.0, 19.0, 29.0, 39.0, 49.0, 59.0, 69.0, 80.0],
    labels: &["<20s", "20s", "30s", "40s", "50s", "60s", ">60s"],
};

/// Sodium-to-potassium ratio buckets.
pub const NA_TO_K_BINS: Binning = Binning {
    attribute: "Na_to_K_binned",
    edges: &[0.0, 9.0, 19.0, 29.0, 50.0],
    labels: &["<10", "10-20", "20-30", ">30"],
};

impl Binning {
    /// Bucket label for `value`, or `None` when it lies outside the edges.
    pub fn bucket(&self, value: f64) -> Option<&'static str> {
        let (&lo, &hi) = (self.edges.first()?, self.edges.last()?);
        if value.is_nan() || value < lo || value > hi {
            return None;
        }
        // Count of upper edges strictly below the value is the bucket index.
        let idx = self.edges[1..].partition_point(|&edge| edge < value);
        self.labels.get(idx).copied()
    }

    /// Number of buckets.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
