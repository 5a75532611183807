//! Per-class metrics, weighted averages and the text report.

use serde::Serialize;

use super::confusion::ConfusionMatrix;

/// Precision / recall / F1 / support for one class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Metrics for every class of the matrix, in label order.
///
/// Zero denominators give 0 rather than NaN.
pub fn per_class_metrics(cm: &ConfusionMatrix) -> Vec<ClassMetrics> {
    (0..cm.n_classes())
        .map(|k| {
            let tp = cm.true_positives(k) as f64;
            let predicted = tp + cm.false_positives(k) as f64;
            let support = cm.support(k);
            let precision = ratio(tp, predicted);
            let recall = ratio(tp, support as f64);
            let f1 = ratio(2.0 * precision * recall, precision + recall);
            ClassMetrics {
                label: cm.labels()[k].clone(),
                precision,
                recall,
                f1,
                support,
            }
        })
        .collect()
}

#[inline]
fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 { num / den } else { 0.0 }
}

/// Support-weighted averages of precision, recall and F1.
pub fn weighted_average(metrics: &[ClassMetrics]) -> (f64, f64, f64) {
    let total: usize = metrics.iter().map(|m| m.support).sum();
    if total == 0 {
        return (0.0, 0.0, 0.0);
    }
    let w = |f: fn(&ClassMetrics) -> f64| {
        metrics.iter().map(|m| f(m) * m.support as f64).sum::<f64>() / total as f64
    };
    (w(|m| m.precision), w(|m| m.recall), w(|m| m.f1))
}

/// Unweighted averages of precision, recall and F1.
pub fn macro_average(metrics: &[ClassMetrics]) -> (f64, f64, f64) {
    if metrics.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let n = metrics.len() as f64;
    let m = |f: fn(&ClassMetrics) -> f64| metrics.iter().map(f).sum::<f64>() / n;
    (m(|c| c.precision), m(|c| c.recall), m(|c| c.f1))
}

/// sklearn-style classification report.
pub fn classification_report(cm: &ConfusionMatrix) -> String {
    let metrics = per_class_metrics(cm);
    let width = metrics
        .iter()
        .map(|m| m.label.len())
        .chain(["weighted avg".len()])
        .max()
        .unwrap_or(12);
    let total: usize = metrics.iter().map(|m| m.support).sum();

    let mut report = format!(
        "{:>width$} {:>9} {:>9} {:>9} {:>9}\n\n",
        "", "precision", "recall", "f1-score", "support"
    );
    for m in &metrics {
        report.push_str(&format!(
            "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}\n",
            m.label, m.precision, m.recall, m.f1, m.support
        ));
    }
    report.push('\n');
    report.push_str(&format!(
        "{:>width$} {:>9} {:>9} {:>9.2} {:>9}\n",
        "accuracy",
        "",
        "",
        cm.accuracy(),
        total
    ));
    for (name, (p, r, f)) in [
        ("macro avg", macro_average(&metrics)),
        ("weighted avg", weighted_average(&metrics)),
    ] {
        report.push_str(&format!(
            "{name:>width$} {p:>9.2} {r:>9.2} {f:>9.2} {total:>9}\n"
        ));
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn weighted_metrics_match_hand_computation() {
        // a: tp=2 fp=1 fn=0 support=2 -> p=2/3 r=1 f1=0.8
        // b: tp=1 fp=0 fn=1 support=2 -> p=1 r=0.5 f1=2/3
        let y_true = ["a", "a", "b", "b"];
        let y_pred = ["a", "a", "a", "b"];
        let cm = ConfusionMatrix::from_labels(&y_true, &y_pred);
        let metrics = per_class_metrics(&cm);
        assert_abs_diff_eq!(metrics[0].precision, 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(metrics[0].f1, 0.8, epsilon = 1e-12);
        assert_abs_diff_eq!(metrics[1].recall, 0.5, epsilon = 1e-12);

        let (p, r, f) = weighted_average(&metrics);
        assert_abs_diff_eq!(p, (2.0 / 3.0 + 1.0) / 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(r, 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(f, (0.8 + 2.0 / 3.0) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn predicted_only_label_has_zero_weight() {
        let y_true = ["a", "a"];
        let y_pred = ["a", "z"];
        let cm = ConfusionMatrix::from_labels(&y_true, &y_pred);
        let metrics = per_class_metrics(&cm);
        assert_eq!(metrics[1].label, "z");
        assert_eq!(metrics[1].support, 0);
        assert_eq!(metrics[1].recall, 0.0);
        let (p, r, _) = weighted_average(&metrics);
        assert_abs_diff_eq!(p, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(r, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn report_lists_classes_and_averages() {
        let cm = ConfusionMatrix::from_labels(&["DrugY", "drugX"], &["DrugY", "DrugY"]);
        let report = classification_report(&cm);
        for needle in ["precision", "DrugY", "drugX", "accuracy", "macro avg", "weighted avg"] {
            assert!(report.contains(needle), "missing {needle}:\n{report}");
        }
    }
}
