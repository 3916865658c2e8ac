use linfa::Label;
use linfa::metrics::ConfusionMatrix;
use serde::{Deserialize, Serialize};

/// Classification scores for one held-out evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    /// Micro-averaged precision.
    pub precision: f64,
    /// Micro-averaged recall.
    pub recall: f64,
    /// Micro-averaged F1.
    pub f1: f64,
    /// Number of evaluated samples.
    pub support: usize,
}

impl ClassificationMetrics {
    /// Micro-averaged scores from a confusion matrix over `support` samples.
    ///
    /// Each sample carries exactly one label, so pooled false positives and
    /// false negatives both equal the misclassified count and micro precision,
    /// recall, and F1 coincide with accuracy.
    pub fn micro_averaged<L: Label>(matrix: &ConfusionMatrix<L>, support: usize) -> Self {
        let accuracy = f64::from(matrix.accuracy());
        Self {
            accuracy,
            precision: accuracy,
            recall: accuracy,
            f1: accuracy,
            support,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linfa::metrics::ToConfusionMatrix;
    use ndarray::ArrayView1;

    #[test]
    fn perfect_predictions_score_one() {
        let predicted = ArrayView1::from(&[0usize, 1, 1, 0]);
        let truth = ArrayView1::from(&[0usize, 1, 1, 0]);
        let matrix = predicted.confusion_matrix(truth).unwrap();
        let metrics = ClassificationMetrics::micro_averaged(&matrix, 4);
        assert_eq!(metrics.accuracy, 1.0);
        assert_eq!(metrics.f1, 1.0);
        assert_eq!(metrics.support, 4);
    }

    #[test]
    fn micro_scores_match_accuracy_for_single_label_data() {
        let predicted = ArrayView1::from(&[0usize, 1, 1, 0, 1]);
        let truth = ArrayView1::from(&[0usize, 0, 1, 1, 1]);
        let matrix = predicted.confusion_matrix(truth).unwrap();
        let metrics = ClassificationMetrics::micro_averaged(&matrix, 5);
        assert!((metrics.accuracy - 0.6).abs() < 1e-6);
        assert_eq!(metrics.precision, metrics.accuracy);
        assert_eq!(metrics.recall, metrics.accuracy);
        assert_eq!(metrics.f1, metrics.accuracy);
    }
}
