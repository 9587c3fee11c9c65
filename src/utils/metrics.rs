//! Metrics Module for Model Evaluation
//!
//! Accuracy, per-class precision / recall / F1 and a confusion matrix for the
//! three leaf conditions.

use serde::{Deserialize, Serialize};

/// Per-class metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub class_idx: usize,
    pub class_name: Option<String>,
    /// Precision = TP / (TP + FP)
    pub precision: f64,
    /// Recall = TP / (TP + FN)
    pub recall: f64,
    pub f1: f64,
    /// Number of actual samples of this class
    pub support: usize,
}

impl ClassMetrics {
    /// Derive the metrics of one class from a confusion matrix
    pub fn from_confusion_matrix(cm: &ConfusionMatrix, class_idx: usize) -> Self {
        let true_positives = cm.get(class_idx, class_idx);

        let predicted: usize = (0..cm.num_classes).map(|row| cm.get(row, class_idx)).sum();
        let support: usize = (0..cm.num_classes).map(|col| cm.get(class_idx, col)).sum();

        let precision = ratio(true_positives, predicted);
        let recall = ratio(true_positives, support);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            class_idx,
            class_name: None,
            precision,
            recall,
            f1,
            support,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.class_name = Some(name.to_string());
        self
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Confusion matrix, row = actual, column = predicted, row-major storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub num_classes: usize,
    pub matrix: Vec<usize>,
}

impl ConfusionMatrix {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            matrix: vec![0; num_classes * num_classes],
        }
    }

    /// Build from parallel prediction / ground-truth slices
    pub fn from_predictions(predictions: &[usize], ground_truth: &[usize], num_classes: usize) -> Self {
        let mut cm = Self::new(num_classes);
        for (&pred, &actual) in predictions.iter().zip(ground_truth.iter()) {
            cm.add(actual, pred);
        }
        cm
    }

    /// Record a single prediction; out-of-range labels are ignored
    pub fn add(&mut self, actual: usize, predicted: usize) {
        if actual < self.num_classes && predicted < self.num_classes {
            self.matrix[actual * self.num_classes + predicted] += 1;
        }
    }

    pub fn get(&self, actual: usize, predicted: usize) -> usize {
        if actual < self.num_classes && predicted < self.num_classes {
            self.matrix[actual * self.num_classes + predicted]
        } else {
            0
        }
    }

    pub fn total(&self) -> usize {
        self.matrix.iter().sum()
    }

    /// Diagonal sum
    pub fn correct(&self) -> usize {
        (0..self.num_classes).map(|i| self.get(i, i)).sum()
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.correct(), self.total())
    }

    /// Render as a plain-text table with class names as headers
    pub fn display(&self, class_names: &[String]) -> String {
        let name = |i: usize| -> String {
            class_names
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("class {}", i))
        };
        let width = (0..self.num_classes)
            .map(|i| name(i).len())
            .max()
            .unwrap_or(8)
            .max(8);

        let mut output = format!("{:>width$} |", "actual \\ predicted", width = width + 12);
        for col in 0..self.num_classes {
            output.push_str(&format!(" {:>width$}", name(col), width = width));
        }
        output.push('\n');

        for row in 0..self.num_classes {
            output.push_str(&format!("{:>width$} |", name(row), width = width + 12));
            for col in 0..self.num_classes {
                output.push_str(&format!(" {:>width$}", self.get(row, col), width = width));
            }
            output.push('\n');
        }

        output
    }
}

/// Classification metrics over one evaluation pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub total_samples: usize,
    pub correct_predictions: usize,
    pub accuracy: f64,
    pub macro_f1: f64,
    pub per_class: Vec<ClassMetrics>,
    pub confusion_matrix: ConfusionMatrix,
}

impl Metrics {
    /// Compute metrics from predictions and ground truth labels
    pub fn from_predictions(predictions: &[usize], ground_truth: &[usize], class_names: &[String]) -> Self {
        let num_classes = class_names.len();
        let confusion_matrix = ConfusionMatrix::from_predictions(predictions, ground_truth, num_classes);

        let per_class: Vec<ClassMetrics> = class_names
            .iter()
            .enumerate()
            .map(|(idx, name)| ClassMetrics::from_confusion_matrix(&confusion_matrix, idx).with_name(name))
            .collect();

        let present: Vec<&ClassMetrics> = per_class.iter().filter(|m| m.support > 0).collect();
        let macro_f1 = if present.is_empty() {
            0.0
        } else {
            present.iter().map(|m| m.f1).sum::<f64>() / present.len() as f64
        };

        Self {
            total_samples: confusion_matrix.total(),
            correct_predictions: confusion_matrix.correct(),
            accuracy: confusion_matrix.accuracy(),
            macro_f1,
            per_class,
            confusion_matrix,
        }
    }

    /// Per-class report followed by the confusion matrix
    pub fn display(&self, class_names: &[String]) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "Accuracy: {:.2}% ({}/{}) | Macro F1: {:.2}%\n",
            self.accuracy * 100.0,
            self.correct_predictions,
            self.total_samples,
            self.macro_f1 * 100.0
        ));
        for m in &self.per_class {
            output.push_str(&format!(
                "  {:<28} precision {:6.2}%  recall {:6.2}%  f1 {:6.2}%  support {}\n",
                m.class_name.as_deref().unwrap_or("?"),
                m.precision * 100.0,
                m.recall * 100.0,
                m.f1 * 100.0,
                m.support
            ));
        }
        output.push('\n');
        output.push_str(&self.confusion_matrix.display(class_names));
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec![
            "Potato___Early_blight".to_string(),
            "Potato___Late_blight".to_string(),
            "Potato___healthy".to_string(),
        ]
    }

    #[test]
    fn test_confusion_matrix_counts() {
        let predictions = vec![0, 1, 2, 2, 1];
        let ground_truth = vec![0, 1, 2, 1, 0];
        let cm = ConfusionMatrix::from_predictions(&predictions, &ground_truth, 3);

        assert_eq!(cm.total(), 5);
        assert_eq!(cm.correct(), 3);
        assert_eq!(cm.get(1, 2), 1);
        assert_eq!(cm.get(0, 1), 1);
        assert!((cm.accuracy() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_labels_ignored() {
        let mut cm = ConfusionMatrix::new(3);
        cm.add(5, 0);
        cm.add(0, 7);
        assert_eq!(cm.total(), 0);
    }

    #[test]
    fn test_class_metrics() {
        // class 0: TP=2, FP=1, FN=0
        let predictions = vec![0, 0, 0, 1];
        let ground_truth = vec![0, 0, 1, 1];
        let cm = ConfusionMatrix::from_predictions(&predictions, &ground_truth, 3);

        let m0 = ClassMetrics::from_confusion_matrix(&cm, 0);
        assert!((m0.precision - 2.0 / 3.0).abs() < 1e-9);
        assert!((m0.recall - 1.0).abs() < 1e-9);
        assert_eq!(m0.support, 2);

        let m2 = ClassMetrics::from_confusion_matrix(&cm, 2);
        assert_eq!(m2.support, 0);
        assert_eq!(m2.f1, 0.0);
    }

    #[test]
    fn test_metrics_perfect() {
        let labels = vec![0, 1, 2, 0, 1, 2];
        let metrics = Metrics::from_predictions(&labels, &labels, &names());

        assert_eq!(metrics.accuracy, 1.0);
        assert_eq!(metrics.macro_f1, 1.0);
        assert_eq!(metrics.per_class.len(), 3);
        assert_eq!(
            metrics.per_class[2].class_name.as_deref(),
            Some("Potato___healthy")
        );
    }

    #[test]
    fn test_display_contains_class_names() {
        let labels = vec![0, 1, 2];
        let metrics = Metrics::from_predictions(&labels, &labels, &names());
        let text = metrics.display(&names());
        assert!(text.contains("Potato___Late_blight"));
        assert!(text.contains("100.00%"));
    }
}
