/// Binary logistic loss on raw margins
///
/// Positive rows are weighted by `scale_pos_weight`; 1.0 gives the plain
/// log-likelihood.
#[derive(Clone, Copy, Debug)]
pub struct LogisticLoss {
    scale_pos_weight: f64,
}

impl LogisticLoss {
    pub fn new(scale_pos_weight: f64) -> Self {
        Self { scale_pos_weight }
    }

    fn weight(&self, label: u8) -> f64 {
        if label == 1 {
            self.scale_pos_weight
        } else {
            1.0
        }
    }

    /// First and second derivatives of the loss for each row
    pub fn gradients(&self, margins: &[f64], labels: &[u8]) -> (Vec<f64>, Vec<f64>) {
        margins
            .iter()
            .zip(labels)
            .map(|(&margin, &label)| {
                let p = sigmoid(margin);
                let w = self.weight(label);
                let grad = (p - f64::from(label)) * w;
                let hess = (p * (1.0 - p)).max(1e-16) * w;
                (grad, hess)
            })
            .unzip()
    }

    /// Initial margin: log-odds of the weighted positive rate
    pub fn base_margin(&self, labels: &[u8]) -> f64 {
        let (pos, total) = labels.iter().fold((0.0, 0.0), |(pos, total), &label| {
            let w = self.weight(label);
            (pos + w * f64::from(label), total + w)
        });
        if total == 0.0 {
            return 0.0;
        }
        let p = (pos / total).clamp(1e-6, 1.0 - 1e-6);
        (p / (1.0 - p)).ln()
    }
}

/// Logistic function
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Metrics for evaluation
pub mod metrics {
    /// Area under the precision-recall curve as average precision
    ///
    /// Precision is evaluated at every distinct score threshold and weighted by
    /// the recall gained there (step interpolation). `None` when there are no
    /// positive labels.
    pub fn average_precision(labels: &[u8], scores: &[f64]) -> Option<f64> {
        let total_pos = labels.iter().filter(|&&y| y == 1).count();
        if total_pos == 0 || labels.len() != scores.len() {
            return None;
        }

        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

        let mut ap = 0.0;
        let mut tp = 0usize;
        let mut fp = 0usize;
        let mut prev_recall = 0.0;

        for (rank, &i) in order.iter().enumerate() {
            if labels[i] == 1 {
                tp += 1;
            } else {
                fp += 1;
            }
            let last_of_threshold = order
                .get(rank + 1)
                .map_or(true, |&next| scores[next] != scores[i]);
            if last_of_threshold {
                let precision = tp as f64 / (tp + fp) as f64;
                let recall = tp as f64 / total_pos as f64;
                ap += (recall - prev_recall) * precision;
                prev_recall = recall;
            }
        }

        Some(ap)
    }

    /// Mean binary cross-entropy of probabilities
    pub fn log_loss(labels: &[u8], probabilities: &[f64]) -> f64 {
        if labels.is_empty() {
            return 0.0;
        }
        let eps = 1e-15;
        let total: f64 = labels
            .iter()
            .zip(probabilities)
            .map(|(&y, &p)| {
                let p = p.clamp(eps, 1.0 - eps);
                if y == 1 {
                    -p.ln()
                } else {
                    -(1.0 - p).ln()
                }
            })
            .sum();
        total / labels.len() as f64
    }

    /// Confusion counts at a probability threshold: (tp, fp, tn, fn)
    pub fn confusion(labels: &[u8], probabilities: &[f64], threshold: f64) -> (usize, usize, usize, usize) {
        labels
            .iter()
            .zip(probabilities)
            .fold((0, 0, 0, 0), |(tp, fp, tn, fn_), (&y, &p)| {
                match (p >= threshold, y == 1) {
                    (true, true) => (tp + 1, fp, tn, fn_),
                    (true, false) => (tp, fp + 1, tn, fn_),
                    (false, false) => (tp, fp, tn + 1, fn_),
                    (false, true) => (tp, fp, tn, fn_ + 1),
                }
            })
    }

    /// Compute accuracy
    pub fn accuracy(labels: &[u8], probabilities: &[f64], threshold: f64) -> f64 {
        let (tp, fp, tn, fn_) = confusion(labels, probabilities, threshold);
        let total = tp + fp + tn + fn_;
        if total > 0 {
            (tp + tn) as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Compute precision
    pub fn precision(labels: &[u8], probabilities: &[f64], threshold: f64) -> f64 {
        let (tp, fp, _, _) = confusion(labels, probabilities, threshold);
        if tp + fp > 0 {
            tp as f64 / (tp + fp) as f64
        } else {
            0.0
        }
    }

    /// Compute recall
    pub fn recall(labels: &[u8], probabilities: &[f64], threshold: f64) -> f64 {
        let (tp, _, _, fn_) = confusion(labels, probabilities, threshold);
        if tp + fn_ > 0 {
            tp as f64 / (tp + fn_) as f64
        } else {
            0.0
        }
    }

    /// Compute F1 score
    pub fn f1_score(labels: &[u8], probabilities: &[f64], threshold: f64) -> f64 {
        let p = precision(labels, probabilities, threshold);
        let r = recall(labels, probabilities, threshold);
        if p + r > 0.0 {
            2.0 * p * r / (p + r)
        } else {
            0.0
        }
    }
}
