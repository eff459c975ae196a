//! Segmentation Metrics
//!
//! Dice and Jaccard (IoU) scores collected batch by batch during validation.
//! Predictions are thresholded probabilities, targets binary masks, both as
//! flat slices of equal length.

use serde::{Deserialize, Serialize};

const EPS: f64 = 1e-7;

/// Accumulates per-batch overlap scores and averages them on demand.
#[derive(Debug, Clone, Default)]
pub struct SegmentationMetrics {
    dice_sum: f64,
    jaccard_sum: f64,
    batches: usize,
    threshold: f32,
}

impl SegmentationMetrics {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            ..Default::default()
        }
    }

    /// Collect one batch of probabilities against its targets.
    pub fn collect(&mut self, probabilities: &[f32], targets: &[f32]) {
        debug_assert_eq!(probabilities.len(), targets.len());

        let mut intersection = 0u64;
        let mut pred_count = 0u64;
        let mut target_count = 0u64;

        for (&p, &t) in probabilities.iter().zip(targets) {
            let p = p > self.threshold;
            let t = t > 0.5;
            if p {
                pred_count += 1;
            }
            if t {
                target_count += 1;
            }
            if p && t {
                intersection += 1;
            }
        }

        let union = pred_count + target_count - intersection;
        self.dice_sum +=
            (2.0 * intersection as f64 + EPS) / ((pred_count + target_count) as f64 + EPS);
        self.jaccard_sum += (intersection as f64 + EPS) / (union as f64 + EPS);
        self.batches += 1;
    }

    /// Average scores over all collected batches.
    pub fn get(&self) -> MetricsSummary {
        let n = self.batches.max(1) as f64;
        MetricsSummary {
            dice: self.dice_sum / n,
            jaccard: self.jaccard_sum / n,
            batches: self.batches,
        }
    }
}

/// Averaged validation scores.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MetricsSummary {
    pub dice: f64,
    pub jaccard: f64,
    pub batches: usize,
}
