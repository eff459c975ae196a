//! Segmentation Losses
//!
//! Loss functions on raw logits against binary mask targets. The BCE term
//! uses the numerically stable formulation
//! `max(x, 0) - x * t + ln(1 + e^{-|x|})`; the overlap penalties follow the
//! soft-dice / soft-jaccard form with the negative-log shaping used by the
//! reference segmentation losses.

use burn::tensor::{activation::sigmoid, backend::Backend, Tensor};

use crate::model::config::LossKind;

const EPS: f32 = 1e-7;

/// Weight of the log-overlap term in the combined BCE losses.
const OVERLAP_WEIGHT: f32 = 0.3;

/// Loss function selected by a [`LossKind`] tag.
#[derive(Debug, Clone)]
pub struct SegmentationLoss {
    kind: LossKind,
    /// Focal scaling factor
    alpha: f32,
    /// Focal focusing exponent
    gamma: f32,
}

impl SegmentationLoss {
    pub fn new(kind: LossKind) -> Self {
        Self {
            kind,
            alpha: 10.0,
            gamma: 2.0,
        }
    }

    pub fn kind(&self) -> LossKind {
        self.kind
    }

    /// Compute the scalar loss for a batch.
    ///
    /// `logits` and `targets` both have shape [batch, 1, H, W]; targets are
    /// 0.0/1.0.
    pub fn forward<B: Backend>(
        &self,
        logits: Tensor<B, 4>,
        targets: Tensor<B, 4>,
    ) -> Tensor<B, 1> {
        match self.kind {
            LossKind::Bce => bce_with_logits(logits, targets),
            LossKind::Focal => {
                let focal = focal_term(logits.clone(), targets.clone(), self.gamma);
                let dice = dice_score(logits, targets);
                focal.mul_scalar(self.alpha) - dice.log()
            }
            LossKind::BceDice => {
                let bce = bce_with_logits(logits.clone(), targets.clone());
                let dice = dice_score(logits, targets);
                bce - dice.log().mul_scalar(OVERLAP_WEIGHT)
            }
            LossKind::BceJaccard => {
                let bce = bce_with_logits(logits.clone(), targets.clone());
                let jaccard = jaccard_score(logits, targets);
                bce - jaccard.log().mul_scalar(OVERLAP_WEIGHT)
            }
        }
    }
}

/// Stable elementwise BCE with logits, averaged over the batch.
fn bce_with_logits<B: Backend>(logits: Tensor<B, 4>, targets: Tensor<B, 4>) -> Tensor<B, 1> {
    let max_part = logits.clone().clamp_min(0.0);
    let prod = logits.clone() * targets;
    let softplus = logits.abs().neg().exp().add_scalar(1.0).log();
    (max_part - prod + softplus).mean()
}

/// Soft dice overlap in (0, 1], as a scalar tensor.
fn dice_score<B: Backend>(logits: Tensor<B, 4>, targets: Tensor<B, 4>) -> Tensor<B, 1> {
    let probs = sigmoid(logits);
    let intersection = (probs.clone() * targets.clone()).sum();
    let denom = probs.sum() + targets.sum();
    intersection.mul_scalar(2.0).add_scalar(EPS) / denom.add_scalar(EPS)
}

/// Soft jaccard overlap in (0, 1], as a scalar tensor.
fn jaccard_score<B: Backend>(logits: Tensor<B, 4>, targets: Tensor<B, 4>) -> Tensor<B, 1> {
    let probs = sigmoid(logits);
    let intersection = (probs.clone() * targets.clone()).sum();
    let union = probs.sum() + targets.sum() - intersection.clone();
    intersection.add_scalar(EPS) / union.add_scalar(EPS)
}

/// Mean focal term with the given focusing exponent.
fn focal_term<B: Backend>(logits: Tensor<B, 4>, targets: Tensor<B, 4>, gamma: f32) -> Tensor<B, 1> {
    let probs = sigmoid(logits);
    let pt = probs.clone() * targets.clone()
        + probs.neg().add_scalar(1.0) * targets.neg().add_scalar(1.0);
    let modulation = pt.clone().neg().add_scalar(1.0).powf_scalar(gamma);
    (modulation * pt.add_scalar(EPS).log().neg()).mean()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray;

    fn tensors(
        logit_values: Vec<f32>,
        target_values: Vec<f32>,
    ) -> (Tensor<TestBackend, 4>, Tensor<TestBackend, 4>) {
        let device = Default::default();
        let n = logit_values.len();
        let logits = Tensor::from_floats(TensorData::new(logit_values, [1, 1, 1, n]), &device);
        let targets = Tensor::from_floats(TensorData::new(target_values, [1, 1, 1, n]), &device);
        (logits, targets)
    }

    fn scalar(t: Tensor<TestBackend, 1>) -> f32 {
        t.into_data().to_vec::<f32>().unwrap()[0]
    }

    #[test]
    fn test_bce_confident_correct_is_small() {
        let (logits, targets) = tensors(vec![8.0, -8.0, 8.0], vec![1.0, 0.0, 1.0]);
        let loss = scalar(SegmentationLoss::new(LossKind::Bce).forward(logits, targets));
        assert!(loss < 0.01, "loss was {}", loss);
    }

    #[test]
    fn test_bce_confident_wrong_is_large() {
        let (logits, targets) = tensors(vec![8.0, -8.0], vec![0.0, 1.0]);
        let loss = scalar(SegmentationLoss::new(LossKind::Bce).forward(logits, targets));
        assert!(loss > 4.0, "loss was {}", loss);
    }

    #[test]
    fn test_all_kinds_finite_and_positive() {
        for kind in LossKind::ALL {
            let (logits, targets) = tensors(vec![1.0, -0.5, 0.25, -2.0], vec![1.0, 0.0, 1.0, 0.0]);
            let loss = scalar(SegmentationLoss::new(*kind).forward(logits, targets));
            assert!(loss.is_finite(), "{:?} not finite", kind);
            assert!(loss > 0.0, "{:?} not positive: {}", kind, loss);
        }
    }

    #[test]
    fn test_overlap_losses_prefer_better_predictions() {
        for kind in [LossKind::BceDice, LossKind::BceJaccard, LossKind::Focal] {
            let (good_logits, targets) = tensors(vec![6.0, -6.0, 6.0, -6.0], vec![1.0, 0.0, 1.0, 0.0]);
            let good = scalar(SegmentationLoss::new(kind).forward(good_logits, targets));

            let (bad_logits, targets) = tensors(vec![-6.0, 6.0, -6.0, 6.0], vec![1.0, 0.0, 1.0, 0.0]);
            let bad = scalar(SegmentationLoss::new(kind).forward(bad_logits, targets));

            assert!(good < bad, "{:?}: good {} >= bad {}", kind, good, bad);
        }
    }

    #[test]
    fn test_dice_score_perfect_overlap() {
        let (logits, targets) = tensors(vec![10.0, 10.0, -10.0], vec![1.0, 1.0, 0.0]);
        let dice = scalar(dice_score(logits, targets));
        assert!((dice - 1.0).abs() < 1e-3, "dice was {}", dice);
    }
}
