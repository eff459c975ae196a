//! Paired Geometric Transforms
//!
//! Augmentations that must hit an image and its mask with the exact same
//! spatial mapping: one crop offset, one flip decision, applied to both.
//! Images are (height, width, channels) float arrays, masks are
//! (height, width, 1); every transform preserves the invariant that the two
//! spatial shapes agree before and after application.

use ndarray::{s, Array3};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::utils::error::{Result, ShipSegError};

/// A paired sample flowing through the pipeline.
pub type Pair = (Array3<f32>, Array3<f32>);

fn check_aligned(image: &Array3<f32>, mask: &Array3<f32>) -> Result<()> {
    let (ih, iw, _) = image.dim();
    let (mh, mw, _) = mask.dim();
    if (ih, iw) != (mh, mw) {
        return Err(ShipSegError::ShapeMismatch {
            expected: format!("({}, {})", ih, iw),
            actual: format!("({}, {})", mh, mw),
        });
    }
    Ok(())
}

/// A transform applied identically to an image and its mask.
pub trait PairedTransform: Send + Sync {
    fn apply(&self, image: Array3<f32>, mask: Array3<f32>, rng: &mut ChaCha8Rng) -> Result<Pair>;
}

/// Ordered sequence of paired transforms, applied left-to-right.
///
/// An empty pipeline is the identity.
#[derive(Default)]
pub struct DualCompose {
    transforms: Vec<Box<dyn PairedTransform>>,
}

impl DualCompose {
    pub fn new(transforms: Vec<Box<dyn PairedTransform>>) -> Self {
        Self { transforms }
    }

    pub fn apply(
        &self,
        mut image: Array3<f32>,
        mut mask: Array3<f32>,
        rng: &mut ChaCha8Rng,
    ) -> Result<Pair> {
        for transform in &self.transforms {
            let (i, m) = transform.apply(image, mask, rng)?;
            image = i;
            mask = m;
        }
        Ok((image, mask))
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

fn crop_pair(image: &Array3<f32>, mask: &Array3<f32>, y: usize, x: usize, h: usize, w: usize) -> Pair {
    let image = image.slice(s![y..y + h, x..x + w, ..]).to_owned();
    let mask = mask.slice(s![y..y + h, x..x + w, ..]).to_owned();
    (image, mask)
}

/// Crop at an offset drawn uniformly from the valid range, the same offset
/// for image and mask.
///
/// Fails with a shape mismatch when the source is smaller than the crop;
/// padding is never substituted.
pub struct RandomCrop {
    height: usize,
    width: usize,
    channels: usize,
}

impl RandomCrop {
    pub fn new(size: (usize, usize, usize)) -> Self {
        Self {
            height: size.0,
            width: size.1,
            channels: size.2,
        }
    }

    fn check_source(&self, image: &Array3<f32>) -> Result<()> {
        let (h, w, c) = image.dim();
        if h < self.height || w < self.width || c != self.channels {
            return Err(ShipSegError::ShapeMismatch {
                expected: format!("at least ({}, {}, {})", self.height, self.width, self.channels),
                actual: format!("({}, {}, {})", h, w, c),
            });
        }
        Ok(())
    }
}

impl PairedTransform for RandomCrop {
    fn apply(&self, image: Array3<f32>, mask: Array3<f32>, rng: &mut ChaCha8Rng) -> Result<Pair> {
        check_aligned(&image, &mask)?;
        self.check_source(&image)?;

        let (h, w, _) = image.dim();
        let y = rng.gen_range(0..=h - self.height);
        let x = rng.gen_range(0..=w - self.width);
        Ok(crop_pair(&image, &mask, y, x, self.height, self.width))
    }
}

/// Deterministic centered crop; the validation counterpart of [`RandomCrop`].
pub struct CenterCrop {
    height: usize,
    width: usize,
    channels: usize,
}

impl CenterCrop {
    pub fn new(size: (usize, usize, usize)) -> Self {
        Self {
            height: size.0,
            width: size.1,
            channels: size.2,
        }
    }
}

impl PairedTransform for CenterCrop {
    fn apply(&self, image: Array3<f32>, mask: Array3<f32>, _rng: &mut ChaCha8Rng) -> Result<Pair> {
        check_aligned(&image, &mask)?;

        let (h, w, c) = image.dim();
        if h < self.height || w < self.width || c != self.channels {
            return Err(ShipSegError::ShapeMismatch {
                expected: format!("at least ({}, {}, {})", self.height, self.width, self.channels),
                actual: format!("({}, {}, {})", h, w, c),
            });
        }

        let y = (h - self.height) / 2;
        let x = (w - self.width) / 2;
        Ok(crop_pair(&image, &mask, y, x, self.height, self.width))
    }
}

fn flip_axis(array: &Array3<f32>, axis: usize) -> Array3<f32> {
    match axis {
        0 => array.slice(s![..;-1, .., ..]).to_owned(),
        _ => array.slice(s![.., ..;-1, ..]).to_owned(),
    }
}

/// Mirror both image and mask across the vertical axis with the given
/// probability; pass through otherwise.
pub struct HorizontalFlip {
    probability: f64,
}

impl HorizontalFlip {
    pub fn new(probability: f64) -> Self {
        Self { probability }
    }
}

impl Default for HorizontalFlip {
    fn default() -> Self {
        Self { probability: 0.5 }
    }
}

impl PairedTransform for HorizontalFlip {
    fn apply(&self, image: Array3<f32>, mask: Array3<f32>, rng: &mut ChaCha8Rng) -> Result<Pair> {
        check_aligned(&image, &mask)?;
        if rng.gen::<f64>() < self.probability {
            Ok((flip_axis(&image, 1), flip_axis(&mask, 1)))
        } else {
            Ok((image, mask))
        }
    }
}

/// Mirror both image and mask across the horizontal axis with the given
/// probability; pass through otherwise.
pub struct VerticalFlip {
    probability: f64,
}

impl VerticalFlip {
    pub fn new(probability: f64) -> Self {
        Self { probability }
    }
}

impl Default for VerticalFlip {
    fn default() -> Self {
        Self { probability: 0.5 }
    }
}

impl PairedTransform for VerticalFlip {
    fn apply(&self, image: Array3<f32>, mask: Array3<f32>, rng: &mut ChaCha8Rng) -> Result<Pair> {
        check_aligned(&image, &mask)?;
        if rng.gen::<f64>() < self.probability {
            Ok((flip_axis(&image, 0), flip_axis(&mask, 0)))
        } else {
            Ok((image, mask))
        }
    }
}

/// The augmentation pipeline used for training samples.
pub fn train_transforms(crop: usize) -> DualCompose {
    DualCompose::new(vec![
        Box::new(HorizontalFlip::default()),
        Box::new(VerticalFlip::default()),
        Box::new(RandomCrop::new((crop, crop, 3))),
    ])
}

/// The deterministic pipeline used for validation samples.
pub fn validation_transforms(crop: usize) -> DualCompose {
    DualCompose::new(vec![Box::new(CenterCrop::new((crop, crop, 3)))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn sample_pair(h: usize, w: usize) -> Pair {
        let mut image = Array3::<f32>::zeros((h, w, 3));
        let mut mask = Array3::<f32>::zeros((h, w, 1));
        for row in 0..h {
            for col in 0..w {
                image[[row, col, 0]] = (row * w + col) as f32;
            }
        }
        mask[[0, 0, 0]] = 1.0;
        mask[[h - 1, w - 1, 0]] = 1.0;
        (image, mask)
    }

    #[test]
    fn test_random_crop_shapes_match() {
        let (image, mask) = sample_pair(768, 768);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let crop = RandomCrop::new((256, 256, 3));
        let (ci, cm) = crop.apply(image, mask, &mut rng).unwrap();
        assert_eq!(ci.dim(), (256, 256, 3));
        assert_eq!(cm.dim(), (256, 256, 1));
    }

    #[test]
    fn test_random_crop_same_offset_for_both() {
        // Mask mirrors the image's first channel so a shared offset keeps
        // them identical after cropping.
        let mut image = Array3::<f32>::zeros((32, 32, 3));
        let mut mask = Array3::<f32>::zeros((32, 32, 1));
        for row in 0..32 {
            for col in 0..32 {
                let v = (row * 32 + col) as f32;
                image[[row, col, 0]] = v;
                mask[[row, col, 0]] = v;
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let crop = RandomCrop::new((8, 8, 3));
        let (ci, cm) = crop.apply(image, mask, &mut rng).unwrap();
        for row in 0..8 {
            for col in 0..8 {
                assert_eq!(ci[[row, col, 0]], cm[[row, col, 0]]);
            }
        }
    }

    #[test]
    fn test_random_crop_reproducible_with_same_seed() {
        let crop = RandomCrop::new((8, 8, 3));

        let (image, mask) = sample_pair(32, 32);
        let mut rng_a = ChaCha8Rng::seed_from_u64(11);
        let (ia, _) = crop.apply(image, mask, &mut rng_a).unwrap();

        let (image, mask) = sample_pair(32, 32);
        let mut rng_b = ChaCha8Rng::seed_from_u64(11);
        let (ib, _) = crop.apply(image, mask, &mut rng_b).unwrap();

        assert_eq!(ia, ib);
    }

    #[test]
    fn test_random_crop_too_large_fails() {
        let (image, mask) = sample_pair(16, 16);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let crop = RandomCrop::new((32, 32, 3));
        let err = crop.apply(image, mask, &mut rng).unwrap_err();
        assert!(matches!(err, ShipSegError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_center_crop_is_deterministic_and_centered() {
        let (image, mask) = sample_pair(16, 16);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let crop = CenterCrop::new((8, 8, 3));
        let (ci, _) = crop.apply(image.clone(), mask.clone(), &mut rng).unwrap();
        // Top-left of the crop is source (4, 4).
        assert_eq!(ci[[0, 0, 0]], image[[4, 4, 0]]);

        let mut rng2 = ChaCha8Rng::seed_from_u64(1234);
        let (ci2, _) = crop.apply(image, mask, &mut rng2).unwrap();
        assert_eq!(ci, ci2);
    }

    #[test]
    fn test_flip_twice_restores_original() {
        let (image, mask) = sample_pair(16, 16);
        let flipped_i = flip_axis(&flip_axis(&image, 1), 1);
        let flipped_m = flip_axis(&flip_axis(&mask, 0), 0);
        assert_eq!(flipped_i, image);
        assert_eq!(flipped_m, mask);
    }

    #[test]
    fn test_flip_applies_to_both_or_neither() {
        let (image, mask) = sample_pair(16, 16);
        let flip = HorizontalFlip::new(1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let (fi, fm) = flip.apply(image.clone(), mask.clone(), &mut rng).unwrap();
        assert_eq!(fi[[0, 0, 0]], image[[0, 15, 0]]);
        assert_eq!(fm[[0, 15, 0]], mask[[0, 0, 0]]);

        let never = HorizontalFlip::new(0.0);
        let (ni, nm) = never.apply(image.clone(), mask.clone(), &mut rng).unwrap();
        assert_eq!(ni, image);
        assert_eq!(nm, mask);
    }

    #[test]
    fn test_mismatched_pair_rejected() {
        let image = Array3::<f32>::zeros((16, 16, 3));
        let mask = Array3::<f32>::zeros((8, 16, 1));
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let flip = VerticalFlip::new(1.0);
        let err = flip.apply(image, mask, &mut rng).unwrap_err();
        assert!(matches!(err, ShipSegError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let (image, mask) = sample_pair(16, 16);
        let pipeline = DualCompose::default();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let (oi, om) = pipeline.apply(image.clone(), mask.clone(), &mut rng).unwrap();
        assert_eq!(oi, image);
        assert_eq!(om, mask);
    }

    #[test]
    fn test_pipeline_equals_sequential_application() {
        let (image, mask) = sample_pair(32, 32);

        let pipeline = DualCompose::new(vec![
            Box::new(HorizontalFlip::new(1.0)),
            Box::new(CenterCrop::new((16, 16, 3))),
        ]);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let (pi, pm) = pipeline.apply(image.clone(), mask.clone(), &mut rng).unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let (si, sm) = HorizontalFlip::new(1.0)
            .apply(image, mask, &mut rng)
            .unwrap();
        let (si, sm) = CenterCrop::new((16, 16, 3)).apply(si, sm, &mut rng).unwrap();

        assert_eq!(pi, si);
        assert_eq!(pm, sm);
    }

    #[test]
    fn test_train_transforms_output_shape() {
        let (image, mask) = sample_pair(768, 768);
        let pipeline = train_transforms(256);
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let (ti, tm) = pipeline.apply(image, mask, &mut rng).unwrap();
        assert_eq!(ti.dim(), (256, 256, 3));
        assert_eq!(tm.dim(), (256, 256, 1));
    }
}
