//! Burn Dataset Integration
//!
//! Implements Burn's Dataset trait and Batcher for the ship imagery. Items
//! are built on demand: the image is loaded from disk, its mask assembled
//! from the grouped RLE strings, and the paired transform pipeline applied to
//! both before conversion to flat CHW tensors. Normalization with ImageNet
//! statistics happens in the batcher.

use std::path::{Path, PathBuf};

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use image::ImageReader;
use ndarray::Array3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::warn;

use crate::dataset::mask;
use crate::dataset::records::ImageGroups;
use crate::dataset::transform::DualCompose;
use crate::utils::error::{Result, ShipSegError};

/// ImageNet channel means, matching the pretrained-era normalization the
/// original pipeline applied to inputs.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet channel standard deviations.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// A single sample ready for batching.
#[derive(Clone, Debug)]
pub struct ShipItem {
    /// Image as flattened CHW floats in [0, 1], not yet normalized.
    pub image: Vec<f32>,
    /// Mask as flattened 1HW floats, 0.0 or 1.0.
    pub mask: Vec<f32>,
    pub height: usize,
    pub width: usize,
    pub image_id: String,
}

/// Training/validation dataset over one side of the split.
pub struct ShipDataset {
    images_dir: PathBuf,
    samples: Vec<(String, Vec<Option<String>>)>,
    transform: DualCompose,
    seed: u64,
}

impl ShipDataset {
    /// Build a dataset for the given image ids, taking each image's RLE
    /// strings from the grouped records.
    pub fn new(
        images_dir: impl Into<PathBuf>,
        groups: &ImageGroups,
        ids: &[String],
        transform: DualCompose,
        seed: u64,
    ) -> Self {
        let samples = ids
            .iter()
            .map(|id| {
                let masks = groups.masks(id).map(|m| m.to_vec()).unwrap_or_default();
                (id.clone(), masks)
            })
            .collect();

        Self {
            images_dir: images_dir.into(),
            samples,
            transform,
            seed,
        }
    }

    /// Load an image as a (height, width, 3) float array scaled to [0, 1].
    pub fn load_image_array(path: &Path) -> Result<Array3<f32>> {
        let img = ImageReader::open(path)
            .map_err(|e| ShipSegError::Image(format!("{}: {}", path.display(), e)))?
            .decode()?
            .to_rgb8();
        let (width, height) = img.dimensions();

        let mut array = Array3::<f32>::zeros((height as usize, width as usize, 3));
        for (x, y, pixel) in img.enumerate_pixels() {
            for c in 0..3 {
                array[[y as usize, x as usize, c]] = pixel[c] as f32 / 255.0;
            }
        }
        Ok(array)
    }

    fn build_item(&self, index: usize) -> Result<ShipItem> {
        let (image_id, rles) = &self.samples[index];
        let path = self.images_dir.join(image_id);

        let image = Self::load_image_array(&path)?;
        let (h, w, _) = image.dim();
        let target = mask::to_target(rles, (h, w))?;

        // One rng per (dataset seed, sample index) keeps augmentation
        // reproducible regardless of worker scheduling.
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(index as u64));
        let (image, target) = self.transform.apply(image, target, &mut rng)?;

        let (h, w, _) = image.dim();
        let mut image_chw = Vec::with_capacity(3 * h * w);
        for c in 0..3 {
            for y in 0..h {
                for x in 0..w {
                    image_chw.push(image[[y, x, c]]);
                }
            }
        }
        let mut mask_flat = Vec::with_capacity(h * w);
        for y in 0..h {
            for x in 0..w {
                mask_flat.push(target[[y, x, 0]]);
            }
        }

        Ok(ShipItem {
            image: image_chw,
            mask: mask_flat,
            height: h,
            width: w,
            image_id: image_id.clone(),
        })
    }
}

impl Dataset<ShipItem> for ShipDataset {
    fn get(&self, index: usize) -> Option<ShipItem> {
        if index >= self.samples.len() {
            return None;
        }
        match self.build_item(index) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Skipping sample {}: {}", self.samples[index].0, e);
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// A batch of ship imagery for training or evaluation.
#[derive(Clone, Debug)]
pub struct ShipBatch<B: Backend> {
    /// Images with shape [batch_size, 3, height, width], ImageNet-normalized.
    pub images: Tensor<B, 4>,
    /// Masks with shape [batch_size, 1, height, width], values 0.0/1.0.
    pub masks: Tensor<B, 4>,
}

/// Batcher assembling [`ShipBatch`]es from items of one spatial size.
#[derive(Clone, Debug, Default)]
pub struct ShipBatcher;

impl ShipBatcher {
    pub fn new() -> Self {
        Self
    }
}

impl<B: Backend> Batcher<B, ShipItem, ShipBatch<B>> for ShipBatcher {
    fn batch(&self, items: Vec<ShipItem>, device: &B::Device) -> ShipBatch<B> {
        let batch_size = items.len();
        let height = items.first().map(|i| i.height).unwrap_or(0);
        let width = items.first().map(|i| i.width).unwrap_or(0);

        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.clone()).collect();
        let masks_data: Vec<f32> = items.iter().flat_map(|item| item.mask.clone()).collect();

        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, 3, height, width]),
            device,
        );
        let masks = Tensor::<B, 4>::from_floats(
            TensorData::new(masks_data, [batch_size, 1, height, width]),
            device,
        );

        let mean = Tensor::<B, 4>::from_floats(
            TensorData::new(IMAGENET_MEAN.to_vec(), [1, 3, 1, 1]),
            device,
        );
        let std = Tensor::<B, 4>::from_floats(
            TensorData::new(IMAGENET_STD.to_vec(), [1, 3, 1, 1]),
            device,
        );
        let images = (images - mean) / std;

        ShipBatch { images, masks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::records::{group_by_image, MaskRecord};
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn write_test_image(dir: &Path, name: &str, size: u32) {
        let img = image::RgbImage::from_fn(size, size, |x, y| {
            image::Rgb([(x * 8) as u8, (y * 8) as u8, 128])
        });
        img.save(dir.join(name)).unwrap();
    }

    #[test]
    fn test_dataset_builds_items() {
        let dir = tempfile::tempdir().unwrap();
        write_test_image(dir.path(), "a.jpg", 32);

        let records = vec![MaskRecord::new("a.jpg", Some("1 4"))];
        let groups = group_by_image(&records);
        let ids = vec!["a.jpg".to_string()];

        let dataset = ShipDataset::new(dir.path(), &groups, &ids, DualCompose::default(), 0);
        assert_eq!(dataset.len(), 1);

        let item = dataset.get(0).unwrap();
        assert_eq!(item.height, 32);
        assert_eq!(item.width, 32);
        assert_eq!(item.image.len(), 3 * 32 * 32);
        assert_eq!(item.mask.len(), 32 * 32);
        // "1 4" marks the first four rows of column 0.
        assert_eq!(item.mask[0], 1.0);
        assert_eq!(item.mask[32], 1.0);
        assert_eq!(item.mask[1], 0.0);
    }

    #[test]
    fn test_dataset_missing_image_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![MaskRecord::new("missing.jpg", Some("1 4"))];
        let groups = group_by_image(&records);
        let ids = vec!["missing.jpg".to_string()];

        let dataset = ShipDataset::new(dir.path(), &groups, &ids, DualCompose::default(), 0);
        assert!(dataset.get(0).is_none());
    }

    #[test]
    fn test_batcher_shapes_and_normalization() {
        let device = Default::default();
        let item = ShipItem {
            image: vec![IMAGENET_MEAN[0]; 3 * 4 * 4],
            mask: vec![1.0; 4 * 4],
            height: 4,
            width: 4,
            image_id: "x.jpg".to_string(),
        };

        let batcher = ShipBatcher::new();
        let batch: ShipBatch<TestBackend> = batcher.batch(vec![item.clone(), item], &device);

        assert_eq!(batch.images.dims(), [2, 3, 4, 4]);
        assert_eq!(batch.masks.dims(), [2, 1, 4, 4]);

        // Channel 0 was filled with its own mean, so it normalizes to zero.
        let values: Vec<f32> = batch.images.into_data().to_vec().unwrap();
        assert!(values[0].abs() < 1e-5);

        let mask_values: Vec<f32> = batch.masks.into_data().to_vec().unwrap();
        assert_eq!(mask_values[0], 1.0);
    }
}
