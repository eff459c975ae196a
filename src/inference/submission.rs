//! Submission Generation
//!
//! Runs a trained model over the test images and writes the competition CSV:
//! one row per predicted ship instance, or a single row with a null
//! `EncodedPixels` for images where nothing was found. Probabilities are
//! thresholded, opened with a small disk to drop speckle, and re-split into
//! instances before encoding.

use std::path::{Path, PathBuf};

use burn::data::dataloader::batcher::Batcher;
use burn::tensor::backend::Backend;
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::info;
use walkdir::WalkDir;

use crate::dataset::burn_dataset::{ShipBatch, ShipBatcher, ShipDataset, ShipItem};
use crate::dataset::records::MaskRecord;
use crate::inference::postprocess::{binary_opening, split_instances, Connectivity};
use crate::model::config::ModelKind;
use crate::model::unet::Unet;
use crate::training::checkpoint::load_model_file;
use crate::utils::error::{Result, ShipSegError};
use crate::{OPENING_RADIUS, PREDICTION_THRESHOLD};

/// Configuration for submission generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictConfig {
    /// Trained weights file (without recorder extension).
    pub weights_path: PathBuf,
    /// Directory of test images.
    pub images_dir: PathBuf,
    /// Output CSV path.
    pub output_path: PathBuf,
    /// Architecture the weights were trained with.
    pub model: ModelKind,
    pub batch_size: usize,
    /// Probability threshold applied to the sigmoid output.
    pub threshold: f32,
    /// Disk radius of the opening pre-filter.
    pub opening_radius: usize,
}

impl Default for PredictConfig {
    fn default() -> Self {
        Self {
            weights_path: PathBuf::from("results/model_best"),
            images_dir: PathBuf::from("data/test_v2"),
            output_path: PathBuf::from("submission.csv"),
            model: ModelKind::Unet,
            batch_size: 2,
            threshold: PREDICTION_THRESHOLD,
            opening_radius: OPENING_RADIUS,
        }
    }
}

/// List test image file names (not paths) in sorted order.
pub fn list_test_images(dir: &Path) -> Result<Vec<String>> {
    let mut names: Vec<String> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ["jpg", "jpeg", "png"].contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .filter_map(|e| e.file_name().to_str().map(String::from))
        .collect();
    names.sort();
    Ok(names)
}

/// Submission rows for one predicted mask: one per instance, or a single
/// null row when the opened mask is empty.
pub fn instance_rows(
    image_id: &str,
    thresholded: &Array2<u8>,
    opening_radius: usize,
) -> Vec<MaskRecord> {
    let opened = binary_opening(thresholded, opening_radius);
    let rles = split_instances(&opened, Connectivity::Eight);

    if rles.is_empty() {
        vec![MaskRecord::new(image_id, None::<String>)]
    } else {
        rles.into_iter()
            .map(|rle| MaskRecord::new(image_id, Some(rle)))
            .collect()
    }
}

/// Write submission rows as `ImageId,EncodedPixels` CSV.
pub fn write_submission(path: &Path, rows: &[MaskRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Run the full prediction pipeline and write the submission CSV.
///
/// Returns the number of rows written. Every test image is covered at least
/// once.
pub fn run_prediction<B: Backend>(config: &PredictConfig) -> Result<usize> {
    let device = B::Device::default();

    let image_ids = list_test_images(&config.images_dir)?;
    if image_ids.is_empty() {
        return Err(ShipSegError::Dataset(format!(
            "no test images found in {}",
            config.images_dir.display()
        )));
    }
    info!("{} test images found", image_ids.len());

    let model = Unet::<B>::new(&config.model.config(), &device);
    let model = load_model_file(model, &config.weights_path, &device)?;
    let batcher = ShipBatcher::new();

    let progress = ProgressBar::new(image_ids.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut rows: Vec<MaskRecord> = Vec::new();

    for chunk in image_ids.chunks(config.batch_size.max(1)) {
        let mut items: Vec<ShipItem> = Vec::with_capacity(chunk.len());
        for image_id in chunk {
            let path = config.images_dir.join(image_id);
            let image = ShipDataset::load_image_array(&path)?;
            let (h, w, _) = image.dim();

            let mut image_chw = Vec::with_capacity(3 * h * w);
            for c in 0..3 {
                for y in 0..h {
                    for x in 0..w {
                        image_chw.push(image[[y, x, c]]);
                    }
                }
            }
            items.push(ShipItem {
                image: image_chw,
                mask: vec![0.0; h * w],
                height: h,
                width: w,
                image_id: image_id.clone(),
            });
        }

        let heights: Vec<usize> = items.iter().map(|i| i.height).collect();
        let widths: Vec<usize> = items.iter().map(|i| i.width).collect();
        let ids: Vec<String> = items.iter().map(|i| i.image_id.clone()).collect();

        let batch: ShipBatch<B> = batcher.batch(items, &device);
        let probs = model.forward_probabilities(batch.images);
        let values: Vec<f32> = probs
            .into_data()
            .to_vec()
            .map_err(|e| ShipSegError::Model(format!("failed to read predictions: {:?}", e)))?;

        let mut offset = 0usize;
        for ((image_id, h), w) in ids.iter().zip(heights).zip(widths) {
            let plane = &values[offset..offset + h * w];
            offset += h * w;

            let mask = Array2::from_shape_fn((h, w), |(y, x)| {
                u8::from(plane[y * w + x] > config.threshold)
            });
            rows.extend(instance_rows(image_id, &mask, config.opening_radius));
            progress.inc(1);
        }
    }
    progress.finish_with_message("done");

    write_submission(&config.output_path, &rows)?;
    info!(
        "Wrote {} rows for {} images to {}",
        rows.len(),
        image_ids.len(),
        config.output_path.display()
    );
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_rows_empty_mask_gives_null_row() {
        let mask = Array2::<u8>::zeros((8, 8));
        let rows = instance_rows("empty.jpg", &mask, 1);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].image_id, "empty.jpg");
        assert_eq!(rows[0].encoded_pixels, None);
    }

    #[test]
    fn test_instance_rows_one_per_blob() {
        let mut mask = Array2::<u8>::zeros((16, 16));
        for y in 1..6 {
            for x in 1..6 {
                mask[[y, x]] = 1;
            }
        }
        for y in 9..14 {
            for x in 9..14 {
                mask[[y, x]] = 1;
            }
        }

        let rows = instance_rows("two.jpg", &mask, 1);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.encoded_pixels.is_some()));
        assert!(rows.iter().all(|r| r.image_id == "two.jpg"));
    }

    #[test]
    fn test_instance_rows_opening_can_empty_the_mask() {
        // A lone pixel does not survive a radius-1 opening.
        let mut mask = Array2::<u8>::zeros((8, 8));
        mask[[4, 4]] = 1;

        let rows = instance_rows("speck.jpg", &mask, 1);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].encoded_pixels, None);
    }

    #[test]
    fn test_write_submission_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("submission.csv");

        let rows = vec![
            MaskRecord::new("a.jpg", Some("1 3")),
            MaskRecord::new("a.jpg", Some("9 2")),
            MaskRecord::new("b.jpg", None::<String>),
        ];
        write_submission(&path, &rows).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "ImageId,EncodedPixels");
        assert_eq!(lines[1], "a.jpg,1 3");
        assert_eq!(lines[3], "b.jpg,");
    }

    #[test]
    fn test_list_test_images_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let names = list_test_images(dir.path()).unwrap();
        assert_eq!(names, vec!["a.jpg".to_string(), "b.jpg".to_string()]);
    }
}
