//! Training module: configuration, losses, the epoch loop, and
//! checkpointing.

pub mod checkpoint;
pub mod loss;
pub mod trainer;

pub use checkpoint::{load_model_file, Checkpointer, TrainingState};
pub use loss::SegmentationLoss;
pub use trainer::{run_evaluation, run_training, TrainingReport};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::model::config::{LossKind, ModelKind};

/// Everything the training entry point needs, passed explicitly instead of
/// read from globals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Path to the mask records CSV.
    pub csv_path: PathBuf,
    /// Directory of training images keyed by image id.
    pub images_dir: PathBuf,
    /// Directory for checkpoints and the training log.
    pub output_dir: PathBuf,
    /// Architecture variant.
    pub model: ModelKind,
    /// Loss variant.
    pub loss: LossKind,
    pub epochs: usize,
    pub batch_size: usize,
    pub valid_batch_size: usize,
    pub learning_rate: f64,
    /// Random crop size for training samples.
    pub crop_size: usize,
    /// Center crop size for validation samples.
    pub valid_crop_size: usize,
    pub validation_fraction: f64,
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("data/train_ship_segmentations_v2.csv"),
            images_dir: PathBuf::from("data/train_v2"),
            output_dir: PathBuf::from("results"),
            model: ModelKind::Unet,
            loss: LossKind::Bce,
            epochs: 3,
            batch_size: 16,
            valid_batch_size: 4,
            learning_rate: 1e-4,
            crop_size: 256,
            valid_crop_size: 512,
            validation_fraction: 0.05,
            seed: 42,
        }
    }
}
