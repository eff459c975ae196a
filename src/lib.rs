//! # shipseg
//!
//! Ship segmentation on satellite imagery with the Burn framework, from the
//! competition CSV of run-length-encoded masks to a trained model and back
//! to a submission file.
//!
//! ## Modules
//!
//! - `dataset`: mask records, the RLE codec, mask assembly, paired geometric
//!   transforms, and Burn dataset integration
//! - `model`: U-Net segmentation network and the architecture/loss registry
//! - `training`: loss functions, the epoch loop, and checkpointing
//! - `inference`: postprocessing (opening + connected components) and
//!   submission generation
//! - `utils`: errors, logging, and Dice/Jaccard metrics
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shipseg::backend::TrainingBackend;
//! use shipseg::training::{run_training, TrainerConfig};
//!
//! let config = TrainerConfig::default();
//! let report = run_training::<TrainingBackend>(&config)?;
//! println!("best dice: {:.4}", report.best_dice);
//! ```

pub mod backend;
pub mod dataset;
pub mod inference;
pub mod model;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use dataset::burn_dataset::{ShipBatch, ShipBatcher, ShipDataset, ShipItem};
pub use dataset::records::{group_by_image, read_records, ImageGroups, MaskRecord};
pub use dataset::split::{DatasetSplits, SplitConfig};
pub use dataset::transform::DualCompose;
pub use inference::submission::PredictConfig;
pub use model::config::{LossKind, ModelKind};
pub use model::unet::{Unet, UnetConfig};
pub use training::TrainerConfig;
pub use utils::error::{Result, ShipSegError};
pub use utils::metrics::{MetricsSummary, SegmentationMetrics};

/// Side length of the dataset's image and mask grid.
pub const MASK_SIZE: usize = 768;

/// Random crop size used for training samples.
pub const TRAIN_CROP_SIZE: usize = 256;

/// Center crop size used for validation samples.
pub const VALID_CROP_SIZE: usize = 512;

/// Probability threshold applied to model output before re-splitting.
pub const PREDICTION_THRESHOLD: f32 = 0.5;

/// Disk radius of the morphological opening applied before re-splitting.
pub const OPENING_RADIUS: usize = 2;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
