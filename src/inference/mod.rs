//! Inference module: prediction postprocessing and submission generation.

pub mod postprocess;
pub mod submission;

pub use postprocess::{binary_opening, disk, label_components, split_instances, Connectivity};
pub use submission::{
    instance_rows, list_test_images, run_prediction, write_submission, PredictConfig,
};
