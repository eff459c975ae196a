//! Dataset module: mask records, the RLE codec, mask assembly, paired
//! geometric transforms, splitting, and Burn integration.

pub mod burn_dataset;
pub mod mask;
pub mod records;
pub mod rle;
pub mod split;
pub mod transform;

pub use burn_dataset::{ShipBatch, ShipBatcher, ShipDataset, ShipItem};
pub use mask::{
    binary_view, image_pixel_count, pixel_distribution, sum_masks, to_target, PixelDistribution,
};
pub use records::{group_by_image, read_records, ImageGroups, MaskRecord};
pub use split::{DatasetSplits, SplitConfig, SplitStats};
pub use transform::{
    train_transforms, validation_transforms, CenterCrop, DualCompose, HorizontalFlip,
    PairedTransform, RandomCrop, VerticalFlip,
};
