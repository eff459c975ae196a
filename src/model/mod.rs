//! Model module: the segmentation network and the architecture/loss
//! selection registry.

pub mod config;
pub mod unet;

pub use config::{LossKind, ModelKind};
pub use unet::{DoubleConv, Unet, UnetConfig, UpBlock};
