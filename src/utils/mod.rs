//! Utilities: error types, logging setup, and segmentation metrics.

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{Result, ShipSegError};
pub use logging::{init_logging, LogConfig};
pub use metrics::{MetricsSummary, SegmentationMetrics};
