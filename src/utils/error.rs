//! Error Handling Module
//!
//! Defines the error types for the shipseg library.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Main error type for shipseg operations
#[derive(Error, Debug)]
pub enum ShipSegError {
    /// An RLE string that cannot be interpreted: odd token count or a
    /// non-numeric token. Records carrying one are never silently dropped.
    #[error("Malformed RLE: {0}")]
    MalformedRle(String),

    /// Spatial dimensions disagree: crop larger than its source, or an
    /// image/mask pair entering a transform with different shapes.
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error loading or decoding an image
    #[error("Image error: {0}")]
    Image(String),

    /// CSV parsing or writing error
    #[error("CSV error: {0}")]
    Csv(String),

    /// Error with dataset operations
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error with training
    #[error("Training error: {0}")]
    Training(String),

    /// Error with model operations
    #[error("Model error: {0}")]
    Model(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<image::ImageError> for ShipSegError {
    fn from(err: image::ImageError) -> Self {
        ShipSegError::Image(err.to_string())
    }
}

impl From<csv::Error> for ShipSegError {
    fn from(err: csv::Error) -> Self {
        ShipSegError::Csv(err.to_string())
    }
}

impl From<serde_json::Error> for ShipSegError {
    fn from(err: serde_json::Error) -> Self {
        ShipSegError::Serialization(err.to_string())
    }
}

/// Convenience Result type for shipseg operations
pub type Result<T> = std::result::Result<T, ShipSegError>;
