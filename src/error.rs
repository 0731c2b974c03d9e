//! Error types for the face overlay pipeline.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding failed
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// YAML (de)serialization failed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A single detector or segmenter call failed
    #[error("Detection error: {0}")]
    Detection(String),

    /// Every acceleration mode failed to initialize the detector
    #[error("Detector initialization failed after {} attempt(s): {}", attempts.len(), attempts.join("; "))]
    DetectorInit {
        /// One message per attempted mode, in attempt order
        attempts: Vec<String>,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
