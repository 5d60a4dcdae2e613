use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("pixel buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },
    #[error("no image or description supplied")]
    MissingInput,
    #[error("both an image and a description were supplied")]
    AmbiguousInput,
    #[error("analysis cancelled before feature extraction")]
    Cancelled,
    #[error("feature computation failed: {0}")]
    Internal(String),
}
