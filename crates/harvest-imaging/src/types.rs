//! Error types for the imaging crate.

/// Errors that can occur while post-processing an image.
#[derive(thiserror::Error, Debug)]
pub enum ImagingError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Unsupported output format for {0}")]
    UnsupportedFormat(String),
}

/// Convenience result type.
pub type ImagingResult<T> = Result<T, ImagingError>;
