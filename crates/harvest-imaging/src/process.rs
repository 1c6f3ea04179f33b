//! Decode, resize and save images on disk.
//!
//! Formats are detected from file content rather than the extension, since
//! downloaded files are named after their URL and often lie about what they
//! contain. On save, the extension picks the encoder; when it names no known
//! format the decoded format is reused.

use std::io::Cursor;
use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};

use crate::types::{ImagingError, ImagingResult};

/// A decoded image together with the format it was read from.
#[derive(Debug, Clone)]
pub struct Image {
    inner: DynamicImage,
    format: Option<ImageFormat>,
}

/// Decode the image stored at `path`, guessing the format from its bytes.
pub fn decode(path: impl AsRef<Path>) -> ImagingResult<Image> {
    let reader = ImageReader::open(path.as_ref())?.with_guessed_format()?;
    let format = reader.format();
    let inner = reader.decode()?;
    Ok(Image { inner, format })
}

impl Image {
    /// Resize to exactly `width` x `height` with a Lanczos3 filter.
    pub fn resize(&self, width: u32, height: u32) -> ImagingResult<Image> {
        if width == 0 || height == 0 {
            return Err(ImagingError::InvalidDimensions { width, height });
        }
        Ok(Image {
            inner: self.inner.resize_exact(width, height, FilterType::Lanczos3),
            format: self.format,
        })
    }

    /// Encode for `path` without touching the disk. The extension picks the
    /// encoder, falling back to the decoded format. JPEG output is
    /// flattened to RGB first.
    pub fn encode_for(&self, path: impl AsRef<Path>) -> ImagingResult<Vec<u8>> {
        let path = path.as_ref();
        let format = ImageFormat::from_path(path)
            .ok()
            .or(self.format)
            .ok_or_else(|| ImagingError::UnsupportedFormat(path.display().to_string()))?;

        let mut buf = Cursor::new(Vec::new());
        if format == ImageFormat::Jpeg {
            DynamicImage::ImageRgb8(self.inner.to_rgb8()).write_to(&mut buf, format)?;
        } else {
            self.inner.write_to(&mut buf, format)?;
        }
        Ok(buf.into_inner())
    }

    /// Encode to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> ImagingResult<()> {
        let bytes = self.encode_for(&path)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Pixel dimensions as `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        self.inner.dimensions()
    }

    /// Format detected when decoding, if any.
    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }
}

/// Decode `path` and return it resized to `width` x `height`, encoded for
/// the same path. Nothing is written.
pub fn resize_encoded(path: impl AsRef<Path>, width: u32, height: u32) -> ImagingResult<Vec<u8>> {
    let path = path.as_ref();
    let bytes = decode(path)?.resize(width, height)?.encode_for(path)?;
    tracing::debug!("resized {} to {width}x{height}", path.display());
    Ok(bytes)
}

/// Decode `path`, resize it to `width` x `height` and overwrite it.
pub fn resize_in_place(path: impl AsRef<Path>, width: u32, height: u32) -> ImagingResult<()> {
    let path = path.as_ref();
    let bytes = resize_encoded(path, width, height)?;
    std::fs::write(path, bytes)?;
    Ok(())
}
