//! Frame decoding with the `image` crate.
//!
//! Camera clients send each frame as one encoded still image (JPEG from
//! phones and ESP32 boards, PNG from test tools).  The format is sniffed from
//! the leading bytes, so no content-type negotiation is needed.

use std::io::Cursor;

use image::error::{ImageError, LimitErrorKind};
use image::{ImageReader, Limits};

use crate::domain::frame::{DecodeError, Frame, FrameDecoder};

/// Largest accepted width or height, in pixels.
pub const MAX_DIMENSION: u32 = 8192;

/// [`FrameDecoder`] backed by `image::ImageReader`.
///
/// Dimension limits are enforced from the image header, before any pixel
/// buffer is allocated.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageDecoder;

impl ImageDecoder {
    pub fn new() -> Self {
        Self
    }

    fn limits() -> Limits {
        let mut limits = Limits::default();
        limits.max_image_width = Some(MAX_DIMENSION);
        limits.max_image_height = Some(MAX_DIMENSION);
        limits
    }
}

impl FrameDecoder for ImageDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Frame, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }

        let mut reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| DecodeError::Format(e.to_string()))?;
        reader.limits(Self::limits());

        let image = reader.decode().map_err(|e| match e {
            ImageError::Limits(ref limit)
                if matches!(limit.kind(), LimitErrorKind::DimensionError) =>
            {
                DecodeError::TooLarge { max: MAX_DIMENSION }
            }
            other => DecodeError::Format(other.to_string()),
        })?;
        let rgb = image.into_rgb8();
        let (width, height) = rgb.dimensions();

        Frame::from_rgb(width, height, rgb.into_raw())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
