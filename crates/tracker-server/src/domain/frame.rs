//! Decoded camera frames and the decoder contract.

use thiserror::Error;

/// Errors produced while turning raw message bytes into a [`Frame`].
///
/// A decode error is terminal for that single message only: the frame is
/// dropped and the connection stays open.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The binary message carried no bytes.
    #[error("empty frame")]
    Empty,

    /// The bytes are not an image in a supported format, or are corrupt.
    #[error("unrecognised or corrupt image data: {0}")]
    Format(String),

    /// The image decoded to zero or implausibly large dimensions.
    #[error("unsupported frame dimensions {width}x{height}")]
    Dimensions { width: u32, height: u32 },

    /// The image header declares a width or height above `max` pixels; the
    /// pixel data was never decoded.
    #[error("frame exceeds {max} pixels in width or height")]
    TooLarge { max: u32 },
}

/// A decoded frame as packed 8-bit RGB, row-major, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// `width * height * 3` bytes.
    pub rgb: Vec<u8>,
}

impl Frame {
    /// Wraps an RGB buffer, checking that its length matches the dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Dimensions`] for empty frames, frames whose
    /// height does not fit in `i32`, or buffers of the wrong length.
    pub fn from_rgb(width: u32, height: u32, rgb: Vec<u8>) -> Result<Self, DecodeError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(3));
        let plausible = width > 0 && height > 0 && i32::try_from(height).is_ok();
        if !plausible || expected != Some(rgb.len()) {
            return Err(DecodeError::Dimensions { width, height });
        }
        Ok(Self { width, height, rgb })
    }

    /// Frame height as the signed pixel type used by the control loop.
    pub fn image_height(&self) -> i32 {
        // `from_rgb` guarantees the height fits.
        i32::try_from(self.height).unwrap_or(i32::MAX)
    }
}

/// Turns the raw bytes of one binary message into a [`Frame`].
///
/// The concrete codec lives in the infrastructure layer; tests substitute
/// their own implementation.
pub trait FrameDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Frame, DecodeError>;
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgb_accepts_matching_buffer() {
        let frame = Frame::from_rgb(4, 2, vec![0; 24]).unwrap();
        assert_eq!(frame.image_height(), 2);
    }

    #[test]
    fn test_from_rgb_rejects_short_buffer() {
        let result = Frame::from_rgb(4, 2, vec![0; 23]);
        assert!(matches!(
            result,
            Err(DecodeError::Dimensions {
                width: 4,
                height: 2
            })
        ));
    }

    #[test]
    fn test_from_rgb_rejects_zero_dimensions() {
        assert!(Frame::from_rgb(0, 10, Vec::new()).is_err());
        assert!(Frame::from_rgb(10, 0, Vec::new()).is_err());
    }
}
