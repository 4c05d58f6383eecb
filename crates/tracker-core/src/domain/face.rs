//! Face rectangles and the per-frame working set.
//!
//! # Coordinate system
//!
//! All coordinates are integer image pixels with the origin at the top-left
//! corner of the frame, `x` growing to the right and `y` growing downward.
//!
//! ```text
//! (0,0) ───────────────► x
//!   │   ┌──────┐
//!   │   │ face │  y = top edge, height = rows covered
//!   │   └──────┘
//!   ▼ y
//! ```
//!
//! The control loop does not care about `y` directly; it uses the *height
//! metric*, the distance from the bottom of the image up to the face's
//! vertical centre (see [`FaceBox::height_metric`]).

use serde::{Deserialize, Serialize};

/// An axis-aligned face rectangle produced by a detector for one frame.
///
/// Face boxes are ephemeral: they are created for one frame, consumed by the
/// control loop, and dropped.  Nothing retains them across frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    /// Left edge in pixels.
    pub x: i32,
    /// Top edge in pixels.
    pub y: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl FaceBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Returns the vertical position signal for this face in a frame that is
    /// `image_height` pixels tall.
    ///
    /// `h = image_height - (y + height / 2)`, using integer division for the
    /// half-height.  A face near the bottom of the frame yields a small `h`;
    /// a face near the top yields a large `h`.  Coordinates come from an
    /// arbitrary detector, so the arithmetic saturates instead of overflowing.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tracker_core::FaceBox;
    ///
    /// let face = FaceBox::new(0, 10, 20, 20);
    /// assert_eq!(face.height_metric(100), 80);
    /// ```
    pub fn height_metric(&self, image_height: i32) -> i32 {
        image_height.saturating_sub(self.y.saturating_add(self.height / 2))
    }
}

/// The per-frame input to the control loop: image height plus every face
/// found in that frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameContext {
    /// Height of the decoded frame in pixels (`H`).
    pub image_height: i32,
    /// Faces detected in the frame, in detector order.
    pub faces: Vec<FaceBox>,
}

impl FrameContext {
    pub fn new(image_height: i32, faces: Vec<FaceBox>) -> Self {
        Self {
            image_height,
            faces,
        }
    }

    /// Returns the smallest height metric across all faces, or `None` when
    /// the frame has no faces.
    ///
    /// The face closest to the bottom of the frame dominates the decision.
    pub fn dominant_metric(&self) -> Option<i32> {
        self.faces
            .iter()
            .map(|face| face.height_metric(self.image_height))
            .min()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
