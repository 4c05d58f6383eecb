//! The face-detection capability.
//!
//! The server treats face detection as an opaque function
//! `Frame → Vec<FaceBox>`.  Any detector (classifier cascade, neural network)
//! can sit behind [`FaceLocator`] without touching the control loop.
//!
//! A detector that failed to initialise is represented by the *absence* of a
//! locator (`Option<Arc<dyn FaceLocator>>` is `None`), not by an
//! implementation that always errors.

use thiserror::Error;
use tracker_core::FaceBox;

use crate::domain::frame::Frame;

/// Errors a locator may report for a single frame.
#[derive(Debug, Error)]
pub enum LocateError {
    /// The frame could not be converted into the detector's input layout.
    #[error("detector input preparation failed: {0}")]
    Input(String),

    /// The detector ran but failed.
    #[error("detector inference failed: {0}")]
    Inference(String),
}

/// Finds face rectangles in a decoded frame.
///
/// Implementations are shared by every connection worker, so `locate` takes
/// `&self` and must be safe to call concurrently.
#[cfg_attr(test, mockall::automock)]
pub trait FaceLocator: Send + Sync {
    /// Short identifier used in log messages.
    fn name(&self) -> &'static str;

    /// Returns every face found in `frame`, in pixel coordinates of `frame`.
    fn locate(&self, frame: &Frame) -> Result<Vec<FaceBox>, LocateError>;
}
