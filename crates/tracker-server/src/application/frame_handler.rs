//! FrameHandler: the per-message entry point for binary frames.
//!
//! ```text
//! bytes ──decode──► Frame ──locate──► Vec<FaceBox> ──► ControlLoop ──► CommandSink
//!   │                  │
//!   └─ DecodeFailed    └─ detector unavailable / error → zero faces
//! ```
//!
//! Handling is synchronous and runs to completion; the infrastructure layer
//! moves it onto a blocking worker so detection never stalls the async
//! runtime, and awaits it before reading the connection's next message.

use std::sync::Arc;

use tracing::{debug, trace, warn};
use tracker_core::{CommandSink, ControlLoop, FrameContext, Verdict};

use crate::domain::frame::FrameDecoder;
use crate::domain::locator::FaceLocator;

/// What happened to one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The bytes were not a decodable image; nothing else happened.
    DecodeFailed,
    /// The frame was decoded and evaluated by the control loop.
    Evaluated(Verdict),
}

/// Decodes, detects and evaluates frames against the shared control loop.
///
/// Cloning is cheap (all fields are `Arc`s); every connection task holds a
/// clone that refers to the same control loop and actuator state.
#[derive(Clone)]
pub struct FrameHandler {
    decoder: Arc<dyn FrameDecoder>,
    locator: Option<Arc<dyn FaceLocator>>,
    control: Arc<ControlLoop>,
    sink: Arc<dyn CommandSink>,
}

impl FrameHandler {
    /// `locator` is `None` when the detector is unavailable; frames are then
    /// still decoded and handled, but never produce a command.
    pub fn new(
        decoder: Arc<dyn FrameDecoder>,
        locator: Option<Arc<dyn FaceLocator>>,
        control: Arc<ControlLoop>,
        sink: Arc<dyn CommandSink>,
    ) -> Self {
        Self {
            decoder,
            locator,
            control,
            sink,
        }
    }

    pub fn detector_available(&self) -> bool {
        self.locator.is_some()
    }

    pub fn control(&self) -> &Arc<ControlLoop> {
        &self.control
    }

    /// Processes one binary message received from `peer`.
    pub fn handle(&self, peer: &str, bytes: &[u8]) -> FrameOutcome {
        let frame = match self.decoder.decode(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("dropping frame from {peer}: {e}");
                return FrameOutcome::DecodeFailed;
            }
        };
        trace!("decoded {}x{} frame from {peer}", frame.width, frame.height);

        let faces = match &self.locator {
            Some(locator) => match locator.locate(&frame) {
                Ok(faces) => faces,
                Err(e) => {
                    warn!("{} failed on frame from {peer}: {e}", locator.name());
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        debug!("{} face(s) in frame from {peer}", faces.len());

        let ctx = FrameContext::new(frame.image_height(), faces);
        FrameOutcome::Evaluated(self.control.evaluate(&ctx, self.sink.as_ref()))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
