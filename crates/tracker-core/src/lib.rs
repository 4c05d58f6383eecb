//! # tracker-core
//!
//! Shared library for the face-tracking stepper server containing the
//! position-control loop, the bounded actuator state and the command wire
//! format.
//!
//! This crate has zero dependencies on sockets, image codecs or detectors.
//! The server crate feeds it face rectangles and receives commands back.
//!
//! # Architecture overview (for beginners)
//!
//! A camera client streams frames to the server.  The server finds faces in
//! each frame and asks this crate a single question: "given where the faces
//! are, should the stepper move up, move down, or stay put?"
//!
//! - **`domain`** – Per-frame geometry: [`FaceBox`] rectangles and the
//!   [`FrameContext`] that bundles them with the image height.
//!
//! - **`control`** – The decision logic.  [`ControlLoop`] turns a
//!   `FrameContext` into a [`Verdict`], applying hysteresis so the stepper
//!   does not oscillate, and owns the [`ActuatorState`] counter that tracks
//!   how far the device has moved from its start position.
//!
//! - **`protocol`** – How a decision travels to listeners: the [`Command`]
//!   type and its text encodings ([`WireFormat`]).

pub mod control;
pub mod domain;
pub mod protocol;

pub use control::actuator::{ActuatorState, ControlPolicy, PolicyError};
pub use control::control_loop::{CommandSink, ControlLoop, Verdict};
pub use domain::face::{FaceBox, FrameContext};
pub use protocol::command::{Command, CommandError, Direction, WireFormat};
