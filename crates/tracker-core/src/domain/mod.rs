//! Domain types shared by the control loop and the server.
//!
//! Everything here is plain data: no locks, no I/O.

pub mod face;

pub use face::{FaceBox, FrameContext};
