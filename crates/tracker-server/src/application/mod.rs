//! Application layer for tracker-server.
//!
//! The application layer orchestrates the per-frame work: decode, detect,
//! decide, broadcast.  It knows *what* to do but calls through traits for
//! *how*: the image codec, the detector and the connection registry are all
//! injected.
//!
//! # What does NOT belong here?
//!
//! - Opening sockets or listening for connections (that is infrastructure)
//! - Tokio task spawning (that happens in the infrastructure layer)
//! - Concrete codecs or detector backends

pub mod command_broadcaster;
pub mod frame_handler;

pub use command_broadcaster::{Broadcast, CommandBroadcaster};
pub use frame_handler::{FrameHandler, FrameOutcome};
