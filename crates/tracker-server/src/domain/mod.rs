//! Domain layer for tracker-server.
//!
//! The domain layer contains the types the rest of the server is built
//! around: runtime configuration, the decoded [`Frame`], and the two
//! capability traits the frame pipeline calls through ([`FrameDecoder`] and
//! [`FaceLocator`]).
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `TcpStream`, or `WebSocket` types
//! - File I/O or environment variable reading
//! - Concrete image codecs or inference engines

pub mod config;
pub mod frame;
pub mod locator;

pub use config::{DetectorConfig, ServerConfig};
pub use frame::{DecodeError, Frame, FrameDecoder};
pub use locator::{FaceLocator, LocateError};
