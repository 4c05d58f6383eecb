//! tracker-server library crate.
//!
//! This crate provides a WebSocket server that receives camera frames, finds
//! the subject's face in each one, and broadcasts stepper commands that keep
//! the face vertically centred.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Camera client (binary frames over WebSocket)
//!         ↓
//! [tracker-server]
//!   ├── domain/           Pure types: ServerConfig, Frame, decoder/locator traits
//!   ├── application/      FrameHandler, CommandBroadcaster
//!   └── infrastructure/
//!         ├── ws_server/           WebSocket accept loop (tokio-tungstenite)
//!         ├── connection_registry/ Open connections, welcome, broadcast
//!         ├── image_decoder/       JPEG/PNG decoding (image crate)
//!         ├── detector/            Face locator construction (tract backend)
//!         └── config_file/         TOML configuration file
//!         ↓
//! All connected clients (text commands over WebSocket)
//! ```
//!
//! The decision logic itself (thresholds, hysteresis, actuator bound) lives
//! in the `tracker-core` crate.
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `tracker-core` only.
//! - `infrastructure` depends on all other layers plus `tokio`,
//!   `tungstenite`, `image` and the detector backend.

/// Domain layer: configuration and frame/detector contracts (no I/O).
pub mod domain;

/// Application layer: per-frame orchestration and command broadcasting.
pub mod application;

/// Infrastructure layer: WebSocket server, registry, decoder, detector.
pub mod infrastructure;
