//! Infrastructure layer for tracker-server.
//!
//! The infrastructure layer contains all I/O: the WebSocket listener, the
//! registry of open connections, image decoding, detector construction and
//! config file loading.  It implements the traits declared by the domain and
//! application layers.
//!
//! # Module overview
//!
//! - [`ws_server`]           – Accept loop and per-connection session tasks.
//! - [`connection_registry`] – Open connections, welcome, join notice, broadcast.
//! - [`image_decoder`]       – JPEG/PNG frame decoding (`image` crate).
//! - [`detector`]            – Face locator construction and post-processing.
//! - [`config_file`]         – TOML configuration file.

pub mod config_file;
pub mod connection_registry;
pub mod detector;
pub mod image_decoder;
pub mod ws_server;

pub use config_file::{ConfigError, FileConfig};
pub use connection_registry::{ConnectionHandle, ConnectionId, ConnectionRegistry};
pub use image_decoder::ImageDecoder;
pub use ws_server::{run_server, serve, ServerContext};
