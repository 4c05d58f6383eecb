//! Server configuration types.
//!
//! [`ServerConfig`] is the single source of truth for all runtime settings.
//! `main.rs` builds it from CLI arguments, environment variables and an
//! optional TOML file (see `infrastructure::config_file`); tests construct it
//! directly or use [`ServerConfig::default`].

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracker_core::{ControlPolicy, WireFormat};

/// Default WebSocket listener port.
pub const DEFAULT_PORT: u16 = 8887;

/// Default bind address (all interfaces).
pub const DEFAULT_BIND: &str = "0.0.0.0";

/// All runtime configuration for the tracking server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address and port the WebSocket listener binds to.
    pub bind_addr: SocketAddr,

    /// Encoding used for outbound stepper commands.
    pub wire_format: WireFormat,

    /// Fallback `tracing` filter when `RUST_LOG` is not set.
    pub log_level: String,

    /// Hysteresis thresholds and actuator travel.
    pub control: ControlPolicy,

    /// Face detector settings.
    pub detector: DetectorConfig,
}

impl Default for ServerConfig {
    /// | Field        | Default         |
    /// |--------------|-----------------|
    /// | bind_addr    | `0.0.0.0:8887`  |
    /// | wire_format  | `legacy`        |
    /// | log_level    | `info`          |
    /// | control      | 0.4 / 0.6 / ±32 |
    /// | detector     | no model        |
    fn default() -> Self {
        Self {
            // Compile-time-known valid socket address.
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            wire_format: WireFormat::Legacy,
            log_level: "info".to_string(),
            control: ControlPolicy::default(),
            detector: DetectorConfig::default(),
        }
    }
}

/// Settings for the face detector backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Path to the ONNX face model.  `None` disables detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,

    /// Minimum face confidence in `[0, 1]`.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,

    /// Overlap above which two candidate boxes are merged.
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,
}

fn default_score_threshold() -> f32 {
    0.7
}
fn default_iou_threshold() -> f32 {
    0.3
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            score_threshold: default_score_threshold(),
            iou_threshold: default_iou_threshold(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
