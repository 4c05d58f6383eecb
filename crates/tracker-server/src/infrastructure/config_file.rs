//! TOML configuration file for the tracking server.
//!
//! Every field is optional; missing fields fall back to the built-in
//! defaults, so an empty file is a valid configuration.  Example:
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0"
//! port = 8887
//! wire_format = "legacy"   # or "json"
//! log_level = "info"
//!
//! [control]
//! low_fraction = 0.4
//! high_fraction = 0.6
//! bound = 32
//!
//! [detector]
//! model_path = "models/version-RFB-320.onnx"
//! score_threshold = 0.7
//! iou_threshold = 0.3
//! ```
//!
//! CLI flags and environment variables override values from the file (see
//! `main.rs`).

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracker_core::{ControlPolicy, PolicyError, WireFormat};

use crate::domain::config::{DetectorConfig, ServerConfig, DEFAULT_BIND, DEFAULT_PORT};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The bind address is not a valid IP address.
    #[error("invalid bind address '{0}'")]
    InvalidAddress(String),

    /// The control thresholds are inconsistent.
    #[error("invalid control policy: {0}")]
    InvalidPolicy(#[from] PolicyError),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub control: ControlPolicy,
    #[serde(default)]
    pub detector: DetectorConfig,
}

/// Listener and output settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    /// IP address to bind.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// WebSocket listener port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Command encoding: `"legacy"` or `"json"`.
    #[serde(default)]
    pub wire_format: WireFormat,
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_bind_address() -> String {
    DEFAULT_BIND.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            wire_format: WireFormat::default(),
            log_level: default_log_level(),
        }
    }
}

impl FileConfig {
    /// Reads and parses the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not valid TOML for this schema.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Validates the file contents and converts them into a [`ServerConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] for an unparsable bind address
    /// and [`ConfigError::InvalidPolicy`] for inconsistent thresholds.
    pub fn into_server_config(self) -> Result<ServerConfig, ConfigError> {
        let ip: IpAddr = self
            .server
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(self.server.bind_address.clone()))?;
        self.control.validate()?;

        Ok(ServerConfig {
            bind_addr: SocketAddr::new(ip, self.server.port),
            wire_format: self.server.wire_format,
            log_level: self.server.log_level,
            control: self.control,
            detector: self.detector,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
