//! Face-tracking stepper server: entry point.
//!
//! This binary accepts WebSocket connections from camera clients, runs face
//! detection on every binary frame they send, and broadcasts `up`/`down`
//! stepper commands to all connected clients so that the subject's face stays
//! vertically centred in the camera view.
//!
//! # Usage
//!
//! ```text
//! tracker-server [OPTIONS]
//!
//! Options:
//!   --bind        <IP>     Address to bind [default: 0.0.0.0]
//!   --port        <PORT>   WebSocket listener port [default: 8887]
//!   --config      <FILE>   TOML configuration file
//!   --model       <FILE>   ONNX face model (enables detection)
//!   --wire-format <FMT>    `legacy` or `json` [default: legacy]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable              | Default   | Description                  |
//! |-----------------------|-----------|------------------------------|
//! | `TRACKER_BIND`        | `0.0.0.0` | Bind address                 |
//! | `TRACKER_PORT`        | `8887`    | WebSocket listener port      |
//! | `TRACKER_CONFIG`      | none      | TOML configuration file      |
//! | `TRACKER_MODEL`       | none      | ONNX face model              |
//! | `TRACKER_WIRE_FORMAT` | `legacy`  | Command encoding             |
//! | `RUST_LOG`            | `info`    | `tracing` filter             |
//!
//! CLI args take precedence over environment variables, which take precedence
//! over values from the config file; anything left unset uses the built-in
//! default.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracker_core::WireFormat;

use tracker_server::domain::ServerConfig;
use tracker_server::infrastructure::{run_server, FileConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Face-tracking stepper server.
///
/// Options left unset fall back to the config file, then to built-in
/// defaults, so every field here is optional.
#[derive(Debug, Default, Parser)]
#[command(
    name = "tracker-server",
    about = "WebSocket server that keeps a camera subject centred by driving a vertical stepper",
    version
)]
struct Cli {
    /// IP address to bind the WebSocket server to.
    ///
    /// Use `0.0.0.0` to accept connections on every interface or
    /// `127.0.0.1` for local clients only.
    #[arg(long, env = "TRACKER_BIND")]
    bind: Option<String>,

    /// TCP port for the WebSocket server to listen on.
    #[arg(long, env = "TRACKER_PORT")]
    port: Option<u16>,

    /// Path to a TOML configuration file.
    #[arg(long, env = "TRACKER_CONFIG")]
    config: Option<PathBuf>,

    /// Path to the ONNX face model.  Without a model no commands are issued.
    #[arg(long, env = "TRACKER_MODEL")]
    model: Option<PathBuf>,

    /// Encoding of outbound stepper commands: `legacy` or `json`.
    #[arg(long, env = "TRACKER_WIRE_FORMAT")]
    wire_format: Option<WireFormat>,
}

impl Cli {
    /// Merges the CLI arguments over the config file into a [`ServerConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, if the
    /// bind address is not a valid IP address, or if the control thresholds
    /// are inconsistent.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let mut file = match &self.config {
            Some(path) => FileConfig::load(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?,
            None => FileConfig::default(),
        };

        if let Some(bind) = self.bind {
            file.server.bind_address = bind;
        }
        if let Some(port) = self.port {
            file.server.port = port;
        }
        if let Some(format) = self.wire_format {
            file.server.wire_format = format;
        }
        if let Some(model) = self.model {
            file.detector.model_path = Some(model);
        }

        file.into_server_config().context("invalid configuration")
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// 1. CLI arguments are parsed and merged with the config file.
/// 2. `tracing_subscriber` is initialised; `RUST_LOG` wins over the
///    configured `log_level`.
/// 3. A Ctrl+C handler clears a shared `AtomicBool`.
/// 4. [`run_server`] accepts connections until the flag is cleared.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_server_config()?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.log_level))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        "face tracker starting: bind={}, wire_format={}",
        config.bind_addr, config.wire_format
    );

    // ── Graceful shutdown flag ─────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(config, running).await?;

    info!("face tracker stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
