//! WebSocket server: accept loop and per-session task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting incoming TCP connections from camera clients and dashboards.
//! 3. Upgrading each connection to a WebSocket session and recording the
//!    request-target as the connection's resource descriptor.
//! 4. Running one writer task per session that drains the connection's
//!    outbound queue (welcome, join notices, stepper commands).
//! 5. Reading inbound frames in order: text is logged, binary frames go
//!    through the [`FrameHandler`] on a blocking worker.
//! 6. Closing every session when the `running` flag is cleared.
//!
//! # Ordering
//!
//! A session awaits the handling of one binary frame before it reads the
//! next, so frames from one connection are evaluated in arrival order.
//! Frames from different connections run concurrently on Tokio's blocking
//! pool; the control loop serialises their effect on the actuator.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        protocol::frame::coding::CloseCode,
        Message as WsMessage,
    },
};
use tracing::{debug, error, info, warn};
use tracker_core::ControlLoop;

use crate::application::{Broadcast, CommandBroadcaster, FrameHandler};
use crate::domain::config::ServerConfig;
use crate::domain::frame::FrameDecoder;
use crate::domain::locator::FaceLocator;
use crate::infrastructure::connection_registry::{
    ConnectionHandle, ConnectionRegistry, OUTBOUND_QUEUE_CAPACITY,
};
use crate::infrastructure::detector::build_locator;
use crate::infrastructure::image_decoder::ImageDecoder;

/// Close code recorded when the peer closed without a status code.
const NO_STATUS_CODE: u16 = 1005;
/// Close code recorded when the connection ended without a Close frame.
const ABNORMAL_CLOSE_CODE: u16 = 1006;

/// How often the accept loop wakes up to check the `running` flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

// ── Shared state ──────────────────────────────────────────────────────────────

/// Everything a session needs, shared by all sessions of one server.
pub struct ServerContext {
    registry: Arc<ConnectionRegistry>,
    frames: FrameHandler,
}

impl ServerContext {
    /// Builds the production wiring: `image` decoder, the configured face
    /// detector (if any) and a control loop broadcasting to all connections.
    pub fn from_config(config: &ServerConfig) -> Self {
        let locator = build_locator(&config.detector);
        Self::with_parts(Arc::new(ImageDecoder::new()), locator, config)
    }

    /// Builds a context around a caller-supplied decoder and locator.
    pub fn with_parts(
        decoder: Arc<dyn FrameDecoder>,
        locator: Option<Arc<dyn FaceLocator>>,
        config: &ServerConfig,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let target: Arc<dyn Broadcast> = registry.clone();
        let sink = Arc::new(CommandBroadcaster::new(target, config.wire_format));
        let control = Arc::new(ControlLoop::new(config.control));

        Self {
            registry,
            frames: FrameHandler::new(decoder, locator, control, sink),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn frames(&self) -> &FrameHandler {
        &self.frames
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Runs the tracking server until `running` is set to `false`.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot be bound (e.g., the port is
/// already in use or the process lacks permission to bind).
pub async fn run_server(config: ServerConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {}", config.bind_addr))?;

    let ctx = Arc::new(ServerContext::from_config(&config));
    serve(listener, ctx, running).await
}

/// Accepts connections on an already-bound `listener` until `running` is
/// cleared, then closes every open session.
///
/// # Errors
///
/// Returns an error if the listener's local address cannot be read.
pub async fn serve(
    listener: TcpListener,
    ctx: Arc<ServerContext>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let local_addr = listener
        .local_addr()
        .context("failed to read listener address")?;
    let policy = ctx.frames.control().policy();
    info!(
        "server started successfully on {local_addr} (detector: {}, thresholds {}/{}, travel ±{})",
        if ctx.frames.detector_available() {
            "available"
        } else {
            "unavailable"
        },
        policy.low_fraction,
        policy.high_fraction,
        policy.bound
    );

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // Short timeout so the loop notices the shutdown flag while idle.
        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("TCP connection from {peer_addr}");
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    handle_session(stream, peer_addr, ctx).await;
                });
            }
            Ok(Err(e)) => {
                // Transient accept error (e.g., too many open file descriptors).
                error!("accept error: {e}");
            }
            Err(_) => {}
        }
    }

    let closed = ctx.registry.close_all(CloseCode::Away, "server shutting down");
    info!("server stopped; closed {closed} connection(s)");
    Ok(())
}

// ── Per-session handler ───────────────────────────────────────────────────────

/// Entry point of each per-session task; logs how the session ended.
async fn handle_session(stream: TcpStream, peer_addr: SocketAddr, ctx: Arc<ServerContext>) {
    if let Err(e) = run_session(stream, peer_addr, ctx).await {
        warn!("session {peer_addr} ended with error: {e:#}");
    }
}

/// Runs one WebSocket session from handshake to close.
///
/// # Errors
///
/// Returns an error only if the WebSocket handshake fails; errors after the
/// handshake are reported through the registry and end the session normally.
async fn run_session(
    stream: TcpStream,
    peer_addr: SocketAddr,
    ctx: Arc<ServerContext>,
) -> anyhow::Result<()> {
    // ── Handshake ──────────────────────────────────────────────────────────────
    let mut resource = String::from("/");
    let capture_resource = |req: &Request, resp: Response| {
        resource = req.uri().to_string();
        Ok::<Response, ErrorResponse>(resp)
    };
    let ws_stream = accept_hdr_async(stream, capture_resource)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    // ── Writer task ────────────────────────────────────────────────────────────
    //
    // Everything addressed to this connection goes through `outbound`, which
    // holds at most OUTBOUND_QUEUE_CAPACITY messages; the task exits once the Close frame is written or every sender is dropped.
    let (outbound, mut queued) = mpsc::channel::<WsMessage>(OUTBOUND_QUEUE_CAPACITY);
    let writer = tokio::spawn(async move {
        while let Some(message) = queued.recv().await {
            let closing = matches!(message, WsMessage::Close(_));
            if let Err(e) = ws_tx.send(message).await {
                debug!("session {peer_addr}: WebSocket send failed: {e}");
                return;
            }
            if closing {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    let conn = ConnectionHandle::new(peer_addr, resource, outbound);
    ctx.registry.accept(conn.clone());

    // ── Reader loop ────────────────────────────────────────────────────────────
    let (code, reason, remote) = loop {
        match ws_rx.next().await {
            Some(Ok(WsMessage::Text(text))) => {
                info!("received message from {peer_addr}: {text}");
            }
            Some(Ok(WsMessage::Binary(bytes))) => {
                let frames = ctx.frames.clone();
                let peer = peer_addr.to_string();
                match tokio::task::spawn_blocking(move || frames.handle(&peer, &bytes)).await {
                    Ok(outcome) => debug!("session {peer_addr}: frame {outcome:?}"),
                    Err(e) => error!("session {peer_addr}: frame handler panicked: {e}"),
                }
            }
            Some(Ok(WsMessage::Ping(data))) => {
                debug!("session {peer_addr}: WebSocket ping ({} bytes)", data.len());
            }
            Some(Ok(WsMessage::Pong(_))) => {
                debug!("session {peer_addr}: WebSocket pong received");
            }
            Some(Ok(WsMessage::Close(frame))) => {
                break match frame {
                    Some(frame) => (u16::from(frame.code), frame.reason.into_owned(), true),
                    None => (NO_STATUS_CODE, String::new(), true),
                };
            }
            Some(Ok(WsMessage::Frame(_))) => {}
            Some(Err(e)) => {
                ctx.registry.on_error(&conn, &e);
                break (ABNORMAL_CLOSE_CODE, e.to_string(), false);
            }
            None => break (ABNORMAL_CLOSE_CODE, String::new(), true),
        }
    };

    ctx.registry.remove(&conn, code, &reason, remote);

    // The handle owns the last sender; dropping it lets the writer finish
    // flushing the close handshake.
    drop(conn);
    if let Err(e) = writer.await {
        debug!("session {peer_addr}: writer task failed: {e}");
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
