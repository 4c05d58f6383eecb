//! ConnectionRegistry: the set of open client connections.
//!
//! # Connection lifecycle (for beginners)
//!
//! ```text
//!   accept()                         remove() / close_all()
//!  ─────────►  Open  ───────────────────────────────►  Closed
//!              │  receives welcome + join notices          (terminal, never reused)
//!              │  receives every broadcast
//! ```
//!
//! Each connection owns a bounded channel of [`OUTBOUND_QUEUE_CAPACITY`]
//! messages whose receiving end is drained by a per-connection writer task
//! into the WebSocket sink.  Sending is a non-blocking `try_send`: the
//! registry never waits on a slow client, and a client that stops reading
//! only fails its own deliveries once its queue is full.
//!
//! # Snapshot-iterate-send
//!
//! [`ConnectionRegistry::broadcast`] copies the current handles out of the
//! map while holding the lock and sends after releasing it.  A connection
//! that joins or leaves mid-broadcast cannot disturb the iteration.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::Broadcast;

/// Messages that may wait in one connection's outbound queue.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 128;

/// Text sent to every connection immediately after it is accepted.
pub const WELCOME_MESSAGE: &str = "Welcome to the server!";

/// Builds the join notice broadcast when a connection is accepted.
pub fn join_notice(resource: &str) -> String {
    format!("new connection: {resource}")
}

// ── Connection identity ───────────────────────────────────────────────────────

/// Opaque identity of one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Closed,
}

/// Error returned when a message cannot be queued for a connection.
#[derive(Debug, Error, PartialEq)]
pub enum SendError {
    /// The connection was already removed from the registry.
    #[error("connection {0} is closed")]
    Closed(ConnectionId),

    /// The connection's writer task has exited (socket gone).
    #[error("connection {0} writer has gone away")]
    WriterGone(ConnectionId),

    /// The connection's outbound queue is full (the client stopped reading).
    #[error("connection {0} outbound queue is full")]
    Full(ConnectionId),
}

struct ConnectionInner {
    id: ConnectionId,
    remote_addr: SocketAddr,
    resource: String,
    outbound: Sender<WsMessage>,
    closed: AtomicBool,
}

/// Cheaply cloneable handle to one connection.
///
/// The session task, the registry and any in-flight broadcast snapshot each
/// hold a clone; the writer task exits once the last clone is dropped.
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<ConnectionInner>,
}

impl ConnectionHandle {
    /// Creates an Open handle whose messages are pushed into `outbound`.
    ///
    /// `resource` is the request-target of the WebSocket upgrade request.
    pub fn new(
        remote_addr: SocketAddr,
        resource: impl Into<String>,
        outbound: Sender<WsMessage>,
    ) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                id: ConnectionId::new(),
                remote_addr,
                resource: resource.into(),
                outbound,
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.inner.remote_addr
    }

    pub fn resource(&self) -> &str {
        &self.inner.resource
    }

    pub fn state(&self) -> ConnectionState {
        if self.inner.closed.load(Ordering::Acquire) {
            ConnectionState::Closed
        } else {
            ConnectionState::Open
        }
    }

    fn send(&self, message: WsMessage) -> Result<(), SendError> {
        if self.state() == ConnectionState::Closed {
            return Err(SendError::Closed(self.id()));
        }
        self.inner
            .outbound
            .try_send(message)
            .map_err(|e| match e {
                TrySendError::Full(_) => SendError::Full(self.id()),
                TrySendError::Closed(_) => SendError::WriterGone(self.id()),
            })
    }

    /// Transitions Open → Closed.  Returns `false` if already Closed.
    fn mark_closed(&self) -> bool {
        !self.inner.closed.swap(true, Ordering::AcqRel)
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.inner.id)
            .field("remote_addr", &self.inner.remote_addr)
            .field("resource", &self.inner.resource)
            .field("state", &self.state())
            .finish()
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Tracks every Open connection and delivers text to them.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnectionId, ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly opened connection, welcomes it, and announces it.
    ///
    /// The welcome is queued before the connection becomes visible to
    /// broadcasts, so it is always the first message the client sees.  The
    /// connection is registered before the join notice goes out, so it
    /// receives its own notice as well.
    pub fn accept(&self, conn: ConnectionHandle) {
        let resource = conn.resource().to_string();
        let remote_addr = conn.remote_addr();

        if let Err(e) = self.send(&conn, WELCOME_MESSAGE) {
            warn!("failed to welcome {remote_addr}: {e}");
        }
        self.lock().insert(conn.id(), conn.clone());
        self.broadcast(&join_notice(&resource));
        info!("new connection to {remote_addr} ({resource})");
    }

    /// Queues `text` for a single connection.
    ///
    /// # Errors
    ///
    /// Returns [`SendError`] if the connection is closed or its writer exited.
    pub fn send(&self, conn: &ConnectionHandle, text: &str) -> Result<(), SendError> {
        conn.send(WsMessage::Text(text.to_string()))
    }

    /// Sends `text` to every Open connection and returns how many accepted it.
    ///
    /// A failure on one connection is logged and delivery continues.
    pub fn broadcast(&self, text: &str) -> usize {
        let snapshot: Vec<ConnectionHandle> = self.lock().values().cloned().collect();

        let mut delivered = 0;
        for conn in &snapshot {
            match self.send(conn, text) {
                Ok(()) => delivered += 1,
                Err(e) => warn!("broadcast to {} failed: {e}", conn.remote_addr()),
            }
        }
        delivered
    }

    /// Marks `conn` Closed and drops it from the registry.
    ///
    /// Returns `false`, and does nothing, if the connection was already
    /// closed.
    pub fn remove(&self, conn: &ConnectionHandle, code: u16, reason: &str, remote: bool) -> bool {
        if !conn.mark_closed() {
            debug!("connection {} already closed", conn.id());
            return false;
        }
        self.lock().remove(&conn.id());
        info!(
            "closed {} with exit code {code} additional info: {reason} (remote: {remote})",
            conn.remote_addr()
        );
        true
    }

    /// Logs a transport error.  Closing is left to the transport's own close
    /// signal.
    pub fn on_error(&self, conn: &ConnectionHandle, err: &dyn std::error::Error) {
        error!(
            "an error occurred on connection {}: {err}",
            conn.remote_addr()
        );
    }

    /// Sends a Close frame to every Open connection and removes them all.
    ///
    /// Used at shutdown; the removals are logged as server-initiated.
    /// Returns the number of connections closed.
    pub fn close_all(&self, code: CloseCode, reason: &str) -> usize {
        let snapshot: Vec<ConnectionHandle> = self.lock().values().cloned().collect();

        let mut closed = 0;
        for conn in &snapshot {
            let frame = CloseFrame {
                code,
                reason: reason.to_string().into(),
            };
            if let Err(e) = conn.send(WsMessage::Close(Some(frame))) {
                debug!("close frame to {} not queued: {e}", conn.remote_addr());
            }
            if self.remove(conn, code.into(), reason, false) {
                closed += 1;
            }
        }
        closed
    }

    /// Number of Open connections.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().contains_key(&id)
    }

    /// The map holds only handles, which stay valid across a panic elsewhere,
    /// so a poisoned lock is recovered.
    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, ConnectionHandle>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Broadcast for ConnectionRegistry {
    fn broadcast(&self, text: &str) -> usize {
        ConnectionRegistry::broadcast(self, text)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    use tokio::sync::mpsc::{channel, Receiver};

    fn make_conn(port: u16, resource: &str) -> (ConnectionHandle, Receiver<WsMessage>) {
        let (tx, rx) = channel(OUTBOUND_QUEUE_CAPACITY);
        let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
        (ConnectionHandle::new(addr, resource, tx), rx)
    }

    /// Drains every queued text message.
    fn texts(rx: &mut Receiver<WsMessage>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let WsMessage::Text(text) = msg {
                out.push(text);
            }
        }
        out
    }

    #[test]
    fn test_accept_sends_welcome_then_own_join_notice() {
        // Arrange
        let registry = ConnectionRegistry::new();
        let (conn, mut rx) = make_conn(5000, "/cam");

        // Act
        registry.accept(conn);

        // Assert
        assert_eq!(
            texts(&mut rx),
            vec![WELCOME_MESSAGE.to_string(), "new connection: /cam".to_string()]
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_existing_connection_gets_one_notice_per_join() {
        // Arrange
        let registry = ConnectionRegistry::new();
        let (a, mut rx_a) = make_conn(5001, "/a");
        let (b, mut rx_b) = make_conn(5002, "/b");

        // Act
        registry.accept(a);
        let _ = texts(&mut rx_a);
        registry.accept(b);

        // Assert: A sees exactly one notice, for B
        assert_eq!(texts(&mut rx_a), vec!["new connection: /b".to_string()]);
        assert_eq!(texts(&mut rx_b).len(), 2);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (a, _rx) = make_conn(5003, "/");
        registry.accept(a.clone());

        assert!(registry.remove(&a, 1000, "bye", true));
        assert!(!registry.remove(&a, 1000, "bye", true));
        assert_eq!(a.state(), ConnectionState::Closed);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_removed_connection_receives_no_broadcasts() {
        let registry = ConnectionRegistry::new();
        let (a, mut rx_a) = make_conn(5004, "/");
        let (b, mut rx_b) = make_conn(5005, "/");
        registry.accept(a.clone());
        registry.accept(b);
        registry.remove(&a, 1000, "", true);
        let _ = texts(&mut rx_a);
        let _ = texts(&mut rx_b);

        let delivered = registry.broadcast("hello");

        assert_eq!(delivered, 1);
        assert!(texts(&mut rx_a).is_empty());
        assert_eq!(texts(&mut rx_b), vec!["hello".to_string()]);
    }

    #[test]
    fn test_broadcast_continues_past_dead_writer() {
        // Arrange: A's writer is gone (receiver dropped) but A is still registered
        let registry = ConnectionRegistry::new();
        let (a, rx_a) = make_conn(5006, "/");
        let (b, mut rx_b) = make_conn(5007, "/");
        registry.accept(a);
        registry.accept(b);
        drop(rx_a);
        let _ = texts(&mut rx_b);

        // Act
        let delivered = registry.broadcast("cmd");

        // Assert
        assert_eq!(delivered, 1);
        assert_eq!(texts(&mut rx_b), vec!["cmd".to_string()]);
    }

    #[test]
    fn test_send_to_closed_connection_fails() {
        let registry = ConnectionRegistry::new();
        let (a, _rx) = make_conn(5008, "/");
        registry.accept(a.clone());
        registry.remove(&a, 1000, "", true);

        assert_eq!(registry.send(&a, "x"), Err(SendError::Closed(a.id())));
    }

    #[test]
    fn test_close_all_sends_close_frames_and_empties_registry() {
        // Arrange
        let registry = ConnectionRegistry::new();
        let (a, mut rx_a) = make_conn(5009, "/");
        registry.accept(a.clone());
        let _ = texts(&mut rx_a);

        // Act
        let closed = registry.close_all(CloseCode::Away, "shutdown");

        // Assert
        assert_eq!(closed, 1);
        assert!(registry.is_empty());
        match rx_a.try_recv() {
            Ok(WsMessage::Close(Some(frame))) => {
                assert_eq!(frame.code, CloseCode::Away);
                assert_eq!(frame.reason, "shutdown");
            }
            other => panic!("expected close frame, got {other:?}"),
        }
        // A later transport-driven removal is a no-op.
        assert!(!registry.remove(&a, 1000, "", true));
    }

    #[test]
    fn test_on_error_does_not_close_connection() {
        let registry = ConnectionRegistry::new();
        let (a, _rx) = make_conn(5010, "/");
        registry.accept(a.clone());

        let err = std::io::Error::new(std::io::ErrorKind::Other, "reset");
        registry.on_error(&a, &err);

        assert_eq!(a.state(), ConnectionState::Open);
        assert!(registry.contains(a.id()));
    }

    #[test]
    fn test_connection_ids_are_unique() {
        let (a, _ra) = make_conn(5011, "/");
        let (b, _rb) = make_conn(5011, "/");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_stalled_connection_queue_stops_at_capacity() {
        // Arrange: A never reads; B is drained after every broadcast
        let registry = ConnectionRegistry::new();
        let (a, mut rx_a) = make_conn(5012, "/a");
        let (b, mut rx_b) = make_conn(5013, "/b");
        registry.accept(a.clone());
        registry.accept(b);
        let _ = texts(&mut rx_b);

        // Act
        let mut last_delivered = 0;
        let mut received_by_b = 0;
        for _ in 0..(OUTBOUND_QUEUE_CAPACITY * 4) {
            last_delivered = registry.broadcast("cmd");
            received_by_b += texts(&mut rx_b).len();
        }

        // Assert: A's queue is capped, B got every message
        assert_eq!(received_by_b, OUTBOUND_QUEUE_CAPACITY * 4);
        assert_eq!(last_delivered, 1);
        assert_eq!(registry.send(&a, "x"), Err(SendError::Full(a.id())));
        assert_eq!(texts(&mut rx_a).len(), OUTBOUND_QUEUE_CAPACITY);
        assert_eq!(a.state(), ConnectionState::Open);
    }

    #[test]
    fn test_welcome_is_first_message_under_concurrent_accepts() {
        // Arrange
        const CLIENTS: usize = 16;
        let registry = Arc::new(ConnectionRegistry::new());
        let barrier = Arc::new(Barrier::new(CLIENTS));

        // Act: every client joins at the same moment
        let handles: Vec<_> = (0..CLIENTS)
            .map(|i| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let (conn, rx) = make_conn(6000 + i as u16, "/");
                    barrier.wait();
                    registry.accept(conn);
                    rx
                })
            })
            .collect();

        // Assert
        for handle in handles {
            let mut rx = handle.join().unwrap();
            let received = texts(&mut rx);
            assert_eq!(received.first().map(String::as_str), Some(WELCOME_MESSAGE));
        }
        assert_eq!(registry.len(), CLIENTS);
    }
}
