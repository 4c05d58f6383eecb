//! CommandBroadcaster: renders stepper commands and fans them out.
//!
//! Delivery is fire-and-forget.  No acknowledgement is awaited and a failed
//! send to one listener never stops delivery to the others; that policy is
//! enforced by the [`Broadcast`] implementation.

use std::sync::Arc;

use tracing::{error, info};
use tracker_core::{Command, CommandSink, WireFormat};

/// Something that can deliver one text message to every open connection.
///
/// Implemented by the connection registry; tests use a recording double.
pub trait Broadcast: Send + Sync {
    /// Sends `text` to every open connection and returns how many accepted it.
    fn broadcast(&self, text: &str) -> usize;
}

/// [`CommandSink`] that encodes each command and broadcasts it.
pub struct CommandBroadcaster {
    target: Arc<dyn Broadcast>,
    format: WireFormat,
}

impl CommandBroadcaster {
    pub fn new(target: Arc<dyn Broadcast>, format: WireFormat) -> Self {
        Self { target, format }
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }
}

impl CommandSink for CommandBroadcaster {
    fn emit(&self, command: &Command) {
        match command.encode(self.format) {
            Ok(text) => {
                let delivered = self.target.broadcast(&text);
                info!(
                    "broadcast stepper command '{}' to {delivered} connection(s)",
                    command.status
                );
            }
            Err(e) => error!("dropping stepper command '{}': {e}", command.status),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tracker_core::Direction;

    #[derive(Default)]
    struct RecordingBroadcast {
        sent: Mutex<Vec<String>>,
    }

    impl Broadcast for RecordingBroadcast {
        fn broadcast(&self, text: &str) -> usize {
            self.sent.lock().unwrap().push(text.to_string());
            1
        }
    }

    #[test]
    fn test_emit_broadcasts_legacy_text() {
        // Arrange
        let target = Arc::new(RecordingBroadcast::default());
        let broadcaster = CommandBroadcaster::new(target.clone(), WireFormat::Legacy);

        // Act
        broadcaster.emit(&Command::new(Direction::Down));

        // Assert
        let sent = target.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0],
            "{\n    msgType: \"command\",\n    deviceType: \"stepper\",\n    status: \"down\",\n  }"
        );
    }

    #[test]
    fn test_emit_broadcasts_json_when_configured() {
        let target = Arc::new(RecordingBroadcast::default());
        let broadcaster = CommandBroadcaster::new(target.clone(), WireFormat::Json);

        broadcaster.emit(&Command::new(Direction::Up));

        let sent = target.sent.lock().unwrap();
        let value: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(value["status"], "up");
    }

    #[test]
    fn test_each_emit_is_one_broadcast() {
        let target = Arc::new(RecordingBroadcast::default());
        let broadcaster = CommandBroadcaster::new(target.clone(), WireFormat::Legacy);

        broadcaster.emit(&Command::new(Direction::Up));
        broadcaster.emit(&Command::new(Direction::Up));

        assert_eq!(target.sent.lock().unwrap().len(), 2);
        assert_eq!(broadcaster.format(), WireFormat::Legacy);
    }
}
