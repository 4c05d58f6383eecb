//! The stepper command and its wire encodings.
//!
//! # Wire formats
//!
//! Listeners deployed alongside the original server match the command text
//! literally, so the default [`WireFormat::Legacy`] encoding reproduces it
//! byte for byte, including unquoted keys and the trailing comma:
//!
//! ```text
//! {
//!     msgType: "command",
//!     deviceType: "stepper",
//!     status: "up",
//!   }
//! ```
//!
//! [`WireFormat::Json`] is an opt-in strict-JSON rendering of the same three
//! fields for listeners that use a real JSON parser:
//!
//! ```text
//! {"msgType":"command","deviceType":"stepper","status":"up"}
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Value of the `msgType` field for every command.
pub const MSG_TYPE: &str = "command";

/// Value of the `deviceType` field for every command.
pub const DEVICE_TYPE: &str = "stepper";

/// Errors produced while encoding or parsing commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// JSON serialization failed.
    #[error("failed to serialize command: {0}")]
    Serialize(#[from] serde_json::Error),

    /// An unknown wire-format name was supplied.
    #[error("unknown wire format '{0}' (expected 'legacy' or 'json')")]
    UnknownWireFormat(String),
}

/// Direction of a single stepper move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// The `status` field value for this direction.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound stepper instruction.
///
/// `msgType` and `deviceType` are fixed, so only the direction is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub status: Direction,
}

/// Serde view of a command with the fixed fields filled in.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommandJson {
    msg_type: &'static str,
    device_type: &'static str,
    status: Direction,
}

impl Command {
    pub fn new(status: Direction) -> Self {
        Self { status }
    }

    /// Renders the command in the given wire format.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Serialize`] if JSON encoding fails.  The legacy
    /// encoding cannot fail.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tracker_core::{Command, Direction, WireFormat};
    ///
    /// let text = Command::new(Direction::Up).encode(WireFormat::Json).unwrap();
    /// assert_eq!(text, r#"{"msgType":"command","deviceType":"stepper","status":"up"}"#);
    /// ```
    pub fn encode(&self, format: WireFormat) -> Result<String, CommandError> {
        match format {
            WireFormat::Legacy => Ok(self.to_legacy_text()),
            WireFormat::Json => Ok(serde_json::to_string(&CommandJson {
                msg_type: MSG_TYPE,
                device_type: DEVICE_TYPE,
                status: self.status,
            })?),
        }
    }

    fn to_legacy_text(&self) -> String {
        format!(
            "{{\n    msgType: \"{MSG_TYPE}\",\n    deviceType: \"{DEVICE_TYPE}\",\n    status: \"{}\",\n  }}",
            self.status
        )
    }
}

/// Text encoding used for outbound commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// Byte-exact text expected by existing listeners (default).
    #[default]
    Legacy,
    /// Strict JSON object with the same three fields.
    Json,
}

impl FromStr for WireFormat {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(WireFormat::Legacy),
            "json" => Ok(WireFormat::Json),
            other => Err(CommandError::UnknownWireFormat(other.to_string())),
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WireFormat::Legacy => "legacy",
            WireFormat::Json => "json",
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_down_is_byte_exact() {
        let text = Command::new(Direction::Down)
            .encode(WireFormat::Legacy)
            .unwrap();
        assert_eq!(
            text,
            "{\n    msgType: \"command\",\n    deviceType: \"stepper\",\n    status: \"down\",\n  }"
        );
    }

    #[test]
    fn test_legacy_up_is_byte_exact() {
        let text = Command::new(Direction::Up)
            .encode(WireFormat::Legacy)
            .unwrap();
        assert_eq!(
            text,
            "{\n    msgType: \"command\",\n    deviceType: \"stepper\",\n    status: \"up\",\n  }"
        );
    }

    #[test]
    fn test_json_encoding_is_parseable() {
        // Arrange / Act
        let text = Command::new(Direction::Down)
            .encode(WireFormat::Json)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        // Assert
        assert_eq!(value["msgType"], "command");
        assert_eq!(value["deviceType"], "stepper");
        assert_eq!(value["status"], "down");
    }

    #[test]
    fn test_direction_display_matches_status_field() {
        assert_eq!(Direction::Up.to_string(), "up");
        assert_eq!(Direction::Down.to_string(), "down");
    }

    #[test]
    fn test_wire_format_default_is_legacy() {
        assert_eq!(WireFormat::default(), WireFormat::Legacy);
    }

    #[test]
    fn test_wire_format_from_str_is_case_insensitive() {
        assert_eq!("JSON".parse::<WireFormat>().unwrap(), WireFormat::Json);
        assert_eq!(" legacy ".parse::<WireFormat>().unwrap(), WireFormat::Legacy);
    }

    #[test]
    fn test_wire_format_from_str_rejects_unknown() {
        let result = "xml".parse::<WireFormat>();
        assert!(matches!(result, Err(CommandError::UnknownWireFormat(name)) if name == "xml"));
    }

    #[test]
    fn test_wire_format_display_parses_back() {
        for format in [WireFormat::Legacy, WireFormat::Json] {
            assert_eq!(format.to_string().parse::<WireFormat>().unwrap(), format);
        }
    }
}
