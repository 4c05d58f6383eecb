//! Outbound wire protocol: the stepper command and its text encodings.

pub mod command;

pub use command::{Command, CommandError, Direction, WireFormat};
