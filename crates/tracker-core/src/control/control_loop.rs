//! ControlLoop: turns detected faces into stepper commands.
//!
//! # Algorithm
//!
//! For a frame of height `H`:
//!
//! 1. No faces → nothing to do.
//! 2. Each face gets a metric `h = H - (y + height / 2)`; the smallest `h`
//!    (the face nearest the bottom of the frame) is the dominant one.
//! 3. The dominant metric is compared against two thresholds:
//!
//! ```text
//!   0 ─────────── 0.4·H ═════════ 0.6·H ─────────── H
//!      "down"        deadband (no action)     "up"
//! ```
//!
//! Using two thresholds instead of one (hysteresis) means a face hovering
//! near the centre never toggles the stepper back and forth.
//!
//! # Concurrency
//!
//! Frames from different connections may be evaluated at the same time on
//! different worker threads.  The bound check, the counter update and the
//! command emission all run while the [`ActuatorState`] mutex is held, so two
//! evaluations can never both pass the same bound check, and the order of
//! emitted commands always matches the order of counter transitions.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use crate::control::actuator::{ActuatorState, ControlPolicy};
use crate::domain::face::FrameContext;
use crate::protocol::command::{Command, Direction};

/// Receiver for commands produced by the control loop.
///
/// `emit` is called with the actuator lock held, so implementations must not
/// block; queueing onto a channel is the expected pattern.
pub trait CommandSink: Send + Sync {
    fn emit(&self, command: &Command);
}

/// Outcome of one [`ControlLoop::evaluate`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The frame contained no faces.
    NoFaces,
    /// No face had its centre inside the frame height (dominant metric ≥ H).
    OutOfFrame,
    /// The dominant face sits inside the deadband.
    Deadband,
    /// A threshold was crossed but the actuator is already at that bound.
    Saturated(Direction),
    /// The actuator moved one step and a command was emitted.
    Moved {
        direction: Direction,
        delta_height: i32,
    },
}

impl Verdict {
    /// Returns the command that was emitted for this verdict, if any.
    pub fn command(&self) -> Option<Command> {
        match self {
            Verdict::Moved { direction, .. } => Some(Command::new(*direction)),
            _ => None,
        }
    }
}

/// Owns the process-wide actuator state and evaluates frames against it.
pub struct ControlLoop {
    policy: ControlPolicy,
    state: Mutex<ActuatorState>,
}

impl ControlLoop {
    /// Creates a loop with the actuator at 0.
    pub fn new(policy: ControlPolicy) -> Self {
        Self {
            state: Mutex::new(ActuatorState::new(policy.bound)),
            policy,
        }
    }

    pub fn policy(&self) -> &ControlPolicy {
        &self.policy
    }

    /// Current actuator offset.
    pub fn delta_height(&self) -> i32 {
        self.lock_state().delta_height()
    }

    /// Evaluates one frame, updating the actuator and emitting at most one
    /// command to `sink`.
    pub fn evaluate(&self, ctx: &FrameContext, sink: &dyn CommandSink) -> Verdict {
        let Some(min_h) = ctx.dominant_metric() else {
            trace!("no faces in frame");
            return Verdict::NoFaces;
        };

        // The search for the minimum starts at H; a frame whose faces all
        // measure ≥ H never moves the actuator.
        if min_h >= ctx.image_height {
            debug!(
                "dominant face metric {min_h} not below image height {}; ignoring",
                ctx.image_height
            );
            return Verdict::OutOfFrame;
        }

        let Some(direction) = self.classify(min_h, ctx.image_height) else {
            trace!("dominant face metric {min_h} inside deadband");
            return Verdict::Deadband;
        };

        let mut state = self.lock_state();
        let moved = match direction {
            Direction::Down => state.try_decrement(),
            Direction::Up => state.try_increment(),
        };
        if !moved {
            debug!(
                "actuator saturated at {} (travel ±{}); suppressing {direction}",
                state.delta_height(),
                state.bound()
            );
            return Verdict::Saturated(direction);
        }

        let delta_height = state.delta_height();
        sink.emit(&Command::new(direction));
        drop(state);

        debug!("stepper {direction}: delta_height now {delta_height} (metric {min_h})");
        Verdict::Moved {
            direction,
            delta_height,
        }
    }

    /// Maps a dominant metric onto a direction, or `None` inside the deadband.
    fn classify(&self, min_h: i32, image_height: i32) -> Option<Direction> {
        let (low, high) = self.policy.thresholds(image_height);
        let min_h = f64::from(min_h);
        if min_h < low {
            Some(Direction::Down)
        } else if min_h > high {
            Some(Direction::Up)
        } else {
            None
        }
    }

    /// The counter is a plain integer that is always valid, so a poisoned
    /// lock is recovered rather than propagated.
    fn lock_state(&self) -> MutexGuard<'_, ActuatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ControlLoop {
    fn default() -> Self {
        Self::new(ControlPolicy::default())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
