//! Position control: bounded actuator state and the hysteresis loop that
//! drives it.

pub mod actuator;
pub mod control_loop;

pub use actuator::{ActuatorState, ControlPolicy, PolicyError};
pub use control_loop::{CommandSink, ControlLoop, Verdict};
