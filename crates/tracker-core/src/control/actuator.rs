//! Bounded actuator state and the constants that shape the control loop.
//!
//! # The actuator counter
//!
//! The stepper has no position sensor.  The server instead keeps a signed
//! step counter, `delta_height`, which is the device height relative to where
//! it stood when the server started:
//!
//! ```text
//!  -bound ... -1  0  +1 ... +bound
//!   (lowest)     start      (highest)
//! ```
//!
//! The counter has exactly two transitions, `increment` (guard: `< bound`)
//! and `decrement` (guard: `> -bound`).  A transition whose guard fails is
//! suppressed, never clamped, so the counter cannot leave `[-bound, bound]`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default lower threshold as a fraction of image height.
pub const DEFAULT_LOW_FRACTION: f64 = 0.4;

/// Default upper threshold as a fraction of image height.
pub const DEFAULT_HIGH_FRACTION: f64 = 0.6;

/// Default travel limit of the stepper, in steps either side of start.
pub const DEFAULT_BOUND: i32 = 32;

/// Error returned by [`ControlPolicy::validate`].
#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    /// A threshold fraction is not strictly between 0 and 1.
    #[error("threshold fraction {0} must be strictly between 0 and 1")]
    FractionOutOfRange(f64),

    /// The low threshold is not strictly below the high threshold.
    #[error("low threshold {low} must be below high threshold {high}")]
    InvertedThresholds { low: f64, high: f64 },

    /// The travel bound is zero or negative.
    #[error("actuator bound must be positive, got {0}")]
    NonPositiveBound(i32),
}

/// Hysteresis thresholds and travel limit used by the control loop.
///
/// The defaults reproduce the deployed behaviour: thresholds at 40 % and
/// 60 % of image height and a travel of ±32 steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlPolicy {
    /// Below `low_fraction * H` the subject sits too high: move down.
    #[serde(default = "default_low_fraction")]
    pub low_fraction: f64,
    /// Above `high_fraction * H` the subject sits too low: move up.
    #[serde(default = "default_high_fraction")]
    pub high_fraction: f64,
    /// Maximum steps either side of the start position.
    #[serde(default = "default_bound")]
    pub bound: i32,
}

fn default_low_fraction() -> f64 {
    DEFAULT_LOW_FRACTION
}
fn default_high_fraction() -> f64 {
    DEFAULT_HIGH_FRACTION
}
fn default_bound() -> i32 {
    DEFAULT_BOUND
}

impl Default for ControlPolicy {
    fn default() -> Self {
        Self {
            low_fraction: DEFAULT_LOW_FRACTION,
            high_fraction: DEFAULT_HIGH_FRACTION,
            bound: DEFAULT_BOUND,
        }
    }
}

impl ControlPolicy {
    /// Checks that the thresholds form a non-empty deadband inside the frame
    /// and that the bound is positive.
    ///
    /// # Errors
    ///
    /// Returns the first [`PolicyError`] found.
    pub fn validate(&self) -> Result<(), PolicyError> {
        for fraction in [self.low_fraction, self.high_fraction] {
            if !(fraction > 0.0 && fraction < 1.0) {
                return Err(PolicyError::FractionOutOfRange(fraction));
            }
        }
        if self.low_fraction >= self.high_fraction {
            return Err(PolicyError::InvertedThresholds {
                low: self.low_fraction,
                high: self.high_fraction,
            });
        }
        if self.bound <= 0 {
            return Err(PolicyError::NonPositiveBound(self.bound));
        }
        Ok(())
    }

    /// Returns the `(low, high)` pixel thresholds for a frame of height `h`.
    pub fn thresholds(&self, image_height: i32) -> (f64, f64) {
        let h = f64::from(image_height);
        (h * self.low_fraction, h * self.high_fraction)
    }
}

/// The bounded step counter.
///
/// `ActuatorState` is deliberately not `Clone`: there is exactly one per
/// process and it lives inside the [`ControlLoop`](super::ControlLoop) lock.
#[derive(Debug)]
pub struct ActuatorState {
    delta_height: i32,
    bound: i32,
}

impl ActuatorState {
    /// Creates a counter at 0 with travel `[-bound, bound]`.
    pub fn new(bound: i32) -> Self {
        Self {
            delta_height: 0,
            bound,
        }
    }

    /// Current offset from the start position.
    pub fn delta_height(&self) -> i32 {
        self.delta_height
    }

    pub fn bound(&self) -> i32 {
        self.bound
    }

    /// Steps up by one if below the upper bound.  Returns whether it moved.
    pub fn try_increment(&mut self) -> bool {
        if self.delta_height < self.bound {
            self.delta_height += 1;
            true
        } else {
            false
        }
    }

    /// Steps down by one if above the lower bound.  Returns whether it moved.
    pub fn try_decrement(&mut self) -> bool {
        if self.delta_height > -self.bound {
            self.delta_height -= 1;
            true
        } else {
            false
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_matches_deployed_constants() {
        let policy = ControlPolicy::default();
        assert_eq!(policy.low_fraction, 0.4);
        assert_eq!(policy.high_fraction, 0.6);
        assert_eq!(policy.bound, 32);
    }

    #[test]
    fn test_default_policy_is_valid() {
        assert_eq!(ControlPolicy::default().validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let policy = ControlPolicy {
            low_fraction: 0.7,
            high_fraction: 0.3,
            bound: 32,
        };
        assert!(matches!(
            policy.validate(),
            Err(PolicyError::InvertedThresholds { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_equal_thresholds() {
        let policy = ControlPolicy {
            low_fraction: 0.5,
            high_fraction: 0.5,
            bound: 32,
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_fraction_outside_unit_interval() {
        let policy = ControlPolicy {
            low_fraction: 0.0,
            ..ControlPolicy::default()
        };
        assert_eq!(
            policy.validate(),
            Err(PolicyError::FractionOutOfRange(0.0))
        );

        let policy = ControlPolicy {
            high_fraction: 1.5,
            ..ControlPolicy::default()
        };
        assert_eq!(
            policy.validate(),
            Err(PolicyError::FractionOutOfRange(1.5))
        );
    }

    #[test]
    fn test_validate_rejects_nan_fraction() {
        let policy = ControlPolicy {
            low_fraction: f64::NAN,
            ..ControlPolicy::default()
        };
        assert!(matches!(
            policy.validate(),
            Err(PolicyError::FractionOutOfRange(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_bound() {
        let policy = ControlPolicy {
            bound: 0,
            ..ControlPolicy::default()
        };
        assert_eq!(policy.validate(), Err(PolicyError::NonPositiveBound(0)));
    }

    #[test]
    fn test_thresholds_scale_with_image_height() {
        let (low, high) = ControlPolicy::default().thresholds(100);
        assert!((low - 40.0).abs() < 1e-9);
        assert!((high - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_policy_deserializes_missing_fields_to_defaults() {
        // Arrange: only the bound is given
        let policy: ControlPolicy = serde_json::from_str(r#"{"bound": 10}"#).unwrap();

        // Assert
        assert_eq!(policy.bound, 10);
        assert_eq!(policy.low_fraction, DEFAULT_LOW_FRACTION);
        assert_eq!(policy.high_fraction, DEFAULT_HIGH_FRACTION);
    }

    #[test]
    fn test_actuator_starts_at_zero() {
        assert_eq!(ActuatorState::new(32).delta_height(), 0);
    }

    #[test]
    fn test_actuator_increment_stops_at_upper_bound() {
        // Arrange
        let mut state = ActuatorState::new(2);

        // Act
        assert!(state.try_increment());
        assert!(state.try_increment());
        let moved = state.try_increment();

        // Assert: third step is suppressed, not clamped
        assert!(!moved);
        assert_eq!(state.delta_height(), 2);
    }

    #[test]
    fn test_actuator_decrement_stops_at_lower_bound() {
        let mut state = ActuatorState::new(2);
        assert!(state.try_decrement());
        assert!(state.try_decrement());
        assert!(!state.try_decrement());
        assert_eq!(state.delta_height(), -2);
    }

    #[test]
    fn test_actuator_reports_configured_bound() {
        let state = ActuatorState::new(ControlPolicy::default().bound);
        assert_eq!(state.bound(), 32);
    }

    #[test]
    fn test_actuator_can_reverse_from_bound() {
        let mut state = ActuatorState::new(1);
        assert!(state.try_increment());
        assert!(state.try_decrement());
        assert_eq!(state.delta_height(), 0);
    }
}
