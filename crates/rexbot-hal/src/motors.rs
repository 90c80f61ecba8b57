//! Differential-drive motors.
//!
//! A [`MotorDriver`] talks to the H-bridge; [`MotorsController`] wraps it
//! with validation, remembers the commanded power, and exposes two
//! surfaces:
//!
//! - [`Configurable`] with properties `left` and `right` (integer power,
//!   −100..=100), written by the operator endpoint;
//! - [`ActuatorControl`], whose idempotent [`stop`][ActuatorControl::stop] is
//!   called by the safety watchdog on every inactive tick.

use std::sync::{Mutex, PoisonError};

use rexbot_types::{BotError, PropertyMap};
use tracing::{debug, error};

use crate::configurable::{Configurable, parse_ranged};

/// Lowest accepted power value (full reverse).
pub const MIN_POWER: i8 = -100;
/// Highest accepted power value (full forward).
pub const MAX_POWER: i8 = 100;

/// Low-level motor driver (H-bridge, PWM controller, …).
pub trait MotorDriver: Send {
    /// Stable identifier, e.g. `"l298n"`.
    fn id(&self) -> &str;

    /// Apply power to both sides.  `0` means coast/brake.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::HardwareFault`] if the command cannot be applied.
    fn set_power(&mut self, left: i8, right: i8) -> Result<(), BotError>;
}

/// The part of an actuator controller the supervision loop needs.
pub trait ActuatorControl: Send + Sync {
    /// Halt all motion.  Calling it on a stopped actuator is a no-op and
    /// never an error.
    fn stop(&self);

    /// `true` while any motor has non-zero power.
    fn is_moving(&self) -> bool;
}

struct MotorState {
    driver: Box<dyn MotorDriver>,
    left: i8,
    right: i8,
}

/// Validating controller in front of a [`MotorDriver`].
///
/// # Example
///
/// ```
/// use rexbot_hal::motors::{ActuatorControl, MotorsController};
/// use rexbot_hal::sim::SimMotorDriver;
/// use rexbot_hal::Configurable;
///
/// let driver = SimMotorDriver::new();
/// let commands = driver.commands();
/// let motors = MotorsController::new(Box::new(driver));
///
/// motors.set_property("left", "40").unwrap();
/// assert!(motors.is_moving());
///
/// motors.stop();
/// motors.stop(); // already stopped: driver is not touched again
/// assert_eq!(commands.lock().unwrap().as_slice(), &[(40, 0), (0, 0)]);
/// ```
pub struct MotorsController {
    state: Mutex<MotorState>,
}

impl MotorsController {
    pub fn new(driver: Box<dyn MotorDriver>) -> Self {
        Self {
            state: Mutex::new(MotorState {
                driver,
                left: 0,
                right: 0,
            }),
        }
    }

    /// Currently commanded (left, right) power.
    pub fn power(&self) -> (i8, i8) {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        (state.left, state.right)
    }

    /// Command both sides at once.
    pub fn set_power(&self, left: i8, right: i8) -> Result<(), BotError> {
        for (name, value) in [("left", left), ("right", right)] {
            if !(MIN_POWER..=MAX_POWER).contains(&value) {
                return Err(BotError::invalid(name, &value.to_string()));
            }
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        apply(&mut state, left, right)
    }
}

fn apply(state: &mut MotorState, left: i8, right: i8) -> Result<(), BotError> {
    state.driver.set_power(left, right)?;
    state.left = left;
    state.right = right;
    debug!(driver = state.driver.id(), left, right, "motor power applied");
    Ok(())
}

impl Configurable for MotorsController {
    fn properties(&self) -> PropertyMap {
        let (left, right) = self.power();
        PropertyMap::from([
            ("left".to_string(), left.to_string()),
            ("right".to_string(), right.to_string()),
        ])
    }

    fn set_property(&self, name: &str, value: &str) -> Result<(), BotError> {
        let min = i32::from(MIN_POWER);
        let max = i32::from(MAX_POWER);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let (left, right) = match name {
            "left" => (parse_power(name, value, min, max)?, state.right),
            "right" => (state.left, parse_power(name, value, min, max)?),
            _ => return Err(BotError::UnknownProperty(name.to_string())),
        };
        apply(&mut state, left, right)
    }
}

fn parse_power(name: &str, value: &str, min: i32, max: i32) -> Result<i8, BotError> {
    let v = parse_ranged(name, value, min, max)?;
    i8::try_from(v).map_err(|_| BotError::invalid(name, value))
}

impl ActuatorControl for MotorsController {
    fn stop(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.left == 0 && state.right == 0 {
            return;
        }
        if let Err(e) = apply(&mut state, 0, 0) {
            error!(driver = state.driver.id(), error = %e, "failed to stop motors");
        }
    }

    fn is_moving(&self) -> bool {
        let (left, right) = self.power();
        left != 0 || right != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimMotorDriver;

    /// Driver that refuses every command.
    struct BrokenDriver;

    impl MotorDriver for BrokenDriver {
        fn id(&self) -> &str {
            "broken"
        }

        fn set_power(&mut self, _left: i8, _right: i8) -> Result<(), BotError> {
            Err(BotError::HardwareFault {
                component: "broken".to_string(),
                details: "no response".to_string(),
            })
        }
    }

    fn sim() -> (MotorsController, std::sync::Arc<Mutex<Vec<(i8, i8)>>>) {
        let driver = SimMotorDriver::new();
        let commands = driver.commands();
        (MotorsController::new(Box::new(driver)), commands)
    }

    #[test]
    fn properties_reflect_commanded_power() {
        let (motors, _) = sim();
        motors.set_property("left", "25").unwrap();
        motors.set_property("right", "-30").unwrap();
        let props = motors.properties();
        assert_eq!(props["left"], "25");
        assert_eq!(props["right"], "-30");
        assert_eq!(motors.power(), (25, -30));
    }

    #[test]
    fn out_of_range_power_is_rejected() {
        let (motors, commands) = sim();
        assert!(matches!(
            motors.set_property("left", "101"),
            Err(BotError::InvalidProperty { .. })
        ));
        assert!(motors.set_property("right", "fast").is_err());
        assert!(motors.set_power(-120, 0).is_err());
        assert!(commands.lock().unwrap().is_empty());
    }

    #[test]
    fn unknown_property_is_rejected() {
        let (motors, _) = sim();
        assert_eq!(
            motors.set_property("speed", "10"),
            Err(BotError::UnknownProperty("speed".into()))
        );
    }

    #[test]
    fn stop_is_idempotent() {
        let (motors, commands) = sim();
        motors.set_power(50, 50).unwrap();
        for _ in 0..5 {
            motors.stop();
        }
        assert!(!motors.is_moving());
        assert_eq!(commands.lock().unwrap().as_slice(), &[(50, 50), (0, 0)]);
    }

    #[test]
    fn stop_on_stopped_motors_never_reaches_driver() {
        let motors = MotorsController::new(Box::new(BrokenDriver));
        motors.stop();
        assert!(!motors.is_moving());
    }

    #[test]
    fn driver_fault_keeps_previous_state() {
        let motors = MotorsController::new(Box::new(BrokenDriver));
        assert!(matches!(
            motors.set_property("left", "10"),
            Err(BotError::HardwareFault { .. })
        ));
        assert_eq!(motors.power(), (0, 0));
    }
}
