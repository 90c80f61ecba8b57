//! Board-level indicators: the power LED and the connection-activity LED.
//!
//! LED failures are logged and otherwise ignored; an indicator must never
//! take the robot down.

use rexbot_types::BotError;
use tracing::warn;

/// A discrete on/off indicator wired to a GPIO pin.
pub trait StatusLed: Send {
    /// Stable identifier for this LED, e.g. `"power"`.
    fn id(&self) -> &str;

    /// Drive the LED (`true` = lit).
    ///
    /// # Errors
    ///
    /// Returns [`BotError::HardwareFault`] if the pin cannot be written.
    fn set_state(&mut self, on: bool) -> Result<(), BotError>;

    /// Return the LED's current state.
    fn state(&self) -> bool;
}

/// The robot's indicator LEDs.  Either LED may be absent.
#[derive(Default)]
pub struct Board {
    power: Option<Box<dyn StatusLed>>,
    activity: Option<Box<dyn StatusLed>>,
}

impl Board {
    /// A board without any indicators.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_power_led(mut self, led: Box<dyn StatusLed>) -> Self {
        self.power = Some(led);
        self
    }

    pub fn with_activity_led(mut self, led: Box<dyn StatusLed>) -> Self {
        self.activity = Some(led);
        self
    }

    /// Power LED on, activity LED off.
    pub fn init(&mut self) {
        drive(self.power.as_mut(), true);
        drive(self.activity.as_mut(), false);
    }

    /// Light the activity LED while clients are talking to the robot.
    /// The pin is only written when the state changes.
    pub fn set_activity(&mut self, active: bool) {
        if let Some(led) = self.activity.as_mut()
            && led.state() != active
        {
            drive(Some(led), active);
        }
    }

    /// Both LEDs off.
    pub fn release(&mut self) {
        drive(self.power.as_mut(), false);
        drive(self.activity.as_mut(), false);
    }
}

fn drive(led: Option<&mut Box<dyn StatusLed>>, on: bool) {
    if let Some(led) = led
        && let Err(e) = led.set_state(on)
    {
        warn!(led = led.id(), on, error = %e, "failed to drive status LED");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimLed;

    struct StuckLed;

    impl StatusLed for StuckLed {
        fn id(&self) -> &str {
            "stuck"
        }

        fn set_state(&mut self, _on: bool) -> Result<(), BotError> {
            Err(BotError::HardwareFault {
                component: "stuck".to_string(),
                details: "gpio export failed".to_string(),
            })
        }

        fn state(&self) -> bool {
            false
        }
    }

    #[test]
    fn init_and_release_drive_both_leds() {
        let power = SimLed::new("power");
        let activity = SimLed::new("activity");
        let (p, a) = (power.handle(), activity.handle());
        let mut board = Board::new()
            .with_power_led(Box::new(power))
            .with_activity_led(Box::new(activity));

        board.init();
        assert!(p.is_on());
        assert!(!a.is_on());

        board.set_activity(true);
        assert!(a.is_on());

        board.release();
        assert!(!p.is_on());
        assert!(!a.is_on());
    }

    #[test]
    fn activity_writes_only_on_change() {
        let activity = SimLed::new("activity");
        let a = activity.handle();
        let mut board = Board::new().with_activity_led(Box::new(activity));
        board.init();
        let writes = a.writes();
        board.set_activity(false);
        board.set_activity(false);
        assert_eq!(a.writes(), writes);
        board.set_activity(true);
        assert_eq!(a.writes(), writes + 1);
    }

    #[test]
    fn failing_led_does_not_panic() {
        let mut board = Board::new().with_power_led(Box::new(StuckLed));
        board.init();
        board.release();
    }

    #[test]
    fn board_without_leds_is_inert() {
        let mut board = Board::new();
        board.init();
        board.set_activity(true);
        board.release();
    }
}
