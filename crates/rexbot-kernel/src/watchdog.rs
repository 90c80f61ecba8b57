//! Inactivity watchdogs evaluated by the supervision tick.
//!
//! [`MotorSafetyWatchdog`] is the fail-safe interlock: when the operator
//! control endpoint has not been used for a full safety window the motors
//! must be stopped, whether or not anybody asked for it.  A browser that
//! crashes mid-drive, or a dropped Wi-Fi link, therefore halts the robot
//! within one window plus one tick.
//!
//! [`ActivityHeartbeat`] answers a weaker question ("has anyone talked to us
//! lately?") for the connection-activity LED.  It has no safety role and its
//! window is an independent setting.

use std::time::{Duration, Instant};

use crate::activity::ActivityLog;

// ────────────────────────────────────────────────────────────────────────────
// Defaults
// ────────────────────────────────────────────────────────────────────────────

/// Default inactivity window after which the motors are stopped.
pub const DEFAULT_MOTOR_SAFETY_WINDOW: Duration = Duration::from_millis(1000);

/// Default window during which the activity LED stays lit after a request.
pub const DEFAULT_ACTIVITY_WINDOW: Duration = Duration::from_millis(2000);

// ────────────────────────────────────────────────────────────────────────────
// MotorSafetyWatchdog
// ────────────────────────────────────────────────────────────────────────────

/// Stops actuation when the operator endpoint goes quiet.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use rexbot_kernel::{ActivityLog, MotorSafetyWatchdog};
///
/// let log = ActivityLog::new();
/// let wd = MotorSafetyWatchdog::new("/motors/config", Duration::from_millis(1000));
///
/// let t0 = log.epoch();
/// log.touch_at("/motors/config", t0);
/// assert!(!wd.should_stop(&log, t0 + Duration::from_millis(999)));
/// assert!(wd.should_stop(&log, t0 + Duration::from_millis(1000)));
/// ```
#[derive(Debug, Clone)]
pub struct MotorSafetyWatchdog {
    endpoint: String,
    window: Duration,
}

impl MotorSafetyWatchdog {
    /// Watch `endpoint` with the given inactivity `window`.
    pub fn new(endpoint: impl Into<String>, window: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            window,
        }
    }

    /// The endpoint whose activity keeps the motors alive.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The configured inactivity window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Time elapsed at `now` since the last access to the watched endpoint.
    pub fn idle_for(&self, log: &ActivityLog, now: Instant) -> Duration {
        self.idle_since(log.last_access(&self.endpoint), now)
    }

    /// Same as [`idle_for`][Self::idle_for] but takes the last access
    /// instant directly, for callers reading it from a transport.
    pub fn idle_since(&self, last_access: Instant, now: Instant) -> Duration {
        now.saturating_duration_since(last_access)
    }

    /// `true` when the motors must be stopped at `now`.
    pub fn should_stop(&self, log: &ActivityLog, now: Instant) -> bool {
        self.idle_for(log, now) >= self.window
    }

    /// [`should_stop`][Self::should_stop] against an explicit last access.
    pub fn should_stop_since(&self, last_access: Instant, now: Instant) -> bool {
        self.idle_since(last_access, now) >= self.window
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ActivityHeartbeat
// ────────────────────────────────────────────────────────────────────────────

/// Reports whether any endpoint was used within the activity window.
#[derive(Debug, Clone, Copy)]
pub struct ActivityHeartbeat {
    window: Duration,
}

impl Default for ActivityHeartbeat {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVITY_WINDOW)
    }
}

impl ActivityHeartbeat {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// `true` while the last access to any endpoint lies within the window.
    pub fn is_active(&self, log: &ActivityLog, now: Instant) -> bool {
        self.is_active_since(log.last_access_any(), now)
    }

    /// [`is_active`][Self::is_active] against an explicit last access.
    pub fn is_active_since(&self, last_access: Instant, now: Instant) -> bool {
        now.saturating_duration_since(last_access) < self.window
    }
}
