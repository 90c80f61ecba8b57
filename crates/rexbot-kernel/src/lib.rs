//! `rexbot-kernel` – Safety & Supervision
//!
//! The policy core of RexBot.  It owns no hardware and speaks no protocol; it
//! decides who may do what, remembers when each endpoint was last used, and
//! tells the supervision loop when to stop the motors, when to save, and when
//! to exit.
//!
//! # Modules
//!
//! - [`access_policy`] – [`resolve_policy`][access_policy::resolve_policy]:
//!   derives the (viewer, operator) [`EffectivePolicy`][rexbot_types::EffectivePolicy]
//!   from defaults, overrides and the presence of a credentials store.
//! - [`activity`] – [`ActivityLog`][activity::ActivityLog]:
//!   lock-free per-endpoint last-access timestamps written by request
//!   handlers and read by the supervision tick.
//! - [`watchdog`] – [`MotorSafetyWatchdog`][watchdog::MotorSafetyWatchdog]
//!   and [`ActivityHeartbeat`][watchdog::ActivityHeartbeat]: inactivity
//!   predicates evaluated once per tick.
//! - [`persistence`] – [`PersistenceScheduler`][persistence::PersistenceScheduler]:
//!   decides on which tick device configuration is saved.
//! - [`shutdown`] – [`ShutdownSignal`][shutdown::ShutdownSignal]:
//!   one-shot, condition-variable backed exit flag shared by signal handlers,
//!   fatal-error callbacks and the supervision loop.
//! - [`transport`] – [`Transport`][transport::Transport]: the narrow view of
//!   the request-dispatch layer that the supervision loop depends on.

pub mod access_policy;
pub mod activity;
pub mod persistence;
pub mod shutdown;
pub mod transport;
pub mod watchdog;

pub use access_policy::{PolicyInputs, PolicyResolution, PolicyWarning, resolve_policy};
pub use activity::{ANY_ENDPOINT, ActivityLog};
pub use persistence::{DEFAULT_SAVE_PERIOD_TICKS, PersistenceScheduler};
pub use shutdown::ShutdownSignal;
pub use transport::Transport;
pub use watchdog::{
    ActivityHeartbeat, DEFAULT_ACTIVITY_WINDOW, DEFAULT_MOTOR_SAFETY_WINDOW, MotorSafetyWatchdog,
};
