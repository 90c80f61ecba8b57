//! The request-dispatch layer as seen by the supervision loop.
//!
//! The transport owns the [`ActivityLog`][crate::activity::ActivityLog]
//! (it is the only writer) and exposes it read-only through
//! [`Transport::last_access`].  Handler registration stays on the concrete
//! transport type because the handler type belongs to it.

use std::time::Instant;

use rexbot_types::BotError;

/// Start/stop control plus read access to endpoint activity.
pub trait Transport: Send {
    /// Human-readable description of where the transport listens, for logs.
    fn endpoint(&self) -> String;

    /// Begin accepting requests.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Transport`] if the transport cannot start (e.g.
    /// the port is already bound).  Start is never retried.
    fn start(&mut self) -> Result<(), BotError>;

    /// Stop accepting requests and wait for in-flight handlers to finish.
    /// Calling `stop` on a transport that is not running is a no-op.
    fn stop(&mut self);

    /// Last successful access to `endpoint`, or to any endpoint when `None`.
    /// Reports the transport's creation instant when nothing was recorded.
    fn last_access(&self, endpoint: Option<&str>) -> Instant;
}
