//! [`ShutdownSignal`] – one-shot exit flag with a blocking, timed wait.
//!
//! Every asynchronous shutdown trigger (OS signal handlers, fatal camera
//! errors) holds a clone and calls [`ShutdownSignal::signal`].  The
//! supervision loop parks in [`ShutdownSignal::wait_timeout`], which doubles
//! as its tick timer: it returns `false` when the tick elapses and `true` as
//! soon as the flag is raised.
//!
//! The flag is never reset.  Signal handlers must do nothing but call
//! [`signal`][ShutdownSignal::signal].

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct Inner {
    raised: Mutex<bool>,
    cond: Condvar,
}

/// Cloneable handle to a shared exit flag.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use rexbot_kernel::ShutdownSignal;
///
/// let exit = ShutdownSignal::new();
/// assert!(!exit.wait_timeout(Duration::from_millis(1)));
///
/// let remote = exit.clone();
/// assert!(remote.signal());
/// assert!(!remote.signal()); // already raised
/// assert!(exit.wait_timeout(Duration::from_secs(3600)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<Inner>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag and wake every waiter.
    ///
    /// Returns `true` if this call raised it, `false` if it was already set.
    pub fn signal(&self) -> bool {
        let mut raised = self
            .inner
            .raised
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *raised {
            return false;
        }
        *raised = true;
        self.inner.cond.notify_all();
        true
    }

    /// Non-blocking read of the flag.
    pub fn is_signaled(&self) -> bool {
        *self
            .inner
            .raised
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Block for at most `timeout` waiting for the flag.
    ///
    /// Returns `true` if the flag is raised (before or during the wait) and
    /// `false` if the timeout elapsed first.  Spurious wake-ups are absorbed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let raised = self
            .inner
            .raised
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (raised, _) = self
            .inner
            .cond
            .wait_timeout_while(raised, timeout, |raised| !*raised)
            .unwrap_or_else(PoisonError::into_inner);
        *raised
    }
}
