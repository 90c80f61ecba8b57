//! [`ActivityLog`] – per-endpoint last-access timestamps.
//!
//! Request handlers call [`ActivityLog::touch`] after a request has been
//! authorized; the supervision tick reads [`ActivityLog::last_access`] to
//! decide whether the operator is still connected.
//!
//! Each endpoint owns one `AtomicU64` slot holding nanoseconds since the
//! log's epoch (its creation instant).  Writers never block each other and
//! the most recent store wins, which is all the time-based policies need.
//! The key map itself sits behind an `RwLock` that is only write-locked the
//! first time a key is seen; pre-register known routes with
//! [`ActivityLog::track`] to keep the hot path read-only.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Sentinel key naming the "any endpoint" aggregate slot.
pub const ANY_ENDPOINT: &str = "*";

/// Concurrent last-access log shared between request handlers and the
/// supervision loop.
///
/// # Example
///
/// ```
/// use std::time::{Duration, Instant};
/// use rexbot_kernel::activity::ActivityLog;
///
/// let log = ActivityLog::new();
/// let t = Instant::now() + Duration::from_millis(5);
/// log.touch_at("/motors/config", t);
///
/// assert_eq!(log.last_access("/motors/config"), t);
/// assert_eq!(log.last_access_any(), t);
/// assert_eq!(log.last_access("/camera/jpeg"), log.epoch());
/// ```
#[derive(Debug)]
pub struct ActivityLog {
    epoch: Instant,
    any: AtomicU64,
    slots: RwLock<HashMap<String, Arc<AtomicU64>>>,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityLog {
    /// Create an empty log whose epoch is now.
    pub fn new() -> Self {
        Self::with_epoch(Instant::now())
    }

    /// Create an empty log with an explicit epoch.  Keys that have never been
    /// touched report `epoch` as their last access.
    pub fn with_epoch(epoch: Instant) -> Self {
        Self {
            epoch,
            any: AtomicU64::new(0),
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// The instant reported for keys that were never touched.
    pub fn epoch(&self) -> Instant {
        self.epoch
    }

    /// Pre-allocate a slot for `endpoint` without recording an access.
    pub fn track(&self, endpoint: &str) {
        if endpoint != ANY_ENDPOINT {
            self.slot(endpoint);
        }
    }

    /// Record an access to `endpoint` happening now.
    pub fn touch(&self, endpoint: &str) {
        self.touch_at(endpoint, Instant::now());
    }

    /// Record an access to `endpoint` at `at`, updating the aggregate slot as
    /// well.  Instants before the epoch are clamped to the epoch.
    pub fn touch_at(&self, endpoint: &str, at: Instant) {
        let offset = self.offset_of(at);
        if endpoint != ANY_ENDPOINT {
            self.slot(endpoint).store(offset, Ordering::Release);
        }
        self.any.store(offset, Ordering::Release);
    }

    /// Most recent access recorded for `endpoint`, or the epoch if none.
    ///
    /// Passing [`ANY_ENDPOINT`] is equivalent to [`ActivityLog::last_access_any`].
    pub fn last_access(&self, endpoint: &str) -> Instant {
        if endpoint == ANY_ENDPOINT {
            return self.last_access_any();
        }
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        let offset = slots
            .get(endpoint)
            .map(|slot| slot.load(Ordering::Acquire))
            .unwrap_or(0);
        self.instant_of(offset)
    }

    /// Most recent access recorded for any endpoint, or the epoch if none.
    pub fn last_access_any(&self) -> Instant {
        self.instant_of(self.any.load(Ordering::Acquire))
    }

    fn slot(&self, endpoint: &str) -> Arc<AtomicU64> {
        {
            let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(slot) = slots.get(endpoint) {
                return Arc::clone(slot);
            }
        }
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            slots
                .entry(endpoint.to_string())
                .or_insert_with(|| Arc::new(AtomicU64::new(0))),
        )
    }

    fn offset_of(&self, at: Instant) -> u64 {
        let nanos = at.saturating_duration_since(self.epoch).as_nanos();
        u64::try_from(nanos).unwrap_or(u64::MAX)
    }

    fn instant_of(&self, offset: u64) -> Instant {
        self.epoch + Duration::from_nanos(offset)
    }
}
