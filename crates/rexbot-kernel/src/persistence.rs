//! [`PersistenceScheduler`] – decides on which tick configuration is saved.
//!
//! The scheduler only counts; saving is the caller's job.  A forced save at
//! shutdown is independent of the periodic phase so that at most one tick of
//! changes can ever be lost.
//!
//! ```rust
//! use rexbot_kernel::persistence::PersistenceScheduler;
//!
//! let mut sched = PersistenceScheduler::new(3);
//! assert!(!sched.on_tick());
//! assert!(!sched.on_tick());
//! assert!(sched.on_tick()); // third tick → save now
//! assert_eq!(sched.counter(), 0);
//! ```

/// Number of ticks between periodic saves (one minute at the default tick).
pub const DEFAULT_SAVE_PERIOD_TICKS: u32 = 60;

/// Tick counter owned by the supervision loop.
#[derive(Debug, Clone)]
pub struct PersistenceScheduler {
    period: u32,
    counter: u32,
}

impl Default for PersistenceScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_SAVE_PERIOD_TICKS)
    }
}

impl PersistenceScheduler {
    /// Create a scheduler saving every `period` ticks.  A period of zero is
    /// treated as one.
    pub fn new(period: u32) -> Self {
        Self {
            period: period.max(1),
            counter: 0,
        }
    }

    /// Advance by one tick.  Returns `true` when configuration should be
    /// saved now, in which case the counter is reset.
    pub fn on_tick(&mut self) -> bool {
        self.counter += 1;
        if self.counter >= self.period {
            self.counter = 0;
            true
        } else {
            false
        }
    }

    /// Unconditional save request (used at shutdown).  Always returns `true`
    /// and restarts the periodic phase.
    pub fn force(&mut self) -> bool {
        self.counter = 0;
        true
    }

    /// Ticks accumulated since the last save.  Always `< period()`.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn period(&self) -> u32 {
        self.period
    }
}
