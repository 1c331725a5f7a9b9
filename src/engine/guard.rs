//! Generation tokens: the only cancellation mechanism in the engine.
//!
//! Nothing in flight is ever forcibly stopped. Each request gets a fresh
//! `Generation`, and every continuation (preload completion, scheduler tick)
//! compares its token against the guard before touching shared state.

use std::fmt;

use super::timer::TimerQueue;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn get(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct GenerationGuard {
    current: Generation,
    disposed: bool,
}

impl GenerationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new authoritative request.
    ///
    /// Timers owned by earlier generations are cancelled here; everything
    /// else they started is suppressed later by `is_current`.
    pub fn begin_session(&mut self, timers: &mut TimerQueue) -> Generation {
        self.current = self.current.next();
        let cancelled = timers.cancel_older_than(self.current);
        if cancelled > 0 {
            log::debug!("{}: cancelled {cancelled} stale timer(s)", self.current);
        }
        self.current
    }

    /// True only for the latest generation of a display that is still alive.
    pub fn is_current(&self, generation: Generation) -> bool {
        !self.disposed && generation.0 != 0 && generation == self.current
    }

    /// Retire the current generation permanently.
    pub fn dispose(&mut self, timers: &mut TimerQueue) {
        self.current = self.current.next();
        self.disposed = true;
        timers.clear();
    }

    pub fn current(&self) -> Generation {
        self.current
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}
