//! Cooperative timer queue.
//!
//! The engine never sleeps. It records "wake me at `deadline` on behalf of
//! `generation`" here, and the host's event loop asks for the next deadline
//! and calls back into the engine once it has passed.

use std::time::Instant;

use super::guard::Generation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    pub deadline: Instant,
    pub generation: Generation,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    // Kept sorted by deadline; equal deadlines keep insertion order.
    timers: Vec<Timer>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, generation: Generation, deadline: Instant) {
        let at = self.timers.partition_point(|t| t.deadline <= deadline);
        self.timers.insert(
            at,
            Timer {
                deadline,
                generation,
            },
        );
    }

    /// Remove the earliest timer whose deadline has passed.
    pub fn pop_due(&mut self, now: Instant) -> Option<Timer> {
        match self.timers.first() {
            Some(t) if t.deadline <= now => Some(self.timers.remove(0)),
            _ => None,
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.first().map(|t| t.deadline)
    }

    /// Drop every timer owned by a generation before `generation`.
    pub fn cancel_older_than(&mut self, generation: Generation) -> usize {
        let before = self.timers.len();
        self.timers.retain(|t| t.generation >= generation);
        before - self.timers.len()
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}
