//! Lamport logical clock
//!
//! A single counter giving a partial causal order over events: local events
//! and sends advance it by one, receives jump past the larger of the two
//! clocks. All operations are lock-free read-modify-writes so one clock can
//! be shared by every task delivering into a node.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lamport clock shared across tasks
#[derive(Debug, Default)]
pub struct LogicalClock {
    time: AtomicU64,
}

impl LogicalClock {
    /// Create a clock starting at zero
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Create a clock at an arbitrary starting value
    pub fn starting_at(time: u64) -> Self {
        Self {
            time: AtomicU64::new(time),
        }
    }

    /// Record a local event
    pub fn tick(&self) {
        self.advance(|current| current);
    }

    /// Advance for an outgoing message and return the stamp to attach
    pub fn tick_for_send(&self) -> u64 {
        self.advance(|current| current)
    }

    /// Fold a received timestamp in: `time = max(time, received) + 1`
    pub fn merge(&self, received: u64) -> u64 {
        self.advance(|current| current.max(received))
    }

    /// Merge only if `received` is at most `max_lead` ahead of the local
    /// time and the result fits in a `u64`. Leaves the clock untouched and
    /// returns `None` otherwise.
    pub fn try_merge(&self, received: u64, max_lead: u64) -> Option<u64> {
        self.try_advance(|current| {
            if received > current.saturating_add(max_lead) {
                return None;
            }
            current.max(received).checked_add(1)
        })
    }

    /// Current logical time
    pub fn read(&self) -> u64 {
        self.time.load(Ordering::SeqCst)
    }

    fn advance(&self, base: impl Fn(u64) -> u64) -> u64 {
        match self.try_advance(|current| base(current).checked_add(1)) {
            Some(next) => next,
            None => panic!("logical clock exhausted the u64 range"),
        }
    }

    fn try_advance(&self, step: impl Fn(u64) -> Option<u64>) -> Option<u64> {
        let mut current = self.time.load(Ordering::SeqCst);
        loop {
            let next = step(current)?;
            match self
                .time
                .compare_exchange_weak(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return Some(next),
                Err(actual) => current = actual,
            }
        }
    }
}
