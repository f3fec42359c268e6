//! Virtual clock and timer queue standing in for `setTimeout` chains.
//!
//! Nothing here sleeps. Whoever owns the [`Timeline`] is the tick source:
//! tests call [`Timeline::advance_by`] directly, the CLI sleeps on a Tokio
//! timer until [`Timeline::next_deadline`] and then advances to it.
//!
//! Work fires in `(due_ms, seq)` order, so two timers due at the same
//! instant fire in the order they were scheduled.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct TimerKey {
    due_ms: u64,
    seq: u64,
}

/// A timer queue keyed by virtual milliseconds.
#[derive(Debug)]
pub struct Timeline<T> {
    now_ms: u64,
    next_seq: u64,
    queue: BTreeMap<TimerKey, T>,
}

impl<T> Default for Timeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Timeline<T> {
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            next_seq: 0,
            queue: BTreeMap::new(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Schedule `work` to fire `delay_ms` after the current instant.
    pub fn schedule(&mut self, delay_ms: u64, work: T) {
        let key = TimerKey {
            due_ms: self.now_ms.saturating_add(delay_ms),
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.queue.insert(key, work);
    }

    /// Absolute virtual time of the earliest pending timer.
    pub fn next_deadline(&self) -> Option<u64> {
        self.queue.keys().next().map(|k| k.due_ms)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Pop the earliest timer due at or before `deadline_ms`, moving the
    /// clock to its due time. Callers loop on this so work scheduled while
    /// firing (the next line of a transcript) is considered in the same pass.
    pub fn pop_due(&mut self, deadline_ms: u64) -> Option<T> {
        let key = *self.queue.keys().next()?;
        if key.due_ms > deadline_ms {
            return None;
        }
        self.now_ms = self.now_ms.max(key.due_ms);
        self.queue.remove(&key)
    }

    /// Move the clock forward without firing anything. Used after draining
    /// every timer due by `deadline_ms`.
    pub fn settle_at(&mut self, deadline_ms: u64) {
        self.now_ms = self.now_ms.max(deadline_ms);
    }

    /// Drop every pending timer. The clock keeps its value.
    pub fn cancel_all(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }
}
