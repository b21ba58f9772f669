use crate::market::types::Observation;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Single-slot handoff between the feed and the render loop.
///
/// `put` never blocks on the consumer: an unclaimed value is replaced, not
/// queued. `take` returns the freshest value and clears the slot.
#[derive(Debug, Default)]
pub struct LatestSlot {
    pending: Mutex<Option<Observation>>,
    overwritten: AtomicU64,
}

impl LatestSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, observation: Observation) {
        let previous = self.pending.lock().replace(observation);
        if previous.is_some() {
            self.overwritten.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn take(&self) -> Option<Observation> {
        self.pending.lock().take()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_none()
    }

    /// Number of observations discarded because a newer one replaced them.
    pub fn overwritten(&self) -> u64 {
        self.overwritten.load(Ordering::Relaxed)
    }
}
