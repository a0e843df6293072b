//! Per-transport counters.
//!
//! Plain atomics; wire them to a metrics exporter in the binary layer.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct TransportStats {
    messages_delivered: AtomicU64,
    drain_tasks: AtomicU64,
    reschedules: AtomicU64,
    invalid_batches: AtomicU64,
}

/// Point-in-time copy of `TransportStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportStatsSnapshot {
    pub messages_delivered: u64,
    pub drain_tasks: u64,
    pub reschedules: u64,
    pub invalid_batches: u64,
}

impl TransportStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_delivered(&self) {
        self.messages_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_drain_task(&self) {
        self.drain_tasks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reschedule(&self) {
        self.reschedules.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invalid_batch(&self) {
        self.invalid_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn invalid_batches(&self) -> u64 {
        self.invalid_batches.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> TransportStatsSnapshot {
        TransportStatsSnapshot {
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            drain_tasks: self.drain_tasks.load(Ordering::Relaxed),
            reschedules: self.reschedules.load(Ordering::Relaxed),
            invalid_batches: self.invalid_batches.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let stats = TransportStats::new();
        stats.record_delivered();
        stats.record_delivered();
        stats.record_drain_task();
        stats.record_invalid_batch();
        let snap = stats.snapshot();
        assert_eq!(snap.messages_delivered, 2);
        assert_eq!(snap.drain_tasks, 1);
        assert_eq!(snap.reschedules, 0);
        assert_eq!(snap.invalid_batches, 1);
        assert_eq!(
            serde_json::to_value(snap).unwrap()["messages_delivered"],
            serde_json::json!(2)
        );
    }
}
