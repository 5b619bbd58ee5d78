//! # Shared backlog counters and status snapshots.
//!
//! [`Counters`] is the single explicitly-owned mutable state all components
//! share (besides the queues themselves). Every field is an atomic with a
//! narrow writer set:
//!
//! - `total_produced` — incremented by the producer path on accepted enqueue
//! - `total_processed` — incremented by primary workers and overflow drain
//!   tasks, only after a unit of work completes
//! - `dropped` — incremented for intentional selective-mode drops (these are
//!   *also* counted as processed; the counter exists to tell shedding apart
//!   from real throughput)
//! - `in_flight` — messages claimed by workers but not yet committed or
//!   requeued
//!
//! The backlog estimate is `total_produced − total_processed` (saturating);
//! it approximates unconsumed work without asking the queues, so the monitor
//! never contends with producers or consumers.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::strategy::Strategy;

/// Monotonic counters shared by reference across all components.
#[derive(Debug, Default)]
pub struct Counters {
    total_produced: AtomicU64,
    total_processed: AtomicU64,
    dropped: AtomicU64,
    in_flight: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets all counters to zero. Called only on controller start.
    pub(crate) fn reset(&self) {
        self.total_produced.store(0, Ordering::Relaxed);
        self.total_processed.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
        self.in_flight.store(0, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_produced(&self) {
        self.total_produced.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_processed(&self, n: u64) {
        self.total_processed.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn claim(&self, n: u64) {
        self.in_flight.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn release(&self, n: u64) {
        self.in_flight.fetch_sub(n, Ordering::Relaxed);
    }

    /// Total messages accepted into the controller.
    #[inline]
    pub fn total_produced(&self) -> u64 {
        self.total_produced.load(Ordering::Relaxed)
    }

    /// Total units of work completed (includes intentional drops).
    #[inline]
    pub fn total_processed(&self) -> u64 {
        self.total_processed.load(Ordering::Relaxed)
    }

    /// Intentionally shed messages (subset of `total_processed`).
    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Messages currently claimed by workers.
    #[inline]
    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Produced minus processed, saturating at zero.
    ///
    /// Approximates outstanding work; always `≥ 0` because processing is
    /// only counted for accepted messages.
    #[inline]
    pub fn backlog_estimate(&self) -> u64 {
        self.total_produced()
            .saturating_sub(self.total_processed())
    }
}

/// Point-in-time view of the controller, returned by
/// [`BacklogController::status`](crate::BacklogController::status).
///
/// Consistent only to within one monitor tick: fields are read from
/// independent atomics, not under a global lock.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerStatus {
    /// Strategy currently applied to claimed messages.
    pub strategy: Strategy,
    /// Primary queue depth.
    pub queue_size: usize,
    /// Total messages accepted.
    pub total_produced: u64,
    /// Total units of work completed.
    pub total_processed: u64,
    /// Produced minus processed.
    pub backlog_estimate: u64,
    /// Intentionally shed messages.
    pub dropped: u64,
    /// Messages claimed but not yet committed or requeued.
    pub in_flight: u64,
    /// Workers currently running.
    pub active_workers: usize,
    /// Worker count the pool is converging to.
    pub target_workers: usize,
    /// Overflow queue depth.
    pub overflow_queue_size: usize,
    /// Messages completed by overflow drain tasks.
    pub overflow_processed: u64,
    /// Current simulated per-message cost, in milliseconds.
    pub consume_delay_ms: u64,
    /// Whether the controller is started.
    pub running: bool,
}

impl ControllerStatus {
    /// One-line human-readable summary.
    ///
    /// # Example
    /// ```
    /// use floodgate::{ControllerStatus, Strategy};
    ///
    /// let status = ControllerStatus {
    ///     strategy: Strategy::Normal,
    ///     queue_size: 3,
    ///     total_produced: 10,
    ///     total_processed: 7,
    ///     backlog_estimate: 3,
    ///     dropped: 0,
    ///     in_flight: 0,
    ///     active_workers: 2,
    ///     target_workers: 2,
    ///     overflow_queue_size: 0,
    ///     overflow_processed: 0,
    ///     consume_delay_ms: 200,
    ///     running: true,
    /// };
    /// assert!(status.summary().contains("strategy=normal"));
    /// ```
    pub fn summary(&self) -> String {
        format!(
            "produced={} processed={} backlog={} queue={} overflow={} workers={}/{} strategy={}",
            self.total_produced,
            self.total_processed,
            self.backlog_estimate,
            self.queue_size,
            self.overflow_queue_size,
            self.active_workers,
            self.target_workers,
            self.strategy,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backlog_estimate_saturates() {
        let c = Counters::new();
        c.record_processed(5);
        assert_eq!(c.backlog_estimate(), 0);
    }

    #[test]
    fn test_counters_flow() {
        let c = Counters::new();
        for _ in 0..10 {
            c.record_produced();
        }
        c.claim(4);
        assert_eq!(c.in_flight(), 4);
        c.record_processed(4);
        c.release(4);
        assert_eq!(c.backlog_estimate(), 6);
        assert_eq!(c.in_flight(), 0);

        c.reset();
        assert_eq!(c.total_produced(), 0);
        assert_eq!(c.backlog_estimate(), 0);
    }
}
