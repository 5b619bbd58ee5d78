//! # Controller configuration.
//!
//! Provides [`ControllerConfig`], the centralized settings for the backlog
//! controller runtime: queue capacities, worker-pool bounds, backlog
//! thresholds, simulated processing costs, and the event bus capacity.
//!
//! Config is consumed once when building a
//! [`BacklogController`](crate::BacklogController); the only values that can
//! change afterwards are the worker target (via scaling) and the consume
//! delay (via [`set_consume_delay`](crate::BacklogController::set_consume_delay)).
//!
//! ## Sentinel values
//! - `batch_size = 0` → treated as 1 (a worker always claims at least one message)
//! - `bus_capacity = 0` → treated as 1 (clamped by the bus)
//!
//! ## Hysteresis
//! The low watermark is always `high_watermark / 2`; it is derived, not a
//! field, so the band cannot be misconfigured into an oscillating pair.

use std::time::Duration;

/// Configuration for the backlog controller.
///
/// ## Field groups
/// - **Queues**: `queue_capacity`, `overflow_capacity`, `offer_timeout`, `poll_timeout`
/// - **Worker pool**: `min_workers`, `max_workers`, `initial_workers`, `batch_size`
/// - **Overflow drain**: `overflow_workers`, `overflow_delay`
/// - **Backlog monitor**: `monitor_interval`, `high_watermark`
/// - **Autoscaler**: `scale_up_threshold`, `scale_down_threshold`, `scale_up_step`, `scale_down_step`
/// - **Simulated costs**: `consume_delay`, `batch_unit_delay`
/// - **Events**: `bus_capacity`
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Capacity of the primary ingress queue.
    ///
    /// `enqueue` reports backpressure (`false`) once the queue is full and
    /// the offer timeout elapses.
    pub queue_capacity: usize,

    /// Capacity of the overflow queue (independent of the primary, larger).
    pub overflow_capacity: usize,

    /// Number of dedicated drain tasks for the overflow queue (fixed size).
    pub overflow_workers: usize,

    /// Floor for the primary worker count. Scaling never goes below this.
    pub min_workers: usize,

    /// Ceiling for the primary worker count. Scaling never goes above this.
    pub max_workers: usize,

    /// Worker count the pool starts with (clamped into `[min, max]`).
    pub initial_workers: usize,

    /// Maximum number of messages a worker claims per iteration.
    ///
    /// The first message is claimed with a timed poll; the rest of the batch
    /// is taken non-blocking, so an almost-empty queue never stalls a worker.
    pub batch_size: usize,

    /// Backlog estimate above which the monitor switches `Normal → Overflow`.
    ///
    /// The reverse switch happens below `high_watermark / 2` (hysteresis).
    pub high_watermark: u64,

    /// Backlog estimate above which the autoscaler adds workers.
    pub scale_up_threshold: u64,

    /// Backlog estimate below which the autoscaler removes workers.
    pub scale_down_threshold: u64,

    /// Workers added per scale-up (capped at `max_workers`).
    pub scale_up_step: usize,

    /// Workers removed per scale-down (capped at `min_workers`).
    ///
    /// Smaller than the up step so recovery is aggressive and relaxation is
    /// gentle.
    pub scale_down_step: usize,

    /// Interval between backlog monitor ticks.
    pub monitor_interval: Duration,

    /// Initial simulated per-message cost for normal processing.
    ///
    /// Runtime-tunable through the control API; selective high-priority
    /// processing uses half of the current value.
    pub consume_delay: Duration,

    /// Simulated per-message cost of an overflow drain task (cheap path).
    pub overflow_delay: Duration,

    /// Simulated per-message share of a batch unit's cost.
    pub batch_unit_delay: Duration,

    /// How long a producer waits for queue space before `enqueue` gives up.
    pub offer_timeout: Duration,

    /// How long a consumer waits for a message before re-checking shutdown.
    ///
    /// Bounds shutdown latency: every worker observes a stop request within
    /// one poll interval.
    pub poll_timeout: Duration,

    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,
}

impl ControllerConfig {
    /// Low watermark of the hysteresis band (`high_watermark / 2`).
    #[inline]
    pub fn low_watermark(&self) -> u64 {
        self.high_watermark / 2
    }

    /// Batch size clamped to a minimum of 1.
    #[inline]
    pub fn batch_size_clamped(&self) -> usize {
        self.batch_size.max(1)
    }

    /// Bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Worker bounds with `min ≤ max` enforced and the initial count clamped
    /// into them.
    pub(crate) fn worker_bounds(&self) -> (usize, usize, usize) {
        let min = self.min_workers.max(1);
        let max = self.max_workers.max(min);
        let initial = self.initial_workers.clamp(min, max);
        (min, max, initial)
    }
}

impl Default for ControllerConfig {
    /// Defaults mirror the reference deployment:
    ///
    /// - primary queue 2 000, overflow queue 10 000 with 10 drain tasks
    /// - workers: 2..=20, start at 2, claim up to 100 messages per iteration
    /// - high watermark 1 000 (low = 500), monitor every 5 s
    /// - autoscaler: up above 1 000 by +5, down below 100 by −2
    /// - simulated costs: 200 ms normal, 50 ms overflow, 10 ms per batched message
    /// - offers and polls wait 100 ms
    fn default() -> Self {
        Self {
            queue_capacity: 2_000,
            overflow_capacity: 10_000,
            overflow_workers: 10,
            min_workers: 2,
            max_workers: 20,
            initial_workers: 2,
            batch_size: 100,
            high_watermark: 1_000,
            scale_up_threshold: 1_000,
            scale_down_threshold: 100,
            scale_up_step: 5,
            scale_down_step: 2,
            monitor_interval: Duration::from_secs(5),
            consume_delay: Duration::from_millis(200),
            overflow_delay: Duration::from_millis(50),
            batch_unit_delay: Duration::from_millis(10),
            offer_timeout: Duration::from_millis(100),
            poll_timeout: Duration::from_millis(100),
            bus_capacity: 1024,
        }
    }
}
