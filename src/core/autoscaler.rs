//! # Autoscaler: backlog-driven worker sizing.
//!
//! Evaluated once per monitor tick with the sampled backlog:
//!
//! ```text
//!   backlog > scale_up_threshold   ──► target += scale_up_step   (cap: max)
//!   backlog < scale_down_threshold ──► target -= scale_down_step (floor: min)
//! ```
//!
//! ## Rules
//! - At most one resize is in flight at a time; an evaluation arriving
//!   while another is applying is skipped, not queued.
//! - Steps are fixed, not proportional; thresholds and steps come from
//!   [`ControllerConfig`](crate::ControllerConfig).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::ControllerConfig;
use crate::core::pool::WorkerPool;
use crate::events::{Bus, Event, EventKind};

pub(crate) struct Autoscaler {
    pool: Arc<WorkerPool>,
    bus: Bus,
    scale_up_threshold: u64,
    scale_down_threshold: u64,
    scale_up_step: usize,
    scale_down_step: usize,
    scaling: AtomicBool,
}

impl Autoscaler {
    pub fn new(config: &ControllerConfig, pool: Arc<WorkerPool>, bus: Bus) -> Self {
        Self {
            pool,
            bus,
            scale_up_threshold: config.scale_up_threshold,
            scale_down_threshold: config.scale_down_threshold,
            scale_up_step: config.scale_up_step.max(1),
            scale_down_step: config.scale_down_step.max(1),
            scaling: AtomicBool::new(false),
        }
    }

    /// Applies at most one scaling step for the sampled backlog.
    pub async fn evaluate(&self, backlog: u64) {
        if self
            .scaling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let target = self.pool.target();
        if backlog > self.scale_up_threshold && target < self.pool.max() {
            let applied = self.pool.resize_to(target + self.scale_up_step).await;
            self.bus.publish(
                Event::new(EventKind::ScaleUp)
                    .with_count(applied as u64)
                    .with_reason(format!("{target} -> {applied}, backlog {backlog}")),
            );
        } else if backlog < self.scale_down_threshold && target > self.pool.min() {
            let applied = self
                .pool
                .resize_to(target.saturating_sub(self.scale_down_step))
                .await;
            self.bus.publish(
                Event::new(EventKind::ScaleDown)
                    .with_count(applied as u64)
                    .with_reason(format!("{target} -> {applied}, backlog {backlog}")),
            );
        }

        self.scaling.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::worker::WorkerShared;
    use crate::metrics::Counters;
    use crate::processor::NoopProcessor;
    use crate::queue::{BoundedQueue, OverflowService};
    use crate::strategy::StrategyCell;
    use std::sync::atomic::{AtomicU64, AtomicUsize};
    use tokio_util::sync::CancellationToken;

    fn fixture() -> (Autoscaler, Arc<WorkerPool>) {
        let mut config = ControllerConfig::default();
        config.min_workers = 2;
        config.max_workers = 8;
        config.scale_up_threshold = 100;
        config.scale_down_threshold = 10;
        config.scale_up_step = 5;
        config.scale_down_step = 2;

        let bus = Bus::new(64);
        let counters = Arc::new(Counters::new());
        let overflow = Arc::new(OverflowService::new(
            &config,
            Arc::new(NoopProcessor),
            Arc::clone(&counters),
            bus.clone(),
        ));
        let shared = Arc::new(WorkerShared {
            queue: Arc::new(BoundedQueue::new(config.queue_capacity)),
            overflow,
            processor: Arc::new(NoopProcessor),
            counters,
            strategy: Arc::new(StrategyCell::new(Default::default())),
            bus: bus.clone(),
            consume_delay_ms: AtomicU64::new(0),
            batch_size: config.batch_size,
            batch_unit_delay: config.batch_unit_delay,
            poll_timeout: config.poll_timeout,
            target: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
        });
        // Spawned workers idle against an empty queue; the tests only
        // assert target arithmetic.
        let cancel = CancellationToken::new();
        let pool = Arc::new(WorkerPool::new(
            shared,
            config.min_workers,
            config.max_workers,
            cancel,
        ));
        (Autoscaler::new(&config, Arc::clone(&pool), bus), pool)
    }

    #[tokio::test]
    async fn test_scale_up_steps_and_caps_at_max() {
        let (scaler, pool) = fixture();
        pool.resize_to(2).await;

        scaler.evaluate(500).await;
        assert_eq!(pool.target(), 7);
        scaler.evaluate(500).await;
        assert_eq!(pool.target(), 8);
        scaler.evaluate(500).await;
        assert_eq!(pool.target(), 8);
    }

    #[tokio::test]
    async fn test_scale_down_steps_and_floors_at_min() {
        let (scaler, pool) = fixture();
        pool.resize_to(7).await;

        scaler.evaluate(0).await;
        assert_eq!(pool.target(), 5);
        scaler.evaluate(0).await;
        assert_eq!(pool.target(), 3);
        scaler.evaluate(0).await;
        assert_eq!(pool.target(), 2);
        scaler.evaluate(0).await;
        assert_eq!(pool.target(), 2);
    }

    #[tokio::test]
    async fn test_in_band_backlog_leaves_target_alone() {
        let (scaler, pool) = fixture();
        pool.resize_to(4).await;

        scaler.evaluate(50).await;
        assert_eq!(pool.target(), 4);
    }
}
