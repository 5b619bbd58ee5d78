//! # Strategy transitions, serialized.
//!
//! The current strategy lives in a lock-free cell so workers can read it
//! per claim, but *changing* it goes through [`StrategyController`], which
//! serializes transitions and keeps the overflow drain pool in step:
//!
//! ## Rules
//! - Transitions are serialized by an async mutex; readers never block.
//! - Entering overflow starts the drain pool **before** the new strategy
//!   becomes visible, so the first spilled message always finds a running
//!   drain.
//! - Leaving overflow stops the drain pool (and waits for it) **before**
//!   the switch, so no drain task observes a non-overflow strategy.
//! - Anything still in the spill queue after the drains join is handed
//!   back to the primary queue, so residual spill (below the recovery
//!   watermark) is finished by the primary workers instead of stranding.
//! - A transition to the current strategy is a no-op.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::events::{Bus, Event, EventKind};
use crate::queue::{BoundedQueue, OverflowService};
use crate::strategy::{Strategy, StrategyCell};

pub(crate) struct StrategyController {
    cell: Arc<StrategyCell>,
    transitions: Mutex<()>,
    queue: Arc<BoundedQueue>,
    overflow: Arc<OverflowService>,
    bus: Bus,
}

impl StrategyController {
    pub fn new(
        cell: Arc<StrategyCell>,
        queue: Arc<BoundedQueue>,
        overflow: Arc<OverflowService>,
        bus: Bus,
    ) -> Self {
        Self {
            cell,
            transitions: Mutex::new(()),
            queue,
            overflow,
            bus,
        }
    }

    #[inline]
    pub fn current(&self) -> Strategy {
        self.cell.load()
    }

    /// Switches to `next`, managing the overflow drain pool across the
    /// boundary. Returns `false` when already in `next`.
    pub async fn transition(&self, next: Strategy) -> bool {
        let _serialized = self.transitions.lock().await;

        let current = self.cell.load();
        if current == next {
            return false;
        }

        if current == Strategy::Overflow {
            self.overflow.stop().await;
            let leftover = self.overflow.take_remaining();
            if !leftover.is_empty() {
                self.bus.publish(
                    Event::new(EventKind::RetryScheduled)
                        .with_count(leftover.len() as u64)
                        .with_reason("overflow drain stopped"),
                );
                self.queue.requeue_front(leftover);
            }
        }
        if next == Strategy::Overflow {
            self.overflow.start().await;
        }

        self.cell.store(next);
        self.bus.publish(
            Event::new(EventKind::StrategyChanged)
                .with_strategy(next)
                .with_reason(format!("from {current}")),
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::events::Bus;
    use crate::metrics::Counters;
    use crate::processor::NoopProcessor;

    fn controller() -> StrategyController {
        let bus = Bus::new(64);
        let overflow = Arc::new(OverflowService::new(
            &ControllerConfig::default(),
            Arc::new(NoopProcessor),
            Arc::new(Counters::new()),
            bus.clone(),
        ));
        StrategyController::new(
            Arc::new(StrategyCell::new(Strategy::Normal)),
            Arc::new(BoundedQueue::new(64)),
            overflow,
            bus,
        )
    }

    #[tokio::test]
    async fn test_same_strategy_is_noop() {
        let ctl = controller();
        assert!(!ctl.transition(Strategy::Normal).await);
        assert_eq!(ctl.current(), Strategy::Normal);
    }

    #[tokio::test]
    async fn test_entering_overflow_starts_drain() {
        let ctl = controller();
        assert!(ctl.transition(Strategy::Overflow).await);
        assert_eq!(ctl.current(), Strategy::Overflow);
        assert!(ctl.overflow.is_running());
    }

    #[tokio::test]
    async fn test_leaving_overflow_stops_drain() {
        let ctl = controller();
        ctl.transition(Strategy::Overflow).await;
        assert!(ctl.transition(Strategy::Batch).await);
        assert_eq!(ctl.current(), Strategy::Batch);
        assert!(!ctl.overflow.is_running());
    }

    #[tokio::test]
    async fn test_leaving_overflow_hands_residual_spill_back() {
        use crate::message::Message;

        let ctl = controller();
        ctl.transition(Strategy::Overflow).await;
        ctl.overflow.stop().await;
        for n in 0..4 {
            assert!(ctl.overflow.enqueue(Message::sample(n)).await);
        }

        assert!(ctl.transition(Strategy::Normal).await);
        assert_eq!(ctl.overflow.size(), 0);
        assert_eq!(ctl.queue.size(), 4);
    }

    #[tokio::test]
    async fn test_switch_between_non_overflow_strategies() {
        let ctl = controller();
        assert!(ctl.transition(Strategy::Selective).await);
        assert!(ctl.transition(Strategy::Batch).await);
        assert_eq!(ctl.current(), Strategy::Batch);
        assert!(!ctl.overflow.is_running());
    }
}
