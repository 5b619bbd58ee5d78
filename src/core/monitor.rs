//! # Backlog monitor: periodic sampling with hysteresis.
//!
//! Samples the backlog estimate (produced minus processed) on a fixed
//! interval, publishes the sample, drives the automatic
//! `normal <-> overflow` transition, and feeds the autoscaler.
//!
//! ```text
//!                 backlog > high ──────────►
//!        normal ◄────────── backlog < low    overflow
//! ```
//!
//! ## Rules
//! - The sample is the backlog estimate, **not** the ingress queue depth.
//!   A message spilled to the overflow queue stays in the estimate until a
//!   drain task completes it, so recovery to `normal` means the spill has
//!   actually been worked off, not merely moved.
//! - Two watermarks (`high`, `low = high / 2`) form a hysteresis band: a
//!   backlog oscillating inside the band causes **zero** transitions.
//! - Only `normal` and `overflow` are auto-managed; a manually forced
//!   `selective` or `batch` strategy is never reverted by the monitor.
//! - The autoscaler is evaluated on every tick regardless of strategy.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::ControllerConfig;
use crate::core::autoscaler::Autoscaler;
use crate::core::strategy_ctl::StrategyController;
use crate::events::{Bus, Event, EventKind};
use crate::metrics::Counters;
use crate::strategy::Strategy;

pub(crate) struct BacklogMonitor {
    counters: Arc<Counters>,
    strategy: Arc<StrategyController>,
    autoscaler: Arc<Autoscaler>,
    bus: Bus,
    interval: Duration,
    high: u64,
    low: u64,
}

impl BacklogMonitor {
    pub fn new(
        config: &ControllerConfig,
        counters: Arc<Counters>,
        strategy: Arc<StrategyController>,
        autoscaler: Arc<Autoscaler>,
        bus: Bus,
    ) -> Self {
        Self {
            counters,
            strategy,
            autoscaler,
            bus,
            interval: config.monitor_interval,
            high: config.high_watermark,
            low: config.low_watermark(),
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let backlog = self.counters.backlog_estimate();
            let current = self.strategy.current();
            self.bus.publish(
                Event::new(EventKind::BacklogSampled)
                    .with_count(backlog)
                    .with_strategy(current),
            );

            if let Some(next) = decide(backlog, current, self.high, self.low) {
                self.strategy.transition(next).await;
            }
            self.autoscaler.evaluate(backlog).await;
        }
    }
}

/// Hysteresis decision for one sample.
///
/// Pure so the band behavior is testable without a runtime.
pub(crate) fn decide(backlog: u64, current: Strategy, high: u64, low: u64) -> Option<Strategy> {
    match current {
        Strategy::Normal if backlog > high => Some(Strategy::Overflow),
        Strategy::Overflow if backlog < low => Some(Strategy::Normal),
        _ => None,
    }
}
