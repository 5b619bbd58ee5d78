//! # Controller facade: lifecycle, control API, status.
//!
//! [`BacklogController`] wires the queues, the worker pool, the overflow
//! drain, the backlog monitor, the autoscaler, and the event plumbing into
//! one unit with an idempotent `start`/`stop` lifecycle:
//!
//! ```text
//!   producers ──► enqueue ──► [BoundedQueue] ──► workers ──► processor
//!                                  │                │  └─► overflow spill
//!                                  ▼                ▼
//!                           backlog monitor      counters
//!                            │        │
//!                       strategy   autoscaler
//! ```
//!
//! ## Rules
//! - `start` resets counters and the strategy to normal; state never
//!   survives a restart.
//! - `stop` is graceful: workers and drain tasks finish their current
//!   claim, nothing is interrupted mid-message.
//! - Control-API misuse (unknown strategy name, out-of-range worker
//!   count) is rejected synchronously with [`ControlError`] and mutates
//!   nothing.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ControllerConfig;
use crate::core::autoscaler::Autoscaler;
use crate::core::monitor::BacklogMonitor;
use crate::core::pool::WorkerPool;
use crate::core::strategy_ctl::StrategyController;
use crate::core::worker::WorkerShared;
use crate::error::ControlError;
use crate::events::{Bus, Event, EventKind};
use crate::message::Message;
use crate::metrics::{ControllerStatus, Counters};
use crate::processor::{NoopProcessor, Processor};
use crate::queue::{BoundedQueue, OverflowService};
use crate::strategy::{Strategy, StrategyCell};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for [`BacklogController`].
///
/// ```no_run
/// use floodgate::{ControllerBuilder, ControllerConfig, LogWriter};
/// use std::sync::Arc;
///
/// let controller = ControllerBuilder::new(ControllerConfig::default())
///     .with_subscribers(vec![Arc::new(LogWriter) as _])
///     .build();
/// ```
pub struct ControllerBuilder {
    config: ControllerConfig,
    processor: Arc<dyn Processor>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl ControllerBuilder {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            processor: Arc::new(NoopProcessor),
            subscribers: Vec::new(),
        }
    }

    /// Installs the side-effect seam every message goes through.
    /// Defaults to [`NoopProcessor`].
    pub fn with_processor(mut self, processor: Arc<dyn Processor>) -> Self {
        self.processor = processor;
        self
    }

    /// Attaches event subscribers (observability hookup).
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    pub fn build(self) -> BacklogController {
        BacklogController::from_parts(self.config, self.processor, self.subscribers)
    }
}

/// The adaptive message-backlog controller.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct BacklogController {
    config: ControllerConfig,
    queue: Arc<BoundedQueue>,
    overflow: Arc<OverflowService>,
    counters: Arc<Counters>,
    pool: Arc<WorkerPool>,
    strategy: Arc<StrategyController>,
    autoscaler: Arc<Autoscaler>,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    running: AtomicBool,
    /// Stops workers and the monitor; refreshed per start.
    cancel: std::sync::Mutex<CancellationToken>,
    /// Stops the event-forwarding listener, strictly after the workers so
    /// shutdown events still reach subscribers.
    listener_cancel: std::sync::Mutex<CancellationToken>,
    monitor_handle: Mutex<Option<JoinHandle<()>>>,
    listener_handle: Mutex<Option<JoinHandle<()>>>,
}

impl BacklogController {
    fn from_parts(
        config: ControllerConfig,
        processor: Arc<dyn Processor>,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Self {
        let bus = Bus::new(config.bus_capacity_clamped());
        let counters = Arc::new(Counters::new());
        let queue = Arc::new(BoundedQueue::new(config.queue_capacity));
        let overflow = Arc::new(OverflowService::new(
            &config,
            Arc::clone(&processor),
            Arc::clone(&counters),
            bus.clone(),
        ));
        let cell = Arc::new(StrategyCell::new(Strategy::Normal));

        let (min, max, _) = config.worker_bounds();
        let shared = Arc::new(WorkerShared {
            queue: Arc::clone(&queue),
            overflow: Arc::clone(&overflow),
            processor,
            counters: Arc::clone(&counters),
            strategy: Arc::clone(&cell),
            bus: bus.clone(),
            consume_delay_ms: AtomicU64::new(config.consume_delay.as_millis() as u64),
            batch_size: config.batch_size_clamped(),
            batch_unit_delay: config.batch_unit_delay,
            poll_timeout: config.poll_timeout,
            target: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
        });

        let stopped = CancellationToken::new();
        stopped.cancel();
        let pool = Arc::new(WorkerPool::new(shared, min, max, stopped.clone()));
        let strategy = Arc::new(StrategyController::new(
            cell,
            Arc::clone(&queue),
            Arc::clone(&overflow),
            bus.clone(),
        ));
        let autoscaler = Arc::new(Autoscaler::new(&config, Arc::clone(&pool), bus.clone()));
        let subs = Arc::new(SubscriberSet::new(subscribers, bus.clone()));

        Self {
            config,
            queue,
            overflow,
            counters,
            pool,
            strategy,
            autoscaler,
            bus,
            subs,
            running: AtomicBool::new(false),
            cancel: std::sync::Mutex::new(stopped.clone()),
            listener_cancel: std::sync::Mutex::new(stopped),
            monitor_handle: Mutex::new(None),
            listener_handle: Mutex::new(None),
        }
    }

    /// Subscribes to the bus and forwards events to the subscriber set
    /// (fire-and-forget).
    fn subscriber_listener(&self, token: CancellationToken) -> JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    received = rx.recv() => match received {
                        Ok(event) => set.emit(&event),
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = token.cancelled() => break,
                }
            }
        })
    }

    /// Starts workers, monitor, and event delivery. No-op if running.
    ///
    /// Counters reset and the strategy returns to normal: a restart is a
    /// clean slate, not a resume.
    pub async fn start(&self) {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        self.counters.reset();
        self.overflow.reset_processed();
        self.strategy.transition(Strategy::Normal).await;

        // Event delivery first, so startup events are observed.
        if !self.subs.is_empty() {
            let listener_token = CancellationToken::new();
            *self.listener_cancel.lock().unwrap() = listener_token.clone();
            let handle = self.subscriber_listener(listener_token);
            *self.listener_handle.lock().await = Some(handle);
        }

        let token = CancellationToken::new();
        *self.cancel.lock().unwrap() = token.clone();
        self.pool.set_cancel(token.clone());

        let (_, _, initial) = self.config.worker_bounds();
        self.pool.resize_to(initial).await;

        let monitor = BacklogMonitor::new(
            &self.config,
            Arc::clone(&self.counters),
            Arc::clone(&self.strategy),
            Arc::clone(&self.autoscaler),
            self.bus.clone(),
        );
        *self.monitor_handle.lock().await = Some(tokio::spawn(monitor.run(token)));

        self.bus.publish(
            Event::new(EventKind::ControllerStarted).with_count(self.pool.target() as u64),
        );
    }

    /// Stops everything gracefully and waits for it. No-op if stopped.
    pub async fn stop(&self) {
        if self
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        self.cancel.lock().unwrap().cancel();
        self.pool.join_all().await;
        if let Some(handle) = self.monitor_handle.lock().await.take() {
            let _ = handle.await;
        }
        self.overflow.stop().await;

        self.bus.publish(
            Event::new(EventKind::ControllerStopped)
                .with_count(self.counters.total_processed()),
        );

        // Listener last: it drains already-published events before exiting.
        self.listener_cancel.lock().unwrap().cancel();
        if let Some(handle) = self.listener_handle.lock().await.take() {
            let _ = handle.await;
        }
    }

    /// Whether the controller is currently running.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Offers a message to the ingress queue, waiting up to the configured
    /// offer timeout for space.
    ///
    /// Returns `false` on backpressure; the message is then *not* counted
    /// as produced and the caller decides what to do with it.
    pub async fn enqueue(&self, msg: Message) -> bool {
        if self.queue.offer(msg, self.config.offer_timeout).await {
            self.counters.record_produced();
            true
        } else {
            false
        }
    }

    /// Switches strategy by name (`"normal"`, `"overflow"`, `"selective"`,
    /// `"batch"`, case-insensitive).
    pub async fn switch_strategy(&self, name: &str) -> Result<Strategy, ControlError> {
        let strategy: Strategy = name.parse()?;
        self.strategy.transition(strategy).await;
        Ok(strategy)
    }

    /// Typed strategy override.
    pub async fn force_strategy(&self, strategy: Strategy) {
        self.strategy.transition(strategy).await;
    }

    /// Currently applied strategy.
    #[inline]
    pub fn current_strategy(&self) -> Strategy {
        self.strategy.current()
    }

    /// Manually resizes the worker pool, bypassing the autoscaler's step.
    ///
    /// A count outside `[min_workers, max_workers]` is rejected and nothing
    /// changes. Returns the applied target.
    pub async fn scale_consumers(&self, count: usize) -> Result<usize, ControlError> {
        if count < self.pool.min() || count > self.pool.max() {
            return Err(ControlError::WorkerCountOutOfRange {
                requested: count,
                min: self.pool.min(),
                max: self.pool.max(),
            });
        }
        Ok(self.pool.resize_to(count).await)
    }

    /// Adjusts the simulated per-message cost at runtime. Takes effect on
    /// the next claim of every worker.
    pub fn set_consume_delay(&self, delay: Duration) {
        self.pool.set_consume_delay(delay);
        self.bus
            .publish(Event::new(EventKind::ConsumeDelayChanged).with_delay(delay));
    }

    /// Empties the ingress queue, returning how many messages were
    /// discarded.
    pub fn clear_queue(&self) -> usize {
        let cleared = self.queue.clear();
        self.bus
            .publish(Event::new(EventKind::QueueCleared).with_count(cleared as u64));
        cleared
    }

    /// Point-in-time snapshot of every observable gauge and counter.
    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            strategy: self.strategy.current(),
            queue_size: self.queue.size(),
            total_produced: self.counters.total_produced(),
            total_processed: self.counters.total_processed(),
            backlog_estimate: self.counters.backlog_estimate(),
            dropped: self.counters.dropped(),
            in_flight: self.counters.in_flight(),
            active_workers: self.pool.active(),
            target_workers: self.pool.target(),
            overflow_queue_size: self.overflow.size(),
            overflow_processed: self.overflow.processed_count(),
            consume_delay_ms: self.pool.consume_delay().as_millis() as u64,
            running: self.is_running(),
        }
    }

    /// Formatted one-line snapshot, for logs and ad-hoc inspection.
    pub fn statistics(&self) -> String {
        self.status().summary()
    }

    /// Handle to the event bus, for custom subscriptions.
    #[inline]
    pub fn bus(&self) -> &Bus {
        &self.bus
    }
}
