//! # Runtime events emitted by the controller, workers, and monitor.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Lifecycle events**: controller and overflow-service start/stop
//! - **Adaptation events**: strategy changes, backlog samples, scaling
//! - **Processing events**: drops, failures, retries, batch commits
//! - **Subscriber events**: fan-out overflow and panics
//!
//! The [`Event`] struct carries additional metadata such as timestamps,
//! message ids, worker ids, counts, and strategies.
//!
//! Intentional selective-mode drops ([`EventKind::MessageDropped`]) are a
//! distinct kind from processing failures ([`EventKind::ProcessFailed`]) so
//! that shedding is always distinguishable from breakage in logs.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! delivered out of order.
//!
//! ## Example
//! ```rust
//! use floodgate::{Event, EventKind, Strategy};
//!
//! let ev = Event::new(EventKind::StrategyChanged)
//!     .with_strategy(Strategy::Overflow)
//!     .with_reason("backlog over high watermark");
//!
//! assert_eq!(ev.kind, EventKind::StrategyChanged);
//! assert_eq!(ev.strategy, Some(Strategy::Overflow));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::strategy::Strategy;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Lifecycle events ===
    /// Controller started; counters were reset.
    ///
    /// Sets:
    /// - `count`: initial worker target
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    ControllerStarted,

    /// Controller stopped; workers and monitor joined.
    ///
    /// Sets:
    /// - `count`: total messages processed over the run
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    ControllerStopped,

    /// Overflow queue service started its drain tasks.
    ///
    /// Sets:
    /// - `count`: drain task count
    /// - `at`, `seq`
    OverflowStarted,

    /// Overflow queue service stopped and joined its drain tasks.
    ///
    /// Sets:
    /// - `count`: messages left in the overflow queue at stop time
    /// - `at`, `seq`
    OverflowStopped,

    /// A primary worker entered its loop.
    ///
    /// Sets:
    /// - `worker`: worker id
    /// - `at`, `seq`
    WorkerStarted,

    /// A primary worker left its loop (shutdown or scale-down).
    ///
    /// Sets:
    /// - `worker`: worker id
    /// - `reason`: exit cause ("shutdown", "scale_down")
    /// - `at`, `seq`
    WorkerExited,

    // === Adaptation events ===
    /// Visible strategy changed (monitor hysteresis or external command).
    ///
    /// Sets:
    /// - `strategy`: new strategy
    /// - `reason`: previous strategy and cause
    /// - `at`, `seq`
    StrategyChanged,

    /// Monitor tick observed the backlog.
    ///
    /// Sets:
    /// - `count`: backlog estimate
    /// - `strategy`: current strategy
    /// - `at`, `seq`
    BacklogSampled,

    /// Autoscaler raised the worker target.
    ///
    /// Sets:
    /// - `count`: new target
    /// - `reason`: `"old -> new, backlog N"`
    /// - `at`, `seq`
    ScaleUp,

    /// Autoscaler lowered the worker target.
    ///
    /// Sets:
    /// - `count`: new target
    /// - `reason`: `"old -> new, backlog N"`
    /// - `at`, `seq`
    ScaleDown,

    /// Simulated per-message cost was changed via the control API.
    ///
    /// Sets:
    /// - `delay_ms`: new per-message delay
    /// - `at`, `seq`
    ConsumeDelayChanged,

    // === Processing events ===
    /// Selective strategy intentionally shed a non-priority message.
    ///
    /// Counted as processed; this is load shedding, not a failure.
    ///
    /// Sets:
    /// - `message_id`: shed message
    /// - `worker`: worker id
    /// - `at`, `seq`
    MessageDropped,

    /// Processing a message (or batch unit) failed; retry-later follows.
    ///
    /// Sets:
    /// - `message_id`: failed message (absent for whole-batch failures)
    /// - `worker`: worker id
    /// - `reason`: failure message
    /// - `at`, `seq`
    ProcessFailed,

    /// Claimed or spilled messages were returned to the head of the
    /// primary queue.
    ///
    /// Sets:
    /// - `count`: requeued messages
    /// - `worker`: worker id (absent when residual spill is handed back on
    ///   leaving overflow)
    /// - `reason`: retry cause
    /// - `at`, `seq`
    RetryScheduled,

    /// A batch unit completed and was committed atomically.
    ///
    /// Sets:
    /// - `count`: batch size
    /// - `worker`: worker id
    /// - `at`, `seq`
    BatchCommitted,

    /// The primary queue was cleared by the control API.
    ///
    /// Sets:
    /// - `count`: discarded messages
    /// - `at`, `seq`
    QueueCleared,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `reason`: panic info/message
    /// - `at`, `seq`
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `reason`: reason string (e.g., "full", "closed")
    /// - `at`, `seq`
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Strategy associated with the event, if any.
    pub strategy: Option<Strategy>,
    /// Message id, if the event concerns a single message.
    pub message_id: Option<Arc<str>>,
    /// Worker id, if the event was emitted from a worker loop.
    pub worker: Option<u32>,
    /// Generic count (backlog, batch size, targets; see kind docs).
    pub count: Option<u64>,
    /// Delay in milliseconds (compact), where applicable.
    pub delay_ms: Option<u32>,
    /// Human-readable reason (errors, causes, transitions).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next
    /// sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            strategy: None,
            message_id: None,
            worker: None,
            count: None,
            delay_ms: None,
            reason: None,
        }
    }

    /// Attaches a strategy.
    #[inline]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Attaches a message id.
    #[inline]
    pub fn with_message(mut self, id: impl Into<Arc<str>>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Attaches a worker id.
    #[inline]
    pub fn with_worker(mut self, worker: u32) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Attaches a count.
    #[inline]
    pub fn with_count(mut self, n: u64) -> Self {
        self.count = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }
}
