//! # Overflow spill queue with its own drain pool.
//!
//! When the controller switches to the overflow strategy, workers stop
//! processing inline and instead hand messages to [`OverflowService`]: a
//! second, larger bounded queue drained by a fixed pool of background tasks
//! at a deliberately slow pace. The main queue empties fast (absorbing the
//! burst) while the spilled messages are worked off gradually.
//!
//! ## Rules
//! - `start`/`stop` are idempotent; `stop` waits for every drain task to
//!   finish its current message before returning.
//! - A message only counts as processed once a drain task **completes** it.
//!   Handing a message to the overflow queue is a transfer, not progress.
//! - A failed or panicking drain attempt requeues the message at the head
//!   of the overflow queue; the drain delay throttles the retry.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::ControllerConfig;
use crate::events::{Bus, Event, EventKind};
use crate::message::Message;
use crate::metrics::Counters;
use crate::processor::Processor;
use crate::queue::BoundedQueue;

/// Spill queue plus its fixed drain pool.
///
/// Lives for the whole controller lifetime; only its drain pool starts and
/// stops as the strategy flips in and out of overflow. Messages left in the
/// spill queue across a stop survive and resume draining on the next start.
pub struct OverflowService {
    queue: Arc<BoundedQueue>,
    drain_workers: usize,
    drain_delay: Duration,
    poll_timeout: Duration,
    offer_timeout: Duration,
    processed: AtomicU64,
    running: AtomicBool,
    cancel: std::sync::Mutex<CancellationToken>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    processor: Arc<dyn Processor>,
    counters: Arc<Counters>,
    bus: Bus,
}

impl OverflowService {
    pub(crate) fn new(
        config: &ControllerConfig,
        processor: Arc<dyn Processor>,
        counters: Arc<Counters>,
        bus: Bus,
    ) -> Self {
        Self {
            queue: Arc::new(BoundedQueue::new(config.overflow_capacity)),
            drain_workers: config.overflow_workers.max(1),
            drain_delay: config.overflow_delay,
            poll_timeout: config.poll_timeout,
            offer_timeout: config.offer_timeout,
            processed: AtomicU64::new(0),
            running: AtomicBool::new(false),
            cancel: std::sync::Mutex::new(CancellationToken::new()),
            handles: Mutex::new(Vec::new()),
            processor,
            counters,
            bus,
        }
    }

    /// Whether the drain pool is currently running.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Messages currently waiting in the spill queue.
    #[inline]
    pub fn size(&self) -> usize {
        self.queue.size()
    }

    /// Messages fully drained (processed to completion) since startup.
    #[inline]
    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Hands a message to the spill queue.
    ///
    /// Returns `false` when the spill queue is itself full — the caller
    /// treats that exactly like any other failed delivery (retry-later).
    pub async fn enqueue(&self, msg: Message) -> bool {
        self.queue.offer(msg, self.offer_timeout).await
    }

    /// Discards all spilled messages, returning how many were dropped.
    pub fn clear(&self) -> usize {
        self.queue.clear()
    }

    /// Removes and returns everything left in the spill queue, preserving
    /// order. Used to hand residual spill back to the primary queue when
    /// the drain pool stops; called only after the drains have joined.
    pub(crate) fn take_remaining(&self) -> Vec<Message> {
        let mut remaining = Vec::new();
        while let Some(msg) = self.queue.try_poll() {
            remaining.push(msg);
        }
        remaining
    }

    /// Zeroes the drained-message counter (controller restart).
    pub(crate) fn reset_processed(&self) {
        self.processed.store(0, Ordering::Relaxed);
    }

    /// Starts the drain pool. No-op if already running.
    pub async fn start(self: &Arc<Self>) {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let token = CancellationToken::new();
        *self.cancel.lock().unwrap() = token.clone();

        let mut handles = self.handles.lock().await;
        for _ in 0..self.drain_workers {
            let svc = Arc::clone(self);
            let token = token.clone();
            handles.push(tokio::spawn(async move { svc.drain_loop(token).await }));
        }
        drop(handles);

        self.bus
            .publish(Event::new(EventKind::OverflowStarted).with_count(self.drain_workers as u64));
    }

    /// Stops the drain pool and waits for in-flight messages to finish.
    /// No-op if already stopped.
    pub async fn stop(&self) {
        if self
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        self.cancel.lock().unwrap().cancel();

        let mut handles = self.handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        self.bus
            .publish(Event::new(EventKind::OverflowStopped).with_count(self.queue.size() as u64));
    }

    async fn drain_loop(&self, cancel: CancellationToken) {
        loop {
            let msg = tokio::select! {
                _ = cancel.cancelled() => break,
                msg = self.queue.poll(self.poll_timeout) => msg,
            };
            let Some(msg) = msg else { continue };

            self.counters.claim(1);
            time::sleep(self.drain_delay).await;

            let outcome = AssertUnwindSafe(self.processor.process(&msg))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(())) => {
                    self.processed.fetch_add(1, Ordering::Relaxed);
                    self.counters.record_processed(1);
                }
                Ok(Err(err)) => {
                    self.bus.publish(
                        Event::new(EventKind::ProcessFailed)
                            .with_message(msg.id.as_str())
                            .with_reason(err.to_string()),
                    );
                    self.requeue(msg);
                }
                Err(panic) => {
                    let info = crate::panic_info(panic.as_ref());
                    self.bus.publish(
                        Event::new(EventKind::ProcessFailed)
                            .with_message(msg.id.as_str())
                            .with_reason(format!("panicked: {info}")),
                    );
                    self.requeue(msg);
                }
            }
            self.counters.release(1);
        }
    }

    fn requeue(&self, msg: Message) {
        self.bus.publish(
            Event::new(EventKind::RetryScheduled)
                .with_count(1)
                .with_reason("overflow drain failed"),
        );
        self.queue.requeue_front(vec![msg]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessError;
    use crate::processor::NoopProcessor;
    use async_trait::async_trait;

    fn service(processor: Arc<dyn Processor>) -> Arc<OverflowService> {
        let mut config = ControllerConfig::default();
        config.overflow_capacity = 4;
        config.overflow_workers = 2;
        config.overflow_delay = Duration::from_millis(1);
        config.poll_timeout = Duration::from_millis(10);
        config.offer_timeout = Duration::from_millis(10);
        Arc::new(OverflowService::new(
            &config,
            processor,
            Arc::new(Counters::new()),
            Bus::new(64),
        ))
    }

    struct FlakyProcessor {
        fail_first: AtomicBool,
    }

    #[async_trait]
    impl Processor for FlakyProcessor {
        async fn process(&self, _msg: &Message) -> Result<(), ProcessError> {
            if self.fail_first.swap(false, Ordering::AcqRel) {
                return Err(ProcessError::Failed {
                    reason: "transient".into(),
                });
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_enqueue_respects_capacity() {
        let svc = service(Arc::new(NoopProcessor));
        for i in 0..4 {
            assert!(svc.enqueue(Message::sample(i)).await);
        }
        assert!(!svc.enqueue(Message::sample(4)).await);
        assert_eq!(svc.size(), 4);
    }

    #[tokio::test]
    async fn test_start_stop_idempotent() {
        let svc = service(Arc::new(NoopProcessor));
        svc.start().await;
        svc.start().await;
        assert!(svc.is_running());
        svc.stop().await;
        svc.stop().await;
        assert!(!svc.is_running());
    }

    #[tokio::test]
    async fn test_drain_counts_completions() {
        let svc = service(Arc::new(NoopProcessor));
        for i in 0..4 {
            assert!(svc.enqueue(Message::sample(i)).await);
        }
        svc.start().await;
        for _ in 0..100 {
            if svc.processed_count() == 4 {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        svc.stop().await;
        assert_eq!(svc.processed_count(), 4);
        assert_eq!(svc.size(), 0);
    }

    #[tokio::test]
    async fn test_failed_drain_retries_message() {
        let svc = service(Arc::new(FlakyProcessor {
            fail_first: AtomicBool::new(true),
        }));
        assert!(svc.enqueue(Message::sample(0)).await);
        svc.start().await;
        for _ in 0..100 {
            if svc.processed_count() == 1 {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        svc.stop().await;
        assert_eq!(svc.processed_count(), 1);
        assert_eq!(svc.size(), 0);
    }

    #[tokio::test]
    async fn test_spilled_messages_survive_stop() {
        let svc = service(Arc::new(NoopProcessor));
        for i in 0..3 {
            assert!(svc.enqueue(Message::sample(i)).await);
        }
        // Never started: nothing drained, everything retained.
        assert_eq!(svc.size(), 3);
        assert_eq!(svc.clear(), 3);
    }
}
