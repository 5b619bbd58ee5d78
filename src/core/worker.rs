//! # Consumer worker: claim a batch, dispatch by strategy, commit or retry.
//!
//! Each worker runs one loop: claim up to `batch_size` messages from the
//! ingress queue (one timed poll, then non-blocking top-up), read the
//! *current* strategy once, and dispose of the claim accordingly:
//!
//! ```text
//!   claim batch ──► strategy? ──► normal:    per message, full cost, commit each
//!                            ├──► overflow:  hand each off to the spill queue
//!                            ├──► selective: high-priority fast lane, drop rest
//!                            └──► batch:     one unit, commit all-or-nothing
//! ```
//!
//! ## Rules
//! - A claimed message is either committed (counted processed), dropped
//!   (counted dropped *and* processed, so the backlog estimate still
//!   drains), spilled to overflow, or requeued at the head. Never lost.
//! - On a per-message failure the failed message *and* the unprocessed
//!   remainder of the claim go back to the head of the queue, uncounted.
//!   Progress committed before the failure stays committed (at-least-once).
//! - The strategy is re-read per claim, so a switch takes effect on the
//!   very next claim without restarting workers.
//! - A processor panic is contained to the current claim: the messages are
//!   requeued and the worker keeps running.
//! - Scale-down is advisory self-termination: a worker that observes more
//!   active workers than the target retires after its current claim.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::ProcessError;
use crate::events::{Bus, Event, EventKind};
use crate::message::Message;
use crate::metrics::Counters;
use crate::processor::Processor;
use crate::queue::{BoundedQueue, OverflowService};
use crate::strategy::{Strategy, StrategyCell};

/// State shared by every worker, the pool, and the controller.
pub(crate) struct WorkerShared {
    pub queue: Arc<BoundedQueue>,
    pub overflow: Arc<OverflowService>,
    pub processor: Arc<dyn Processor>,
    pub counters: Arc<Counters>,
    pub strategy: Arc<StrategyCell>,
    pub bus: Bus,
    /// Simulated per-message cost, adjustable at runtime (millis).
    pub consume_delay_ms: AtomicU64,
    pub batch_size: usize,
    pub batch_unit_delay: Duration,
    pub poll_timeout: Duration,
    /// Desired worker count; workers above it retire themselves.
    pub target: AtomicUsize,
    /// Workers currently running.
    pub active: AtomicUsize,
}

impl WorkerShared {
    #[inline]
    pub fn consume_delay(&self) -> Duration {
        Duration::from_millis(self.consume_delay_ms.load(Ordering::Relaxed))
    }

    /// Claims the right to exit when the pool is above target.
    ///
    /// The CAS on `active` guarantees exactly one worker retires per unit
    /// of excess even when several observe it simultaneously.
    fn try_retire(&self) -> bool {
        loop {
            let active = self.active.load(Ordering::Acquire);
            let target = self.target.load(Ordering::Acquire);
            if active <= target {
                return false;
            }
            if self
                .active
                .compare_exchange(active, active - 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }
}

/// One consumer loop, spawned by the pool.
pub(crate) struct Worker {
    pub id: u32,
    pub shared: Arc<WorkerShared>,
    pub cancel: CancellationToken,
}

impl Worker {
    pub async fn run(self) {
        self.shared
            .bus
            .publish(Event::new(EventKind::WorkerStarted).with_worker(self.id));

        let mut retired = false;
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            if self.shared.try_retire() {
                retired = true;
                break;
            }

            let first = tokio::select! {
                _ = self.cancel.cancelled() => break,
                msg = self.shared.queue.poll(self.shared.poll_timeout) => msg,
            };
            let Some(first) = first else { continue };

            let mut batch = vec![first];
            while batch.len() < self.shared.batch_size {
                match self.shared.queue.try_poll() {
                    Some(msg) => batch.push(msg),
                    None => break,
                }
            }
            let n = batch.len() as u64;
            self.shared.counters.claim(n);
            match self.shared.strategy.load() {
                Strategy::Normal => self.consume_each(batch).await,
                Strategy::Overflow => self.spill_each(batch).await,
                Strategy::Selective => self.selective_each(batch).await,
                Strategy::Batch => self.commit_batch(batch).await,
            }
            self.shared.counters.release(n);
        }

        if !retired {
            self.shared.active.fetch_sub(1, Ordering::AcqRel);
        }
        self.shared.bus.publish(
            Event::new(EventKind::WorkerExited)
                .with_worker(self.id)
                .with_reason(if retired { "scale_down" } else { "shutdown" }),
        );
    }

    /// Normal path: full per-message cost, commit each message as it
    /// completes. On failure the rest of the claim goes back uncounted.
    async fn consume_each(&self, batch: Vec<Message>) {
        let mut iter = batch.into_iter();
        while let Some(msg) = iter.next() {
            time::sleep(self.shared.consume_delay()).await;
            match self.invoke(&msg).await {
                Ok(()) => self.shared.counters.record_processed(1),
                Err(err) => {
                    let mut remaining = vec![msg];
                    remaining.extend(iter);
                    self.retry_later(remaining, err);
                    return;
                }
            }
        }
    }

    /// Overflow path: hand each message to the spill queue. A hand-off is a
    /// transfer, not progress, so nothing is counted processed here. When
    /// the spill queue is full the remainder goes back for redelivery.
    async fn spill_each(&self, batch: Vec<Message>) {
        let mut iter = batch.into_iter();
        while let Some(msg) = iter.next() {
            if !self.shared.overflow.enqueue(msg.clone()).await {
                let mut remaining = vec![msg];
                remaining.extend(iter);
                self.retry_later(
                    remaining,
                    ProcessError::Failed {
                        reason: "overflow queue full".into(),
                    },
                );
                return;
            }
        }
    }

    /// Selective path: high-priority messages get a fast lane (half the
    /// normal cost), everything else is dropped to shed load.
    async fn selective_each(&self, batch: Vec<Message>) {
        let mut iter = batch.into_iter();
        while let Some(msg) = iter.next() {
            if msg.priority.is_high() {
                time::sleep(self.shared.consume_delay() / 2).await;
                match self.invoke(&msg).await {
                    Ok(()) => self.shared.counters.record_processed(1),
                    Err(err) => {
                        let mut remaining = vec![msg];
                        remaining.extend(iter);
                        self.retry_later(remaining, err);
                        return;
                    }
                }
            } else {
                self.shared.counters.record_dropped();
                self.shared.counters.record_processed(1);
                self.shared.bus.publish(
                    Event::new(EventKind::MessageDropped)
                        .with_message(msg.id.as_str())
                        .with_worker(self.id),
                );
            }
        }
    }

    /// Batch path: the whole claim is one unit, committed all-or-nothing.
    async fn commit_batch(&self, batch: Vec<Message>) {
        let n = batch.len() as u64;
        time::sleep(self.shared.batch_unit_delay * batch.len() as u32).await;

        let outcome = AssertUnwindSafe(self.shared.processor.process_batch(&batch))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => {
                self.shared.counters.record_processed(n);
                self.shared.bus.publish(
                    Event::new(EventKind::BatchCommitted)
                        .with_count(n)
                        .with_worker(self.id),
                );
            }
            Ok(Err(err)) => self.retry_later(batch, err),
            Err(panic) => {
                let info = crate::panic_info(panic.as_ref());
                self.retry_later(batch, ProcessError::Panicked { info });
            }
        }
    }

    /// Runs the processor with panic containment.
    async fn invoke(&self, msg: &Message) -> Result<(), ProcessError> {
        match AssertUnwindSafe(self.shared.processor.process(msg))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(ProcessError::Panicked {
                info: crate::panic_info(panic.as_ref()),
            }),
        }
    }

    /// Puts a failed claim back at the head of the queue, uncounted.
    fn retry_later(&self, messages: Vec<Message>, err: ProcessError) {
        let mut failed = Event::new(EventKind::ProcessFailed)
            .with_worker(self.id)
            .with_reason(err.to_string());
        // No message id on whole-batch failures.
        if let [only] = messages.as_slice() {
            failed = failed.with_message(only.id.as_str());
        }
        self.shared.bus.publish(failed);
        self.shared.bus.publish(
            Event::new(EventKind::RetryScheduled)
                .with_worker(self.id)
                .with_count(messages.len() as u64)
                .with_reason(err.as_label()),
        );
        self.shared.queue.requeue_front(messages);
    }
}
