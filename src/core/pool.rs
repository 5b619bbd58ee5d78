//! # Worker pool: spawn, resize, drain.
//!
//! The pool owns the consumer workers. Scaling is asymmetric by design:
//! - **Up**: the pool spawns the missing workers immediately.
//! - **Down**: the pool only lowers the target; excess workers notice and
//!   retire themselves after finishing their current claim, so no message
//!   is ever abandoned mid-flight.
//!
//! ## Rules
//! - `resize_to` clamps to the configured `[min, max]` bounds and returns
//!   the applied target.
//! - `join_all` waits for every spawned worker, including ones that
//!   already retired.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::worker::{Worker, WorkerShared};

pub(crate) struct WorkerPool {
    shared: Arc<WorkerShared>,
    min: usize,
    max: usize,
    next_id: AtomicU32,
    /// Refreshed on every controller start so the pool is restartable.
    cancel: std::sync::Mutex<CancellationToken>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(
        shared: Arc<WorkerShared>,
        min: usize,
        max: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            shared,
            min,
            max,
            next_id: AtomicU32::new(0),
            cancel: std::sync::Mutex::new(cancel),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Installs the stop signal new workers will observe.
    pub fn set_cancel(&self, token: CancellationToken) {
        *self.cancel.lock().unwrap() = token;
    }

    #[inline]
    pub fn min(&self) -> usize {
        self.min
    }

    #[inline]
    pub fn max(&self) -> usize {
        self.max
    }

    #[inline]
    pub fn target(&self) -> usize {
        self.shared.target.load(Ordering::Acquire)
    }

    #[inline]
    pub fn active(&self) -> usize {
        self.shared.active.load(Ordering::Acquire)
    }

    #[inline]
    pub fn consume_delay(&self) -> Duration {
        self.shared.consume_delay()
    }

    pub fn set_consume_delay(&self, delay: Duration) {
        self.shared
            .consume_delay_ms
            .store(delay.as_millis() as u64, Ordering::Relaxed);
    }

    /// Sets the worker target, clamped to `[min, max]`, and spawns any
    /// missing workers. Returns the applied target.
    ///
    /// Shrinking spawns nothing; excess workers retire on their own.
    pub async fn resize_to(&self, requested: usize) -> usize {
        let target = requested.clamp(self.min, self.max);
        self.shared.target.store(target, Ordering::Release);

        let cancel = self.cancel.lock().unwrap().clone();
        let mut handles = self.handles.lock().await;
        loop {
            // A stopped pool keeps its target but spawns nothing; the next
            // start resizes again with a live token.
            if cancel.is_cancelled() {
                break;
            }
            let active = self.shared.active.load(Ordering::Acquire);
            if active >= target {
                break;
            }
            if self
                .shared
                .active
                .compare_exchange(active, active + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                continue;
            }
            let worker = Worker {
                id: self.next_id.fetch_add(1, Ordering::Relaxed),
                shared: Arc::clone(&self.shared),
                cancel: cancel.clone(),
            };
            handles.push(tokio::spawn(worker.run()));
        }
        target
    }

    /// Waits for every worker to exit. Callers cancel the token first.
    pub async fn join_all(&self) {
        let mut handles = self.handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
    }
}
