//! # Bounded FIFO queue with timed offer/poll.
//!
//! [`BoundedQueue`] is the shared mutable container at the heart of the
//! controller: producers `offer` into it, workers `poll` out of it, both
//! with a bounded wait. A full queue is **backpressure, not an error** —
//! `offer` reports `false` and the caller decides what to do.
//!
//! ## Rules
//! - FIFO order is preserved for all committed messages.
//! - `offer`/`poll` block up to a bounded timeout only, never indefinitely;
//!   this bounds shutdown latency and prevents deadlock on a permanently
//!   full/empty queue.
//! - Waiters register interest **while holding the queue lock**
//!   ([`Notify::enable`] under the lock), so a wake-up between the emptiness
//!   check and the wait can never be lost.
//! - The lock is never held across an await point.
//!
//! ## Redelivery
//! [`BoundedQueue::requeue_front`] reinserts claimed messages at the head.
//! It deliberately ignores the capacity bound: a retry-later signal must
//! never lose a message, so the queue may transiently exceed capacity after
//! a failed claim (producers simply see backpressure for longer).

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{self, Instant};

use crate::message::Message;

/// Thread-safe bounded FIFO for [`Message`]s.
///
/// Safe for many concurrent producers and consumers. Capacity is fixed at
/// construction.
#[derive(Debug)]
pub struct BoundedQueue {
    capacity: usize,
    inner: Mutex<VecDeque<Message>>,
    not_empty: Notify,
    not_full: Notify,
}

impl BoundedQueue {
    /// Creates a queue with the given capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(VecDeque::new()),
            not_empty: Notify::new(),
            not_full: Notify::new(),
        }
    }

    /// Capacity fixed at construction.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of queued messages.
    pub fn size(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// Attempts to enqueue, waiting up to `timeout` for space.
    ///
    /// Returns `false` when the queue is still full after the timeout —
    /// backpressure, the caller retries, drops, or rejects upstream.
    pub async fn offer(&self, msg: Message, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        loop {
            let notified = self.not_full.notified();
            tokio::pin!(notified);
            {
                let mut q = self.inner.lock().unwrap();
                if q.len() < self.capacity {
                    q.push_back(msg);
                    drop(q);
                    self.not_empty.notify_one();
                    return true;
                }
                // Register interest before releasing the lock: a slot freed
                // after this point wakes us.
                notified.as_mut().enable();
            }
            if time::timeout_at(deadline, notified).await.is_err() {
                return false;
            }
        }
    }

    /// Dequeues the oldest message, waiting up to `timeout` for one.
    ///
    /// Returns `None` when the queue is still empty after the timeout, so
    /// consumer loops can re-check their running flag.
    pub async fn poll(&self, timeout: Duration) -> Option<Message> {
        let deadline = Instant::now() + timeout;

        loop {
            let notified = self.not_empty.notified();
            tokio::pin!(notified);
            {
                let mut q = self.inner.lock().unwrap();
                if let Some(msg) = q.pop_front() {
                    drop(q);
                    self.not_full.notify_one();
                    return Some(msg);
                }
                notified.as_mut().enable();
            }
            if time::timeout_at(deadline, notified).await.is_err() {
                return None;
            }
        }
    }

    /// Dequeues the oldest message without waiting.
    ///
    /// Used for batch claims: the first message of a batch is taken with a
    /// timed [`poll`](BoundedQueue::poll), the rest with `try_poll` so an
    /// almost-empty queue never stalls a worker.
    pub fn try_poll(&self) -> Option<Message> {
        let msg = self.inner.lock().unwrap().pop_front();
        if msg.is_some() {
            self.not_full.notify_one();
        }
        msg
    }

    /// Reinserts claimed messages at the head, preserving their relative
    /// order (redelivery path).
    ///
    /// Ignores the capacity bound — retry-later must never drop a message.
    pub fn requeue_front(&self, messages: Vec<Message>) {
        if messages.is_empty() {
            return;
        }
        {
            let mut q = self.inner.lock().unwrap();
            for msg in messages.into_iter().rev() {
                q.push_front(msg);
            }
        }
        self.not_empty.notify_waiters();
        self.not_empty.notify_one();
    }

    /// Discards all queued messages, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let n = {
            let mut q = self.inner.lock().unwrap();
            let n = q.len();
            q.clear();
            n
        };
        if n > 0 {
            self.not_full.notify_waiters();
            self.not_full.notify_one();
        }
        n
    }
}
