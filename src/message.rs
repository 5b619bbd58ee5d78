//! # Message: the unit of work.
//!
//! A [`Message`] is an immutable order-shaped record. It is created by a
//! producer, lives in exactly one queue (primary or overflow) until a worker
//! claims it, and is destroyed by the worker (counted as processed, or
//! intentionally dropped under the selective strategy).
//!
//! The [`Priority`] tag is what the selective strategy inspects: `High`
//! messages are always processed, `Normal` messages are shed when the
//! controller is told to skip non-essential work.

use std::time::SystemTime;

use uuid::Uuid;

/// Priority tag carried by every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    /// Regular message; may be shed under the selective strategy.
    #[default]
    Normal,
    /// Essential message; always processed.
    High,
}

impl Priority {
    /// True for [`Priority::High`].
    #[inline]
    pub fn is_high(self) -> bool {
        matches!(self, Priority::High)
    }
}

/// Unit of work flowing through the controller.
///
/// Immutable once enqueued: workers only read it. The `id` is unique and
/// assigned at creation (UUID v4).
#[derive(Debug, Clone)]
pub struct Message {
    /// Unique id, assigned at creation.
    pub id: String,
    /// Identifier of the user the order belongs to.
    pub user_id: String,
    /// Identifier of the order itself.
    pub order_id: String,
    /// Order amount.
    pub amount: f64,
    /// Creation timestamp (wall clock).
    pub created_at: SystemTime,
    /// Priority tag inspected by the selective strategy.
    pub priority: Priority,
}

impl Message {
    /// Creates a normal-priority message with a fresh id.
    pub fn new(user_id: impl Into<String>, order_id: impl Into<String>, amount: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            order_id: order_id.into(),
            amount,
            created_at: SystemTime::now(),
            priority: Priority::Normal,
        }
    }

    /// Returns a copy of this message tagged with the given priority.
    #[inline]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Convenience constructor for demos and tests: `user-N` / `order-N`.
    pub fn sample(n: usize) -> Self {
        Self::new(format!("user-{}", n % 100), format!("order-{n}"), 1.0)
    }
}
