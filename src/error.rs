//! Error types used by the backlog controller and message processing.
//!
//! This module defines two main error enums:
//!
//! - [`ControlError`] — client/configuration errors rejected synchronously by
//!   the control API (no state mutation occurs).
//! - [`ProcessError`] — transient failures raised while processing a message
//!   or a batch; these become a retry-later signal, never a crash.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for
//! logging/metrics. Queue-full conditions are *not* errors: `offer`/`enqueue`
//! report backpressure as a plain `bool`.

use thiserror::Error;

/// # Errors returned by the control API.
///
/// These represent invalid requests from the caller, such as an unknown
/// strategy name or an out-of-range worker count. They are returned
/// synchronously and never mutate controller state.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ControlError {
    /// Strategy name did not match any of the four known strategies.
    #[error("unknown strategy: {name:?} (expected normal, overflow, selective or batch)")]
    UnknownStrategy {
        /// The name as received from the caller.
        name: String,
    },

    /// Requested worker count falls outside the configured bounds.
    #[error("worker count {requested} outside [{min}, {max}]")]
    WorkerCountOutOfRange {
        /// The requested count.
        requested: usize,
        /// Configured floor.
        min: usize,
        /// Configured ceiling.
        max: usize,
    },
}

impl ControlError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use floodgate::ControlError;
    ///
    /// let err = ControlError::UnknownStrategy { name: "turbo".into() };
    /// assert_eq!(err.as_label(), "unknown_strategy");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ControlError::UnknownStrategy { .. } => "unknown_strategy",
            ControlError::WorkerCountOutOfRange { .. } => "worker_count_out_of_range",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ControlError::UnknownStrategy { name } => format!("unknown strategy: {name}"),
            ControlError::WorkerCountOutOfRange { requested, min, max } => {
                format!("worker count {requested} outside [{min}, {max}]")
            }
        }
    }
}

/// # Errors raised while processing messages.
///
/// Any of these converts the unprocessed remainder of the current claim into
/// a retry-later signal: the affected messages return to the primary queue
/// and are **not** counted as processed (at-least-once semantics).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProcessError {
    /// Processing failed but may succeed if retried.
    #[error("processing failed: {reason}")]
    Failed {
        /// The underlying error message.
        reason: String,
    },

    /// The processor panicked; caught at the worker loop boundary.
    #[error("processor panicked: {info}")]
    Panicked {
        /// Captured panic payload, best effort.
        info: String,
    },
}

impl ProcessError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProcessError::Failed { .. } => "process_failed",
            ProcessError::Panicked { .. } => "process_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ProcessError::Failed { reason } => format!("failed: {reason}"),
            ProcessError::Panicked { info } => format!("panicked: {info}"),
        }
    }
}
