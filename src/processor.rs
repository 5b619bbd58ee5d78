//! # Processor: the side-effect seam.
//!
//! The controller owns queueing, strategy selection, and counting; the
//! actual effect of "processing" a message belongs to the embedder. A
//! [`Processor`] is attached when building the controller and invoked by
//! primary workers and overflow drain tasks.
//!
//! Simulated per-message *cost* (sleeps) is applied by the worker loops and
//! tuned at runtime; the processor is only the effect. The default
//! [`NoopProcessor`] does nothing, which is what demos and load experiments
//! want.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use floodgate::{Message, ProcessError, Processor};
//!
//! struct Audit;
//!
//! #[async_trait]
//! impl Processor for Audit {
//!     async fn process(&self, msg: &Message) -> Result<(), ProcessError> {
//!         // write audit record...
//!         let _ = msg;
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::ProcessError;
use crate::message::Message;

/// Effectful message handler invoked by workers.
///
/// Called from worker tasks; implementations should avoid blocking the async
/// runtime (prefer async I/O and cooperative waits). A returned error turns
/// the unprocessed remainder of the current claim into a retry-later signal,
/// so implementations must be safe to re-invoke for the same message
/// (at-least-once).
#[async_trait]
pub trait Processor: Send + Sync + 'static {
    /// Processes a single message.
    async fn process(&self, msg: &Message) -> Result<(), ProcessError>;

    /// Processes a claimed batch as one unit (batch strategy).
    ///
    /// The default folds over [`process`](Processor::process); implementors
    /// with a cheaper bulk path (bulk insert, pipelined writes) override it.
    /// An error fails the whole unit: nothing in the batch is committed.
    async fn process_batch(&self, batch: &[Message]) -> Result<(), ProcessError> {
        for msg in batch {
            self.process(msg).await?;
        }
        Ok(())
    }
}

/// Default processor: accepts every message without side effects.
#[derive(Debug, Default)]
pub struct NoopProcessor;

#[async_trait]
impl Processor for NoopProcessor {
    async fn process(&self, _msg: &Message) -> Result<(), ProcessError> {
        Ok(())
    }
}
