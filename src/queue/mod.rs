//! # Queues: bounded ingress and overflow spill.
//!
//! Two queues, one contract:
//! - [`BoundedQueue`] fixed-capacity FIFO with timed offer/poll; the main
//!   ingress buffer every worker claims from.
//! - [`OverflowService`] a second, larger queue with its own slow drain
//!   pool; absorbs bursts when the controller spills.

mod bounded;
mod overflow;

pub use bounded::BoundedQueue;
pub use overflow::OverflowService;
