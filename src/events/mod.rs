//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the controller, the worker
//! pool, the backlog monitor, the overflow service, and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `BacklogController`, `WorkerPool` workers,
//!   `BacklogMonitor`, `Autoscaler`, `OverflowService`, `SubscriberSet`
//!   workers (overflow/panic).
//! - **Consumer**: the controller's subscriber listener, which fans events
//!   out to the `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
