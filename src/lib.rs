//! # floodgate
//!
//! **Floodgate** is an adaptive message-backlog controller for Rust.
//!
//! It manages a bounded in-memory ingress queue drained by a pool of async
//! workers whose processing behavior and size adapt to measured backlog
//! pressure. The crate is designed as the concurrency core of a larger
//! application; transport, HTTP, and persistence stay outside and talk to
//! it through a small control API.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   producers ──► enqueue() ──► ┌────────────────┐
//!                               │  BoundedQueue  │  (primary, capacity-bounded)
//!                               └───────┬────────┘
//!                                       ▼  claim (per current strategy)
//!              ┌────────────────────────┴───────────────────────┐
//!              │  WorkerPool (min..=max workers, advisory size) │
//!              │   normal    ──► simulate cost, process, commit │
//!              │   overflow  ──► hand off to spill queue        │
//!              │   selective ──► fast-lane high prio, drop rest │
//!              │   batch     ──► claim batch, all-or-nothing    │
//!              └──────┬──────────────────────────┬──────────────┘
//!                     │ spill                    │ counters
//!                     ▼                          ▼
//!          ┌──────────────────────┐   ┌─────────────────────┐
//!          │   OverflowService    │   │      Counters       │
//!          │ (own slow drain pool)│   │ produced/processed/ │
//!          └──────────────────────┘   │ dropped/in-flight   │
//!                                     └──────────┬──────────┘
//!                                                ▼ sampled every tick
//!                               ┌────────────────────────────────┐
//!                               │         BacklogMonitor         │
//!                               │  hysteresis: normal⇄overflow   │
//!                               │  + Autoscaler (+5 / −2 steps)  │
//!                               └────────────────────────────────┘
//!
//!   everything ── publish(Event) ──► Bus ──► listener ──► SubscriberSet
//! ```
//!
//! ### Strategy lifecycle
//! ```text
//! start() ──► strategy = normal, counters reset, workers spawned
//!
//! each monitor tick:
//!   ├─► backlog = queue depth
//!   ├─► publish BacklogSampled{ backlog, strategy }
//!   ├─► normal   && backlog > high ─► transition(overflow)
//!   ├─► overflow && backlog < low  ─► transition(normal)
//!   └─► autoscaler.evaluate(backlog)
//!
//! transition(next):
//!   ├─► leaving overflow  ─► drain pool stopped (awaited) first
//!   ├─► entering overflow ─► drain pool started first
//!   └─► publish StrategyChanged
//!
//! selective / batch: entered and left only by explicit command
//! ```
//!
//! ## Features
//! | Area              | Description                                                      | Key types / traits                          |
//! |-------------------|------------------------------------------------------------------|---------------------------------------------|
//! | **Control API**   | Enqueue, lifecycle, strategy and worker overrides, status.       | [`BacklogController`], [`ControllerBuilder`]|
//! | **Processing**    | Pluggable side-effect seam with panic containment.               | [`Processor`]                               |
//! | **Queues**        | Bounded FIFO with timed offer/poll; overflow spill with drain.   | [`BoundedQueue`], [`OverflowService`]       |
//! | **Strategies**    | Normal / overflow / selective / batch processing policies.       | [`Strategy`]                                |
//! | **Subscriber API**| Hook into runtime events (logging, metrics, custom subscribers). | [`Subscribe`], [`LogWriter`]                |
//! | **Errors**        | Typed errors for the control API and message processing.         | [`ControlError`], [`ProcessError`]          |
//! | **Configuration** | Centralize capacities, thresholds, and simulated costs.          | [`ControllerConfig`]                        |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use floodgate::{ControllerBuilder, ControllerConfig, LogWriter, Message};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let mut cfg = ControllerConfig::default();
//!     cfg.consume_delay = Duration::from_millis(1);
//!
//!     let controller = ControllerBuilder::new(cfg)
//!         .with_subscribers(vec![Arc::new(LogWriter) as _])
//!         .build();
//!
//!     controller.start().await;
//!     for n in 0..10 {
//!         controller.enqueue(Message::sample(n)).await;
//!     }
//!     tokio::time::sleep(Duration::from_millis(100)).await;
//!     println!("{}", controller.statistics());
//!     controller.stop().await;
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod message;
mod metrics;
mod processor;
mod queue;
mod strategy;
mod subscribers;

// ---- Public re-exports ----

pub use config::ControllerConfig;
pub use core::{BacklogController, ControllerBuilder};
pub use error::{ControlError, ProcessError};
pub use events::{Bus, Event, EventKind};
pub use message::{Message, Priority};
pub use metrics::ControllerStatus;
pub use processor::{NoopProcessor, Processor};
pub use queue::{BoundedQueue, OverflowService};
pub use strategy::Strategy;
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};

/// Best-effort rendering of a caught panic payload.
pub(crate) fn panic_info(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
