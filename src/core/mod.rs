//! # Core runtime: workers, pool, monitor, strategy, autoscaler, facade.
//!
//! Components and how they relate:
//! - [`controller`] public facade wiring everything together
//! - [`worker`] the per-worker claim/dispatch loop
//! - [`pool`] worker lifecycle and advisory resizing
//! - [`monitor`] periodic backlog sampling with hysteresis
//! - [`strategy_ctl`] serialized strategy transitions
//! - [`autoscaler`] backlog-driven worker sizing

mod autoscaler;
mod controller;
mod monitor;
mod pool;
mod strategy_ctl;
mod worker;

pub use controller::{BacklogController, ControllerBuilder};
