//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format.
//! Intentional drops and real failures print on distinct tags so shedding is
//! never mistaken for breakage.
//!
//! ## Output format
//! ```text
//! [started] workers=2
//! [sampled] backlog=1204 strategy=normal
//! [strategy] to=overflow reason="from=normal cause=backlog_high"
//! [dropped] msg=4f1c... worker=1
//! [failed] msg=9ab0... worker=0 err="processing failed: boom"
//! [retry] worker=0 count=17
//! [scale-up] target=7 (2 -> 7)
//! [stopped]
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};

use super::subscriber::Subscribe;

/// Simple stdout logging subscriber.
///
/// Useful for development, debugging, and examples. Not intended for
/// production use - implement a custom [`Subscribe`] for structured logging
/// or metrics collection.
#[derive(Debug, Default)]
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::ControllerStarted => {
                println!("[started] workers={:?}", e.count);
            }
            EventKind::ControllerStopped => {
                println!("[stopped]");
            }
            EventKind::OverflowStarted => {
                println!("[overflow-started] drains={:?}", e.count);
            }
            EventKind::OverflowStopped => {
                println!("[overflow-stopped] remaining={:?}", e.count);
            }
            EventKind::WorkerStarted => {
                println!("[worker-started] worker={:?}", e.worker);
            }
            EventKind::WorkerExited => {
                println!("[worker-exited] worker={:?} reason={:?}", e.worker, e.reason);
            }
            EventKind::StrategyChanged => {
                println!("[strategy] to={:?} reason={:?}", e.strategy, e.reason);
            }
            EventKind::BacklogSampled => {
                println!("[sampled] backlog={:?} strategy={:?}", e.count, e.strategy);
            }
            EventKind::ScaleUp => {
                println!("[scale-up] target={:?} ({:?})", e.count, e.reason);
            }
            EventKind::ScaleDown => {
                println!("[scale-down] target={:?} ({:?})", e.count, e.reason);
            }
            EventKind::ConsumeDelayChanged => {
                println!("[consume-delay] ms={:?}", e.delay_ms);
            }
            EventKind::MessageDropped => {
                println!("[dropped] msg={:?} worker={:?}", e.message_id, e.worker);
            }
            EventKind::ProcessFailed => {
                println!(
                    "[failed] msg={:?} worker={:?} err={:?}",
                    e.message_id, e.worker, e.reason
                );
            }
            EventKind::RetryScheduled => {
                println!("[retry] worker={:?} count={:?}", e.worker, e.count);
            }
            EventKind::BatchCommitted => {
                println!("[batch] worker={:?} count={:?}", e.worker, e.count);
            }
            EventKind::QueueCleared => {
                println!("[cleared] count={:?}", e.count);
            }
            EventKind::SubscriberPanicked => {
                println!("[subscriber-panic] {:?}", e.reason);
            }
            EventKind::SubscriberOverflow => {
                println!("[subscriber-overflow] {:?}", e.reason);
            }
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
