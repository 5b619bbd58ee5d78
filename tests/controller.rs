//! End-to-end coverage of the controller facade: lifecycle, strategies,
//! manual overrides, and counter conservation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use floodgate::{
    ControlError, ControllerBuilder, ControllerConfig, EventKind, Message, ProcessError, Processor,
    Strategy,
};
use tokio::time;

/// Processor that counts every message it actually sees.
struct CountingProcessor {
    seen: AtomicU64,
}

impl CountingProcessor {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            seen: AtomicU64::new(0),
        })
    }

    fn seen(&self) -> u64 {
        self.seen.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Processor for CountingProcessor {
    async fn process(&self, _msg: &Message) -> Result<(), ProcessError> {
        self.seen.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Config with near-zero simulated costs so the tests run fast. The monitor
/// interval stays long; tests that need it shorten it themselves.
fn fast_config() -> ControllerConfig {
    let mut cfg = ControllerConfig::default();
    cfg.queue_capacity = 100;
    cfg.overflow_capacity = 100;
    cfg.overflow_workers = 2;
    cfg.min_workers = 1;
    cfg.max_workers = 8;
    cfg.initial_workers = 2;
    cfg.batch_size = 10;
    cfg.monitor_interval = Duration::from_secs(60);
    cfg.consume_delay = Duration::from_millis(1);
    cfg.overflow_delay = Duration::from_millis(1);
    cfg.batch_unit_delay = Duration::from_millis(1);
    cfg.offer_timeout = Duration::from_millis(50);
    cfg.poll_timeout = Duration::from_millis(10);
    cfg
}

async fn wait_until(mut cond: impl FnMut() -> bool, what: &str) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_start_stop_are_idempotent() {
    let controller = ControllerBuilder::new(fast_config()).build();

    controller.start().await;
    controller.start().await;
    assert!(controller.status().running);

    controller.stop().await;
    controller.stop().await;
    let status = controller.status();
    assert!(!status.running);
    assert_eq!(status.active_workers, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_normal_strategy_processes_everything() {
    let processor = CountingProcessor::new();
    let controller = ControllerBuilder::new(fast_config())
        .with_processor(Arc::clone(&processor) as _)
        .build();

    controller.start().await;
    for n in 0..20 {
        assert!(controller.enqueue(Message::sample(n)).await);
    }
    wait_until(|| controller.status().total_processed == 20, "20 processed").await;
    controller.stop().await;

    let status = controller.status();
    assert_eq!(status.total_produced, 20);
    assert_eq!(status.total_processed, 20);
    assert_eq!(status.queue_size, 0);
    assert_eq!(status.in_flight, 0);
    assert_eq!(status.dropped, 0);
    assert_eq!(processor.seen(), 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_selective_drops_normal_and_fast_lanes_high() {
    let processor = CountingProcessor::new();
    let controller = ControllerBuilder::new(fast_config())
        .with_processor(Arc::clone(&processor) as _)
        .build();

    controller.start().await;
    controller.force_strategy(Strategy::Selective).await;

    for n in 0..10 {
        let msg = if n < 3 {
            Message::sample(n).with_priority(floodgate::Priority::High)
        } else {
            Message::sample(n)
        };
        assert!(controller.enqueue(msg).await);
    }
    wait_until(|| controller.status().total_processed == 10, "10 disposed").await;
    controller.stop().await;

    let status = controller.status();
    // Only the 3 high-priority messages reached the processor.
    assert_eq!(processor.seen(), 3);
    assert_eq!(status.dropped, 7);
    assert_eq!(status.total_processed, 10);
    assert_eq!(status.queue_size, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_drop_and_failure_events_are_distinct() {
    /// Fails the first message it sees, succeeds afterwards.
    struct FailOnce {
        armed: AtomicU64,
    }

    #[async_trait]
    impl Processor for FailOnce {
        async fn process(&self, _msg: &Message) -> Result<(), ProcessError> {
            if self.armed.fetch_sub(1, Ordering::AcqRel) == 1 {
                return Err(ProcessError::Failed {
                    reason: "boom".into(),
                });
            }
            Ok(())
        }
    }

    let controller = ControllerBuilder::new(fast_config())
        .with_processor(Arc::new(FailOnce {
            armed: AtomicU64::new(1),
        }) as _)
        .build();
    let mut rx = controller.bus().subscribe();

    controller.start().await;
    controller.force_strategy(Strategy::Selective).await;
    // One high-priority message (fails once, succeeds on redelivery) and
    // three shed messages.
    assert!(
        controller
            .enqueue(Message::sample(0).with_priority(floodgate::Priority::High))
            .await
    );
    for n in 1..4 {
        assert!(controller.enqueue(Message::sample(n)).await);
    }
    wait_until(|| controller.status().total_processed == 4, "4 disposed").await;
    controller.stop().await;

    let mut dropped = 0;
    let mut failed = 0;
    let mut retried = 0;
    loop {
        match rx.try_recv() {
            Ok(ev) => match ev.kind {
                EventKind::MessageDropped => dropped += 1,
                EventKind::ProcessFailed => failed += 1,
                EventKind::RetryScheduled => retried += 1,
                _ => {}
            },
            Err(tokio::sync::broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    // Shedding and breakage never share an event kind.
    assert_eq!(dropped, 3);
    assert_eq!(failed, 1);
    assert_eq!(retried, 1);
    assert_eq!(controller.status().dropped, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_batch_strategy_commits_whole_claims() {
    let processor = CountingProcessor::new();
    let controller = ControllerBuilder::new(fast_config())
        .with_processor(Arc::clone(&processor) as _)
        .build();

    controller.start().await;
    controller.force_strategy(Strategy::Batch).await;

    for n in 0..25 {
        assert!(controller.enqueue(Message::sample(n)).await);
    }
    wait_until(|| controller.status().total_processed == 25, "25 processed").await;
    controller.stop().await;

    assert_eq!(processor.seen(), 25);
    assert_eq!(controller.status().queue_size, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overflow_strategy_spills_then_drains() {
    let processor = CountingProcessor::new();
    let controller = ControllerBuilder::new(fast_config())
        .with_processor(Arc::clone(&processor) as _)
        .build();

    controller.start().await;
    controller.force_strategy(Strategy::Overflow).await;

    for n in 0..15 {
        assert!(controller.enqueue(Message::sample(n)).await);
    }
    wait_until(
        || controller.status().overflow_processed == 15,
        "overflow drain of 15",
    )
    .await;
    controller.stop().await;

    let status = controller.status();
    // Hand-off is a transfer; processed only counts completed drains.
    assert_eq!(status.total_processed, 15);
    assert_eq!(status.overflow_processed, 15);
    assert_eq!(status.overflow_queue_size, 0);
    assert_eq!(processor.seen(), 15);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_monitor_drives_overflow_and_recovery() {
    let mut cfg = fast_config();
    cfg.monitor_interval = Duration::from_millis(20);
    cfg.high_watermark = 6;
    cfg.initial_workers = 1;
    cfg.consume_delay = Duration::from_millis(100);
    let controller = ControllerBuilder::new(cfg).build();

    controller.start().await;
    for n in 0..30 {
        assert!(controller.enqueue(Message::sample(n)).await);
    }
    wait_until(
        || controller.current_strategy() == Strategy::Overflow,
        "switch to overflow",
    )
    .await;

    // Spilled messages drain at the cheap rate; the backlog falls under the
    // low watermark and the monitor switches back on its own.
    wait_until(
        || controller.current_strategy() == Strategy::Normal,
        "recovery to normal",
    )
    .await;
    // Recovery is not the end of the story: whatever was still spilled at
    // the flip is handed back and finished by the primary workers.
    wait_until(|| controller.status().total_processed == 30, "30 processed").await;
    assert_eq!(controller.status().overflow_queue_size, 0);
    controller.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_recovery_waits_for_spilled_messages_to_drain() {
    let processor = CountingProcessor::new();
    let mut cfg = fast_config();
    cfg.monitor_interval = Duration::from_millis(20);
    cfg.high_watermark = 10;
    cfg.initial_workers = 1;
    cfg.consume_delay = Duration::from_millis(100);
    cfg.overflow_delay = Duration::from_millis(10);
    let low = cfg.low_watermark();
    let controller = ControllerBuilder::new(cfg)
        .with_processor(Arc::clone(&processor) as _)
        .build();

    controller.start().await;
    for n in 0..60 {
        assert!(controller.enqueue(Message::sample(n)).await);
    }
    wait_until(
        || controller.current_strategy() == Strategy::Overflow,
        "switch to overflow",
    )
    .await;

    // The drain is deliberately slow here: the primary queue empties long
    // before the spill is worked off. The monitor tracks the backlog
    // estimate, so it must hold overflow until completions catch up.
    wait_until(
        || controller.current_strategy() == Strategy::Normal,
        "recovery to normal",
    )
    .await;
    let status = controller.status();
    assert!(
        status.backlog_estimate < low,
        "flipped back at backlog {}, low watermark {low}",
        status.backlog_estimate
    );
    assert_eq!(status.overflow_queue_size, 0);

    wait_until(|| controller.status().total_processed == 60, "60 processed").await;
    controller.stop().await;
    assert_eq!(processor.seen(), 60);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_scale_consumers_rejects_out_of_range() {
    let controller = ControllerBuilder::new(fast_config()).build();
    controller.start().await;

    match controller.scale_consumers(0).await {
        Err(ControlError::WorkerCountOutOfRange { requested, min, max }) => {
            assert_eq!(requested, 0);
            assert_eq!((min, max), (1, 8));
        }
        other => panic!("expected out-of-range rejection, got {other:?}"),
    }
    assert!(controller.scale_consumers(100).await.is_err());

    let applied = controller.scale_consumers(4).await.unwrap();
    assert_eq!(applied, 4);
    assert_eq!(controller.status().target_workers, 4);

    controller.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_switch_strategy_by_name() {
    let controller = ControllerBuilder::new(fast_config()).build();
    controller.start().await;

    assert_eq!(
        controller.switch_strategy("Selective").await.unwrap(),
        Strategy::Selective
    );
    assert_eq!(controller.current_strategy(), Strategy::Selective);

    match controller.switch_strategy("turbo").await {
        Err(ControlError::UnknownStrategy { name }) => assert_eq!(name, "turbo"),
        other => panic!("expected unknown-strategy rejection, got {other:?}"),
    }
    // The rejected request mutated nothing.
    assert_eq!(controller.current_strategy(), Strategy::Selective);

    controller.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_set_consume_delay_is_visible() {
    let controller = ControllerBuilder::new(fast_config()).build();
    let mut rx = controller.bus().subscribe();

    controller.set_consume_delay(Duration::from_millis(42));
    assert_eq!(controller.status().consume_delay_ms, 42);

    let ev = rx.recv().await.unwrap();
    assert_eq!(ev.kind, EventKind::ConsumeDelayChanged);
    assert_eq!(ev.delay_ms, Some(42));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_clear_queue_discards_pending() {
    let controller = ControllerBuilder::new(fast_config()).build();
    // Not started: messages stay queued.
    for n in 0..5 {
        assert!(controller.enqueue(Message::sample(n)).await);
    }
    assert_eq!(controller.clear_queue(), 5);
    assert_eq!(controller.status().queue_size, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_enqueue_reports_backpressure_when_full() {
    let mut cfg = fast_config();
    cfg.queue_capacity = 3;
    cfg.offer_timeout = Duration::from_millis(10);
    let controller = ControllerBuilder::new(cfg).build();

    for n in 0..3 {
        assert!(controller.enqueue(Message::sample(n)).await);
    }
    assert!(!controller.enqueue(Message::sample(3)).await);
    // Rejected offers are not counted as produced.
    assert_eq!(controller.status().total_produced, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_restart_resets_counters_and_strategy() {
    let controller = ControllerBuilder::new(fast_config()).build();

    controller.start().await;
    controller.force_strategy(Strategy::Batch).await;
    for n in 0..5 {
        assert!(controller.enqueue(Message::sample(n)).await);
    }
    wait_until(|| controller.status().total_processed == 5, "5 processed").await;
    controller.stop().await;

    controller.start().await;
    let status = controller.status();
    assert_eq!(status.total_produced, 0);
    assert_eq!(status.total_processed, 0);
    assert_eq!(status.strategy, Strategy::Normal);
    controller.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_counters_conserve_messages() {
    let processor = CountingProcessor::new();
    let controller = ControllerBuilder::new(fast_config())
        .with_processor(Arc::clone(&processor) as _)
        .build();

    controller.start().await;
    for n in 0..40 {
        assert!(controller.enqueue(Message::sample(n)).await);
    }
    wait_until(|| controller.status().total_processed == 40, "40 processed").await;
    controller.stop().await;

    let status = controller.status();
    let accounted = status.queue_size as u64 + status.overflow_queue_size as u64 + status.in_flight;
    assert_eq!(accounted, status.total_produced - status.total_processed);
    assert_eq!(status.backlog_estimate, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_panicking_processor_does_not_kill_workers() {
    struct PanicOnce {
        armed: AtomicU64,
        seen: AtomicU64,
    }

    #[async_trait]
    impl Processor for PanicOnce {
        async fn process(&self, _msg: &Message) -> Result<(), ProcessError> {
            if self.armed.fetch_sub(1, Ordering::AcqRel) == 1 {
                panic!("boom");
            }
            self.seen.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    let processor = Arc::new(PanicOnce {
        armed: AtomicU64::new(1),
        seen: AtomicU64::new(0),
    });
    let controller = ControllerBuilder::new(fast_config())
        .with_processor(Arc::clone(&processor) as _)
        .build();

    controller.start().await;
    for n in 0..10 {
        assert!(controller.enqueue(Message::sample(n)).await);
    }
    // The panicking message is requeued and succeeds on redelivery.
    wait_until(|| controller.status().total_processed == 10, "10 processed").await;
    controller.stop().await;

    assert_eq!(processor.seen.load(Ordering::Relaxed), 10);
    assert!(controller.status().active_workers == 0);
}
