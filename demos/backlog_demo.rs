//! Floods the controller faster than it can drain and watches it adapt:
//! the monitor flips to the overflow strategy, the autoscaler adds
//! workers, and once the burst passes everything relaxes back to normal.
//!
//! Run with: `cargo run --example backlog_demo`

use std::sync::Arc;
use std::time::Duration;

use floodgate::{ControllerBuilder, ControllerConfig, LogWriter, Message, Priority};

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let mut cfg = ControllerConfig::default();
    cfg.queue_capacity = 500;
    cfg.high_watermark = 100;
    cfg.scale_up_threshold = 100;
    cfg.scale_down_threshold = 20;
    cfg.monitor_interval = Duration::from_millis(500);
    cfg.consume_delay = Duration::from_millis(50);
    cfg.overflow_delay = Duration::from_millis(5);

    let controller = Arc::new(
        ControllerBuilder::new(cfg)
            .with_subscribers(vec![Arc::new(LogWriter) as _])
            .build(),
    );
    controller.start().await;

    // Two producers flood the queue for a few seconds.
    let mut producers = Vec::new();
    for p in 0..2u32 {
        let controller = Arc::clone(&controller);
        producers.push(tokio::spawn(async move {
            for n in 0..400usize {
                let msg = if n % 10 == 0 {
                    Message::sample(n).with_priority(Priority::High)
                } else {
                    Message::sample(n)
                };
                if !controller.enqueue(msg).await {
                    println!("producer {p}: backpressure at message {n}");
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }));
    }

    let reporter = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
                println!("{}", controller.statistics());
            }
        })
    };

    for producer in producers {
        let _ = producer.await;
    }

    // Let the backlog drain and the strategy recover before stopping.
    while controller.status().backlog_estimate > 0 {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    reporter.abort();
    controller.stop().await;
    println!("final: {}", controller.statistics());
}
