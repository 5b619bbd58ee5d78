//! Tour of the manual control API: forcing strategies, resizing the
//! worker pool, tuning the simulated cost, and clearing the queue.
//!
//! Run with: `cargo run --example control`

use std::sync::Arc;
use std::time::Duration;

use floodgate::{ControllerBuilder, ControllerConfig, LogWriter, Message, Priority, Strategy};

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let mut cfg = ControllerConfig::default();
    cfg.consume_delay = Duration::from_millis(20);
    cfg.batch_size = 10;

    let controller = ControllerBuilder::new(cfg)
        .with_subscribers(vec![Arc::new(LogWriter) as _])
        .build();
    controller.start().await;

    // Selective: only every fifth message is marked essential.
    controller.force_strategy(Strategy::Selective).await;
    for n in 0..50usize {
        let msg = if n % 5 == 0 {
            Message::sample(n).with_priority(Priority::High)
        } else {
            Message::sample(n)
        };
        controller.enqueue(msg).await;
    }
    tokio::time::sleep(Duration::from_secs(1)).await;
    println!("after selective: {}", controller.statistics());

    // Batch: commit whole claims at a fraction of the per-message cost.
    if let Err(err) = controller.switch_strategy("batch").await {
        eprintln!("switch failed: {err}");
    }
    for n in 0..50usize {
        controller.enqueue(Message::sample(n)).await;
    }
    tokio::time::sleep(Duration::from_secs(1)).await;
    println!("after batch: {}", controller.statistics());

    // Manual pool resize, bypassing the autoscaler's step size.
    match controller.scale_consumers(10).await {
        Ok(applied) => println!("worker target now {applied}"),
        Err(err) => eprintln!("scale rejected: {err}"),
    }

    // Out-of-range requests are rejected and change nothing.
    if let Err(err) = controller.scale_consumers(0).await {
        println!("scale_consumers(0): {err}");
    }

    controller.set_consume_delay(Duration::from_millis(5));
    controller.force_strategy(Strategy::Normal).await;
    for n in 0..30usize {
        controller.enqueue(Message::sample(n)).await;
    }
    tokio::time::sleep(Duration::from_secs(1)).await;

    let discarded = controller.clear_queue();
    println!("cleared {discarded} pending messages");

    controller.stop().await;
    println!("final: {}", controller.statistics());
}
