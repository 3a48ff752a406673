//! Channel group example
//!
//! Three "connections" share one scheduler. Requests for the same connection
//! are handled strictly in order; different connections interleave freely.
//! An urgent request jumps to the front of its connection's queue.

use std::time::Duration;

use taskport::{kinfo, CompletionPort, TaskChannelGroup, TaskScheduler};

fn main() {
    println!("=== taskport channel example ===\n");

    let port = CompletionPort::new();
    let scheduler = TaskScheduler::with_concurrency(&port, 4);
    let connections: TaskChannelGroup<String> = TaskChannelGroup::new(&scheduler);

    for request in 0..4 {
        for conn in ["alpha", "beta", "gamma"] {
            let key = conn.to_string();
            let label = format!("{}#{}", conn, request);
            let done = label.clone();
            connections.enqueue_back(
                &key,
                move |_| {
                    std::thread::sleep(Duration::from_millis(5));
                    println!("handling {}", label);
                },
                move |_| kinfo!("{} answered", done),
            );
        }
    }

    let beta = "beta".to_string();
    connections.enqueue_front(&beta, |_| println!("handling beta#urgent"), |_| {});
    println!("beta has {} request(s) waiting", connections.enqueued_tasks(&beta));

    let n = port.wait();
    println!("\n{} completion handler(s) ran", n);

    if let Some(channel) = connections.erase(&beta) {
        println!("erased beta, {} request(s) left in it", channel.enqueued_tasks());
    }
    println!("{} connection(s) remain", connections.len());
    println!("\n=== example complete ===");
}
