//! Basic taskport example
//!
//! Schedules a handful of tasks, one of which fails, and drains their
//! completions on the main thread.
//!
//! # Environment Variables
//!
//! - `TASKPORT_WORKERS=<n>` - Worker count (default: one per CPU)
//! - `TASKPORT_LOG_LEVEL=debug` - Log level (off, error, warn, info, debug, trace)

use std::time::Duration;

use taskport::{kinfo, scheduler_from_env, CompletionPort, TaskError};

// TASKPORT_LOG_LEVEL=debug cargo run -p taskport-basic
fn main() {
    println!("=== taskport basic example ===\n");

    let port = CompletionPort::new();
    let scheduler = match scheduler_from_env(&port) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("cannot start scheduler: {}", e);
            std::process::exit(1);
        }
    };
    kinfo!("scheduler running {} worker(s)", scheduler.concurrency());

    for i in 1..=5u64 {
        let id = scheduler.schedule(
            move |err: &mut TaskError| {
                std::thread::sleep(Duration::from_millis(10 * i));
                if i == 3 {
                    *err = TaskError::new(3, "task three gave up");
                }
            },
            move |err: &TaskError| {
                if err.is_ok() {
                    println!("task {} done", i);
                } else {
                    println!("task {} failed: {}", i, err);
                }
            },
        );
        println!("scheduled task {} (id={})", i, id);
    }

    // jumps ahead of every task completion already waiting in the port
    port.dispatch(|_| println!("dispatched handler runs first"));

    let n = port.wait();
    println!("\n{} completion handler(s) ran", n);
    println!("\n=== example complete ===");
}
