//! Task status example
//!
//! With the `task-status` feature a task id can be observed and waited on
//! directly, independent of whichever thread drains the port.

use std::thread;
use std::time::Duration;

use taskport::{CompletionPort, TaskScheduler};

fn main() {
    println!("=== taskport task-wait example ===\n");

    let port = CompletionPort::new();
    let scheduler = TaskScheduler::with_concurrency(&port, 2);

    let slow = scheduler.schedule_task(|_| thread::sleep(Duration::from_millis(200)));
    let fast = scheduler.schedule_task(|_| {});
    println!("slow: {}, fast: {}", slow.status(), fast.status());

    let drainer = {
        let port = port.clone();
        thread::spawn(move || port.run())
    };

    fast.wait();
    println!("fast finished: {}", fast.status());

    if !slow.wait_for(Duration::from_millis(10)) {
        println!("slow still {}", slow.status());
    }
    slow.wait();
    println!("slow finished: {}", slow.status());

    port.stop();
    let n = drainer.join().unwrap_or(0);
    println!("\ndrainer ran {} completion handler(s)", n);
    println!("\n=== example complete ===");
}
