//! Worker context example
//!
//! Every worker thread sets up a per-thread resource before entering its run
//! loop; tasks executing on that worker see it.

use std::cell::RefCell;

use taskport::{kinfo, CompletionPort, TaskScheduler};

thread_local! {
    static WORKER_NAME: RefCell<String> = const { RefCell::new(String::new()) };
}

fn main() {
    println!("=== taskport worker context example ===\n");

    let port = CompletionPort::new();
    let scheduler = TaskScheduler::with_context(&port, 3, |run| {
        let name = std::thread::current().name().unwrap_or("worker").to_string();
        WORKER_NAME.with(|w| *w.borrow_mut() = name.clone());
        kinfo!("{} entering run loop", name);
        run();
        kinfo!("{} left run loop", name);
    });

    for i in 0..9 {
        scheduler.schedule(
            move |_| {
                let who = WORKER_NAME.with(|w| w.borrow().clone());
                println!("task {} on {}", i, who);
            },
            |_| {},
        );
    }

    port.wait();
    drop(scheduler);
    println!("\n=== example complete ===");
}
