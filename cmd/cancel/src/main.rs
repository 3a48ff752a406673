//! Cancellation example
//!
//! A single worker is kept busy while more tasks queue up behind it. Some are
//! canceled one by one, the rest in bulk; every canceled task's completion
//! still runs, with `OperationAborted`.

use std::sync::Arc;

use taskport::{CompletionPort, Event, TaskError, TaskId, TaskScheduler};

fn queue_behind_gate(scheduler: &TaskScheduler, gate: &Arc<Event>, n: usize) -> Vec<TaskId> {
    let g = Arc::clone(gate);
    scheduler.schedule(move |_| g.wait(), |_| println!("blocker finished"));

    (0..n)
        .map(|i| {
            scheduler.schedule(
                move |_| println!("task {} executing", i),
                move |err: &TaskError| {
                    if err.is_aborted() {
                        println!("task {} canceled", i);
                    } else {
                        println!("task {} completed", i);
                    }
                },
            )
        })
        .collect()
}

fn main() {
    println!("=== taskport cancel example ===\n");

    let port = CompletionPort::new();
    let scheduler = TaskScheduler::with_concurrency(&port, 1);

    println!("-- single cancels --");
    let gate = Arc::new(Event::default());
    let ids = queue_behind_gate(&scheduler, &gate, 6);
    for id in ids.iter().step_by(2) {
        println!("cancel {} -> {}", id, scheduler.cancel(id));
    }
    println!("still pending: {}", scheduler.packaged_tasks());
    gate.notify_all();
    println!("{} completion handler(s) ran\n", port.wait());

    println!("-- cancel_all --");
    let gate = Arc::new(Event::default());
    queue_behind_gate(&scheduler, &gate, 4);
    // the blocker may or may not have reached the worker yet
    println!("canceled {} task(s)", scheduler.cancel_all());
    gate.notify_all();
    println!("{} completion handler(s) ran", port.wait());

    println!("\n=== example complete ===");
}
