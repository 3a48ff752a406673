//! # taskport - completion-port task runtime
//!
//! Run closures on a pool of worker threads and collect their results through
//! a single ordered queue that any thread can drain.
//!
//! ## Features
//!
//! - **Completion port**: ready completions drained by `wait`, `run` or `pull`
//!   on whichever threads you choose; dispatched completions jump the queue
//! - **Task scheduler**: fixed worker pool, optional per-worker context,
//!   cancellation of tasks that have not started
//! - **Task channels**: per-stream FIFO over a shared scheduler, with
//!   front-of-queue priority and per-key channel groups
//! - **Task status** (`task-status` feature): observe and wait on single tasks
//!
//! ## Quick Start
//!
//! ```ignore
//! use taskport::{CompletionPort, TaskError, TaskScheduler};
//!
//! fn main() {
//!     let port = CompletionPort::new();
//!     let scheduler = TaskScheduler::new(&port);
//!
//!     scheduler.schedule(
//!         |err: &mut TaskError| {
//!             // runs on a worker thread
//!             if std::fs::metadata("/etc/hosts").is_err() {
//!                 *err = TaskError::new(2, "missing");
//!             }
//!         },
//!         |err: &TaskError| {
//!             // runs on the thread draining the port
//!             println!("done: {}", err);
//!         },
//!     );
//!
//!     // blocks until every scheduled task has completed
//!     port.wait();
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        User Code                            │
//! │      schedule(), enqueue_back(), wait(), run(), cancel()    │
//! └─────────────────────────────────────────────────────────────┘
//!            │                                   ▲
//!            ▼                                   │
//! ┌──────────────────────┐              ┌──────────────────────┐
//! │  TaskChannel(Group)  │              │    CompletionPort    │
//! │  one task in flight  │              │  dispatch > post,    │
//! │  per channel         │              │  seqno order         │
//! └──────────────────────┘              └──────────────────────┘
//!            │                                   ▲
//!            ▼                                   │ completion
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TaskScheduler                           │
//! │          pending FIFO, cancel, worker context               │
//! └─────────────────────────────────────────────────────────────┘
//!          │                   │                   │
//!          ▼                   ▼                   ▼
//!    ┌───────────┐      ┌───────────┐      ┌───────────┐
//!    │  Worker   │      │  Worker   │      │  Worker   │
//!    │  Thread   │      │  Thread   │      │  Thread   │
//!    └───────────┘      └───────────┘      └───────────┘
//! ```
//!
//! ## Logging
//!
//! Set `TASKPORT_LOG_LEVEL=debug` (or `trace`) to see scheduler lifecycle
//! events on stderr.

// Re-export core types
pub use taskport_core::{
    constants, CompletionStatus, Event, OperationId, SchedError, SchedResult, TaskError, TaskId,
    WaitStatus, OPERATION_ABORTED,
};

// Re-export logging macros
pub use taskport_core::kprint::{
    init as init_logging, set_flush_enabled, set_log_level, LogLevel,
};
pub use taskport_core::{kdebug, kerror, kinfo, ktrace, kwarn};

// Re-export runtime types
pub use taskport_runtime::{
    wrap_completion_handler, CompletionHandlerWrapper, CompletionPort, SchedulerConfig,
    SchedulerHandle, TaskChannel, TaskChannelGroup, TaskScheduler, ThreadGroup, WorkerContext,
    WorkerFn,
};

/// Start a scheduler on `port` configured from `TASKPORT_WORKERS` /
/// `TASKPORT_THREAD_NAME`
pub fn scheduler_from_env(port: &CompletionPort) -> SchedResult<TaskScheduler> {
    init_logging();
    TaskScheduler::from_config(port, SchedulerConfig::from_env())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_end_to_end_mixed_sources() {
        let port = CompletionPort::new();
        let scheduler = TaskScheduler::with_concurrency(&port, 3);
        let group: TaskChannelGroup<u8> = TaskChannelGroup::new(&scheduler);
        let hits = Arc::new(AtomicUsize::new(0));

        for i in 0..10u8 {
            let h = Arc::clone(&hits);
            scheduler.schedule(|_| {}, move |_| {
                h.fetch_add(1, Ordering::SeqCst);
            });
            let h = Arc::clone(&hits);
            group.enqueue_back(&(i % 2), |_| {}, move |_| {
                h.fetch_add(1, Ordering::SeqCst);
            });
        }
        let h = Arc::clone(&hits);
        let mut wrapper = wrap_completion_handler(&port, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        wrapper.invoke_ok();

        assert_eq!(port.wait(), 21);
        assert_eq!(hits.load(Ordering::SeqCst), 21);
    }

    #[test]
    fn test_scheduler_from_env_defaults() {
        let port = CompletionPort::new();
        let scheduler = scheduler_from_env(&port).unwrap();
        assert!(scheduler.concurrency() >= 1);
    }
}
