//! # taskport-runtime
//!
//! Threads, queues and synchronization for the taskport runtime.
//!
//! This crate provides:
//! - [`CompletionPort`] - ordered queue of ready completion handlers
//! - [`TaskScheduler`] - worker pool that runs tasks and posts completions
//! - [`TaskChannel`] / [`TaskChannelGroup`] - serialized task streams
//! - [`CompletionHandlerWrapper`] - completions bound to a reserved operation
//! - [`ThreadGroup`] - named worker threads joined on drop
//!
//! Lock order is channel group, then channel, then scheduler, then port. No
//! lock is held while user code runs.

pub mod channel;
pub mod config;
pub mod group;
pub mod handler;
pub mod port;
pub mod scheduler;
pub mod task;
pub mod worker;
pub mod wrapper;

// Re-exports
pub use channel::TaskChannel;
pub use config::{SchedulerConfig, WorkerContext, WorkerFn};
pub use group::TaskChannelGroup;
pub use handler::{seqno_readiness, CompletionFn};
pub use port::CompletionPort;
pub use scheduler::{SchedulerHandle, TaskScheduler};
pub use task::TaskFn;
pub use worker::ThreadGroup;
pub use wrapper::{wrap_completion_handler, CompletionHandlerWrapper};
