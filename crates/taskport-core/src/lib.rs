//! # taskport-core
//!
//! Platform-agnostic building blocks for the taskport runtime.
//!
//! ## Modules
//!
//! - `id` - Operation and task identifiers
//! - `status` - Completion status of tracked operations
//! - `error` - Completion error value and scheduler startup errors
//! - `event` - Manual-reset event
//! - `kprint` - Leveled logging macros
//!
//! ## Features
//!
//! - `task-status` - ids carry observable status and can be waited on

pub mod error;
pub mod event;
pub mod id;
pub mod kprint;
pub mod status;

pub use error::{SchedError, SchedResult, TaskError, OPERATION_ABORTED};
pub use event::{Event, WaitStatus};
pub use id::{OperationId, TaskId};
pub use status::CompletionStatus;

/// Runtime limits and defaults
pub mod constants {
    /// Upper bound on the auto-detected worker count
    pub const MAX_WORKERS: usize = 1024;

    /// Default worker thread name prefix
    pub const DEFAULT_THREAD_NAME: &str = "taskport-worker";

    /// Env var overriding the worker count
    pub const ENV_WORKERS: &str = "TASKPORT_WORKERS";

    /// Env var overriding the worker thread name prefix
    pub const ENV_THREAD_NAME: &str = "TASKPORT_THREAD_NAME";
}
