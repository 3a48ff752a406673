//! Error types for the taskport runtime
//!
//! [`TaskError`] is the value every completion handler receives. It is an
//! opaque code + message pair; the runtime itself only ever produces
//! [`TaskError::None`] and [`TaskError::OperationAborted`], everything else is
//! passed through from task bodies untouched.
//!
//! [`SchedError`] covers the few ways a scheduler can fail to start.

use core::fmt;

/// Code carried by [`TaskError::OperationAborted`]
pub const OPERATION_ABORTED: i32 = 0xEEEE_FFFFu32 as i32;

/// Error value handed to completion handlers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TaskError {
    /// No error (code 0)
    #[default]
    None,

    /// The task was canceled before it ran
    OperationAborted,

    /// Error reported by a task body
    User {
        code: i32,
        message: String,
    },
}

impl TaskError {
    /// Build an error from a code and message.
    ///
    /// Code 0 maps to [`TaskError::None`] and [`OPERATION_ABORTED`] maps to
    /// [`TaskError::OperationAborted`], so codes survive a round trip
    /// through `code()`.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        match code {
            0 => TaskError::None,
            OPERATION_ABORTED => TaskError::OperationAborted,
            _ => TaskError::User {
                code,
                message: message.into(),
            },
        }
    }

    /// Numeric code (0 means no error)
    #[inline]
    pub fn code(&self) -> i32 {
        match self {
            TaskError::None => 0,
            TaskError::OperationAborted => OPERATION_ABORTED,
            TaskError::User { code, .. } => *code,
        }
    }

    /// Human-readable message
    pub fn message(&self) -> &str {
        match self {
            TaskError::None => "",
            TaskError::OperationAborted => "operation aborted",
            TaskError::User { message, .. } => message,
        }
    }

    #[inline]
    pub fn is_ok(&self) -> bool {
        matches!(self, TaskError::None)
    }

    #[inline]
    pub fn is_err(&self) -> bool {
        !self.is_ok()
    }

    #[inline]
    pub fn is_aborted(&self) -> bool {
        matches!(self, TaskError::OperationAborted)
    }

    /// Reset to [`TaskError::None`]
    pub fn clear(&mut self) {
        *self = TaskError::None;
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::None => write!(f, "no error"),
            TaskError::OperationAborted => write!(f, "operation aborted"),
            TaskError::User { code, message } => write!(f, "error {}: {}", code, message),
        }
    }
}

impl std::error::Error for TaskError {}

/// Result type for scheduler construction
pub type SchedResult<T> = Result<T, SchedError>;

/// Errors that can occur while starting a scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedError {
    /// Configuration rejected by `SchedulerConfig::validate`
    InvalidConfig(&'static str),

    /// The OS refused to create a worker thread
    SpawnFailed(String),
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::InvalidConfig(reason) => write!(f, "invalid scheduler config: {}", reason),
            SchedError::SpawnFailed(reason) => write!(f, "failed to spawn worker: {}", reason),
        }
    }
}

impl std::error::Error for SchedError {}

impl From<std::io::Error> for SchedError {
    fn from(e: std::io::Error) -> Self {
        SchedError::SpawnFailed(e.to_string())
    }
}
