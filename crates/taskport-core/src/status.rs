//! Completion status of a tracked operation

use core::fmt;

/// Lifecycle of an operation as observed through its id
///
/// Only meaningful with the `task-status` feature; without it ids never leave
/// `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompletionStatus {
    /// Not tracked or not yet admitted
    None = 0,

    /// Admitted, waiting in a queue
    Scheduled = 1,

    /// Task body running on a worker
    Executing = 2,

    /// Removed before it ran; completion received `OperationAborted`
    Canceled = 3,

    /// Completion handler has been invoked
    Complete = 4,
}

impl CompletionStatus {
    /// Canceled or complete
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, CompletionStatus::Canceled | CompletionStatus::Complete)
    }
}

impl From<u8> for CompletionStatus {
    fn from(v: u8) -> Self {
        match v {
            1 => CompletionStatus::Scheduled,
            2 => CompletionStatus::Executing,
            3 => CompletionStatus::Canceled,
            4 => CompletionStatus::Complete,
            _ => CompletionStatus::None,
        }
    }
}

impl From<CompletionStatus> for u8 {
    fn from(status: CompletionStatus) -> u8 {
        status as u8
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompletionStatus::None => "none",
            CompletionStatus::Scheduled => "scheduled",
            CompletionStatus::Executing => "executing",
            CompletionStatus::Canceled => "canceled",
            CompletionStatus::Complete => "complete",
        };
        f.write_str(s)
    }
}
