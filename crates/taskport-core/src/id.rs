//! Operation and task identifiers
//!
//! An [`OperationId`] is the sequence number a completion port hands out when
//! it admits an operation. The value 0 is reserved as "none": it is what a
//! stopped port returns, and it is also the sequence number of dispatched
//! handlers.
//!
//! With the `task-status` feature every valid id also carries shared state
//! that follows the operation through its lifecycle and can be waited on.
//! Clones of an id share that state. Equality, ordering and hashing only look
//! at the numeric value.

use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};

use crate::status::CompletionStatus;

cfg_if::cfg_if! {
    if #[cfg(feature = "task-status")] {
        use std::sync::atomic::{AtomicU8, Ordering as AtomicOrdering};
        use std::sync::Arc;
        use std::time::Duration;

        use crate::event::Event;

        /// Status cell shared by every clone of an id
        struct Tracker {
            status: AtomicU8,
            done: Event,
        }

        impl Tracker {
            fn new() -> Arc<Self> {
                Arc::new(Self {
                    status: AtomicU8::new(CompletionStatus::Scheduled as u8),
                    done: Event::new(false),
                })
            }

            fn status(&self) -> CompletionStatus {
                CompletionStatus::from(self.status.load(AtomicOrdering::Acquire))
            }

            /// Terminal states are sticky.
            fn transition(&self, next: CompletionStatus) {
                let mut cur = self.status.load(AtomicOrdering::Acquire);
                loop {
                    if CompletionStatus::from(cur).is_terminal() {
                        return;
                    }
                    match self.status.compare_exchange_weak(
                        cur,
                        next as u8,
                        AtomicOrdering::AcqRel,
                        AtomicOrdering::Acquire,
                    ) {
                        Ok(_) => break,
                        Err(actual) => cur = actual,
                    }
                }
                if next.is_terminal() {
                    self.done.notify_all();
                }
            }
        }
    }
}

/// Sequence number of an admitted operation
#[derive(Clone)]
pub struct OperationId {
    value: usize,
    #[cfg(feature = "task-status")]
    tracker: Option<Arc<Tracker>>,
}

impl OperationId {
    /// The invalid id
    pub const NONE: OperationId = OperationId {
        value: 0,
        #[cfg(feature = "task-status")]
        tracker: None,
    };

    /// Wrap a sequence number. Non-zero ids start out `Scheduled`.
    pub fn new(value: usize) -> Self {
        Self {
            value,
            #[cfg(feature = "task-status")]
            tracker: (value != 0).then(Tracker::new),
        }
    }

    #[inline]
    pub const fn value(&self) -> usize {
        self.value
    }

    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.value != 0
    }

    #[inline]
    pub const fn is_none(&self) -> bool {
        self.value == 0
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "task-status")] {
        impl OperationId {
            /// Record a lifecycle transition. Ignored once the id is terminal.
            pub fn set_status(&self, status: CompletionStatus) {
                if let Some(tracker) = &self.tracker {
                    tracker.transition(status);
                }
            }

            pub fn status(&self) -> CompletionStatus {
                self.tracker
                    .as_ref()
                    .map_or(CompletionStatus::None, |t| t.status())
            }

            /// Block until canceled or complete. Returns at once for `NONE`.
            pub fn wait(&self) {
                if let Some(tracker) = &self.tracker {
                    tracker.done.wait();
                }
            }

            /// Bounded [`wait`](Self::wait); true if the operation finished in time.
            pub fn wait_for(&self, timeout: Duration) -> bool {
                match &self.tracker {
                    Some(tracker) => !tracker.done.wait_for(timeout).timed_out(),
                    None => true,
                }
            }
        }
    } else {
        impl OperationId {
            #[inline(always)]
            pub fn set_status(&self, _status: CompletionStatus) {}
        }
    }
}

impl PartialEq for OperationId {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for OperationId {}

impl PartialOrd for OperationId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OperationId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl Hash for OperationId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl Default for OperationId {
    fn default() -> Self {
        OperationId::NONE
    }
}

impl fmt::Debug for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "OperationId(NONE)")
        } else {
            write!(f, "OperationId({})", self.value)
        }
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.value)
        }
    }
}

/// Handle to a scheduled task
///
/// Returned by the scheduler and channels; pass it back to `cancel`.
/// An invalid id means the task was not admitted.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(OperationId);

impl TaskId {
    pub const NONE: TaskId = TaskId(OperationId::NONE);

    #[inline]
    pub fn new(op: OperationId) -> Self {
        TaskId(op)
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0.is_valid()
    }

    #[inline]
    pub fn value(&self) -> usize {
        self.0.value()
    }

    /// The underlying operation id
    #[inline]
    pub fn operation(&self) -> &OperationId {
        &self.0
    }
}

#[cfg(feature = "task-status")]
impl TaskId {
    pub fn status(&self) -> CompletionStatus {
        self.0.status()
    }

    pub fn wait(&self) {
        self.0.wait()
    }

    pub fn wait_for(&self, timeout: Duration) -> bool {
        self.0.wait_for(timeout)
    }
}

impl From<OperationId> for TaskId {
    fn from(op: OperationId) -> Self {
        TaskId(op)
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "TaskId({})", self.value())
        } else {
            write!(f, "TaskId(NONE)")
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
