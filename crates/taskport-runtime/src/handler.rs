//! Ready completion handlers and their drain order
//!
//! A [`HandlerRecord`] is a boxed completion closure bundled with the error it
//! will receive and the sequence number that decides its place in the port's
//! ready heap.
//!
//! # Ordering
//!
//! Sequence 0 marks a dispatched handler and always drains first. Among
//! posted handlers the lower sequence number drains first, but sequence
//! numbers wrap, so once two values are more than half the number space apart
//! the numerically larger one is treated as the older.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use taskport_core::TaskError;

/// Type-erased completion closure
pub type CompletionFn = Box<dyn FnOnce(&TaskError) + Send + 'static>;

/// Distance beyond which two sequence numbers are considered wrapped
const WRAP_GAP: usize = usize::MAX / 2;

/// Compare two sequence numbers by readiness.
///
/// `Greater` means `a` drains before `b`.
pub fn seqno_readiness(a: usize, b: usize) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    if a == 0 {
        return Ordering::Greater;
    }
    if b == 0 {
        return Ordering::Less;
    }
    if a.abs_diff(b) > WRAP_GAP {
        a.cmp(&b)
    } else {
        b.cmp(&a)
    }
}

/// A completion that is ready to run
pub struct HandlerRecord {
    seqno: usize,
    error: TaskError,
    handler: CompletionFn,
}

impl HandlerRecord {
    pub fn new(handler: CompletionFn, seqno: usize, error: TaskError) -> Self {
        Self {
            seqno,
            error,
            handler,
        }
    }

    #[inline]
    pub fn seqno(&self) -> usize {
        self.seqno
    }

    #[inline]
    pub fn error(&self) -> &TaskError {
        &self.error
    }

    /// Run the handler, consuming the record
    pub fn complete(self) {
        (self.handler)(&self.error)
    }
}

impl PartialEq for HandlerRecord {
    fn eq(&self, other: &Self) -> bool {
        self.seqno == other.seqno
    }
}

impl Eq for HandlerRecord {}

impl PartialOrd for HandlerRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HandlerRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        seqno_readiness(self.seqno, other.seqno)
    }
}

impl std::fmt::Debug for HandlerRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRecord")
            .field("seqno", &self.seqno)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

/// Max-heap of ready handlers, most ready on top
pub type ReadyQueue = BinaryHeap<HandlerRecord>;
