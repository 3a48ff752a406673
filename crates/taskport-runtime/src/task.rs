//! Task records
//!
//! A [`TaskRecord`] couples a task body with its completion and the operation
//! id that was reserved for it. A record is consumed exactly once: either a
//! worker executes it, or someone cancels it. Both paths end with the
//! completion posted to the port under the record's sequence number, which is
//! what releases the outstanding operation.

use taskport_core::{CompletionStatus, OperationId, TaskError};

use crate::handler::CompletionFn;
use crate::port::CompletionPort;

/// Type-erased task body. The body reports failure by writing the error.
pub type TaskFn = Box<dyn FnOnce(&mut TaskError) + Send + 'static>;

pub struct TaskRecord {
    id: OperationId,
    task: TaskFn,
    completion: CompletionFn,
}

impl TaskRecord {
    pub fn new(id: OperationId, task: TaskFn, completion: CompletionFn) -> Self {
        Self {
            id,
            task,
            completion,
        }
    }

    #[inline]
    pub fn id(&self) -> &OperationId {
        &self.id
    }

    /// Run the body on the calling thread, then post the completion with
    /// whatever error the body reported.
    pub fn execute(self, port: &CompletionPort) {
        let TaskRecord {
            id,
            task,
            completion,
        } = self;

        id.set_status(CompletionStatus::Executing);
        let mut error = TaskError::None;
        task(&mut error);

        let seqno = id.value();
        let finished: CompletionFn = Box::new(move |e: &TaskError| {
            completion(e);
            id.set_status(CompletionStatus::Complete);
        });
        port.post_with_seqno(finished, seqno, error);
    }

    /// Skip the body; post the completion with `OperationAborted`.
    pub fn cancel(self, port: &CompletionPort) {
        self.id.set_status(CompletionStatus::Canceled);
        port.post_with_seqno(self.completion, self.id.value(), TaskError::OperationAborted);
    }
}

impl std::fmt::Debug for TaskRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRecord").field("id", &self.id).finish_non_exhaustive()
    }
}
