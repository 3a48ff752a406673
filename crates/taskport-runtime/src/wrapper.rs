//! Completion handlers bound to a reserved operation
//!
//! [`wrap_completion_handler`] reserves an operation id on a port and binds a
//! completion to it. Until the wrapper is invoked or dropped the port counts
//! the operation as outstanding, so `wait()` keeps blocking for it. This is
//! how completions produced outside the scheduler (a callback from another
//! library, a hand-rolled worker) take part in a port's bookkeeping.

use std::fmt;

use taskport_core::{OperationId, TaskError};

use crate::port::CompletionPort;

pub struct CompletionHandlerWrapper<F> {
    port: CompletionPort,
    id: OperationId,
    handler: Option<F>,
}

/// Bind `handler` to a fresh operation on `port`
pub fn wrap_completion_handler<F>(port: &CompletionPort, handler: F) -> CompletionHandlerWrapper<F>
where
    F: FnOnce(&TaskError) + Send + 'static,
{
    CompletionHandlerWrapper {
        port: port.clone(),
        id: port.next_operation_id(),
        handler: Some(handler),
    }
}

impl<F> CompletionHandlerWrapper<F>
where
    F: FnOnce(&TaskError) + Send + 'static,
{
    /// Post the handler to the port with `error`.
    ///
    /// # Panics
    ///
    /// If the wrapper has already been invoked.
    pub fn invoke(&mut self, error: TaskError) {
        let Some(handler) = self.handler.take() else {
            panic!("completion handler for operation {} invoked more than once", self.id);
        };
        self.port.post_with_seqno(Box::new(handler), self.id.value(), error);
    }

    /// [`invoke`](Self::invoke) with no error
    pub fn invoke_ok(&mut self) {
        self.invoke(TaskError::None)
    }

    /// True until the wrapper has been invoked
    pub fn is_pending(&self) -> bool {
        self.handler.is_some()
    }

    pub fn operation_id(&self) -> &OperationId {
        &self.id
    }
}

impl<F> Drop for CompletionHandlerWrapper<F> {
    /// An uninvoked wrapper releases its operation with a no-op in place of
    /// the handler, which is dropped unrun.
    fn drop(&mut self) {
        if self.handler.take().is_some() && self.id.is_valid() {
            self.port
                .post_with_seqno(Box::new(|_: &TaskError| {}), self.id.value(), TaskError::None);
        }
    }
}

impl<F> fmt::Debug for CompletionHandlerWrapper<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionHandlerWrapper")
            .field("id", &self.id)
            .field("pending", &self.handler.is_some())
            .finish()
    }
}
