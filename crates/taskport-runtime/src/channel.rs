//! Task channels
//!
//! A [`TaskChannel`] serializes a stream of tasks over a shared
//! [`TaskScheduler`](crate::TaskScheduler): at most one of its tasks is inside
//! the scheduler at any time, and task N+1 is only handed over after task N's
//! completion handler has run. Tasks queued with `enqueue_front` jump ahead of
//! everything still waiting in the channel.
//!
//! Each task's completion is wrapped so that, once the user's completion
//! returns, the channel submits its next task. The wrapper only holds a weak
//! reference: queued records never keep their channel alive. Dropping the
//! last handle to a channel cancels the tasks still waiting in it (their
//! completions receive `OperationAborted`); the in-flight task belongs to the
//! scheduler and completes normally.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use taskport_core::{ktrace, OperationId, TaskError, TaskId};

use crate::scheduler::SchedulerHandle;
use crate::task::TaskRecord;

#[derive(Default)]
struct ChannelState {
    /// Task currently handed to the scheduler
    current: Option<OperationId>,
    pending: VecDeque<TaskRecord>,
    /// Removed from `pending` by a cancel, completion not yet forwarded
    canceled: VecDeque<TaskRecord>,
}

pub struct TaskChannel {
    scheduler: SchedulerHandle,
    state: Mutex<ChannelState>,
}

impl TaskChannel {
    /// Create a channel over `scheduler` (a `TaskScheduler` or a handle)
    pub fn make<S: AsRef<SchedulerHandle>>(scheduler: &S) -> Arc<Self> {
        Arc::new(Self {
            scheduler: scheduler.as_ref().clone(),
            state: Mutex::new(ChannelState::default()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }

    /// Queue behind every task already in the channel
    pub fn enqueue_back<T, C>(self: &Arc<Self>, task: T, completion: C) -> TaskId
    where
        T: FnOnce(&mut TaskError) + Send + 'static,
        C: FnOnce(&TaskError) + Send + 'static,
    {
        self.enqueue(task, completion, false)
    }

    /// Queue ahead of every task still waiting in the channel
    pub fn enqueue_front<T, C>(self: &Arc<Self>, task: T, completion: C) -> TaskId
    where
        T: FnOnce(&mut TaskError) + Send + 'static,
        C: FnOnce(&TaskError) + Send + 'static,
    {
        self.enqueue(task, completion, true)
    }

    pub fn enqueue_back_task<T>(self: &Arc<Self>, task: T) -> TaskId
    where
        T: FnOnce(&mut TaskError) + Send + 'static,
    {
        self.enqueue(task, |_: &TaskError| {}, false)
    }

    pub fn enqueue_front_task<T>(self: &Arc<Self>, task: T) -> TaskId
    where
        T: FnOnce(&mut TaskError) + Send + 'static,
    {
        self.enqueue(task, |_: &TaskError| {}, true)
    }

    fn enqueue<T, C>(self: &Arc<Self>, task: T, completion: C, front: bool) -> TaskId
    where
        T: FnOnce(&mut TaskError) + Send + 'static,
        C: FnOnce(&TaskError) + Send + 'static,
    {
        if !self.scheduler.is_running() {
            return TaskId::NONE;
        }
        let id = self.scheduler.port().next_operation_id();
        if id.is_none() {
            return TaskId::NONE;
        }

        let channel: Weak<TaskChannel> = Arc::downgrade(self);
        let finished = id.clone();
        let proxy = move |e: &TaskError| {
            completion(e);
            if let Some(channel) = channel.upgrade() {
                channel.advance(&finished);
            }
        };
        let record = TaskRecord::new(id.clone(), Box::new(task), Box::new(proxy));

        let mut st = self.lock();
        if st.current.is_none() {
            st.current = Some(id.clone());
            self.scheduler.submit(record);
        } else if front {
            st.pending.push_front(record);
        } else {
            st.pending.push_back(record);
        }
        TaskId::new(id)
    }

    /// Called after the completion of `finished` ran: hand the next task to
    /// the scheduler. Completions of tasks canceled out of `pending` are not
    /// `current` and leave the channel alone.
    fn advance(&self, finished: &OperationId) {
        let mut st = self.lock();
        if st.current.as_ref() != Some(finished) {
            return;
        }
        st.current = None;
        if let Some(next) = st.pending.pop_front() {
            st.current = Some(next.id().clone());
            self.scheduler.submit(next);
        }
    }

    fn flush_canceled(&self) {
        loop {
            let record = self.lock().canceled.pop_front();
            match record {
                Some(record) => record.cancel(self.scheduler.port()),
                None => break,
            }
        }
    }

    /// Cancel a task of this channel.
    ///
    /// The in-flight task is canceled through the scheduler, so this only
    /// succeeds if no worker has picked it up yet. A task still waiting in the
    /// channel is always canceled. Either way its completion receives
    /// `OperationAborted`.
    pub fn cancel(&self, id: &TaskId) -> bool {
        if !id.is_valid() {
            return false;
        }
        let mut st = self.lock();
        if st.current.as_ref() == Some(id.operation()) {
            drop(st);
            return self.scheduler.cancel(id);
        }
        let Some(pos) = st.pending.iter().position(|r| r.id() == id.operation()) else {
            return false;
        };
        if let Some(record) = st.pending.remove(pos) {
            st.canceled.push_back(record);
        }
        drop(st);
        ktrace!("channel canceled task {}", id);
        self.flush_canceled();
        true
    }

    /// Cancel every waiting task and, if no worker has started it yet, the
    /// in-flight one. Returns how many were actually canceled.
    pub fn cancel_all(&self) -> usize {
        let (mut n, current) = {
            let mut st = self.lock();
            let n = st.pending.len();
            let drained: Vec<TaskRecord> = st.pending.drain(..).collect();
            st.canceled.extend(drained);
            (n, st.current.clone())
        };
        self.flush_canceled();
        if let Some(current) = current {
            if self.scheduler.cancel(&TaskId::new(current)) {
                n += 1;
            }
        }
        n
    }

    /// Tasks waiting in the channel (the in-flight task is not counted)
    pub fn enqueued_tasks(&self) -> usize {
        self.lock().pending.len()
    }

    /// The task handed to the scheduler, or an invalid id if the channel is idle
    pub fn current_task(&self) -> TaskId {
        self.lock().current.clone().map(TaskId::new).unwrap_or_default()
    }
}

impl Drop for TaskChannel {
    fn drop(&mut self) {
        let st = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        st.current = None;
        let mut waiting: Vec<TaskRecord> = st.canceled.drain(..).collect();
        waiting.extend(st.pending.drain(..));
        if waiting.is_empty() {
            return;
        }
        ktrace!("channel dropped, canceling {} waiting task(s)", waiting.len());
        for record in waiting {
            record.cancel(self.scheduler.port());
        }
    }
}

impl fmt::Debug for TaskChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.lock();
        f.debug_struct("TaskChannel")
            .field("current", &st.current)
            .field("pending", &st.pending.len())
            .finish()
    }
}
