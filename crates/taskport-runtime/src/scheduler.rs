//! Task scheduler
//!
//! A fixed pool of worker threads pulling [`TaskRecord`]s from a shared FIFO.
//! Each finished task has its completion posted to the scheduler's
//! [`CompletionPort`]; completions therefore never run on a worker, they run
//! on whichever thread drains the port.
//!
//! ```text
//!   schedule() ──▶ pending FIFO ──▶ worker: task body ──▶ port ──▶ wait()/run()
//!                      │                                    ▲
//!                      └── cancel(): completion(aborted) ───┘
//! ```
//!
//! # Teardown
//!
//! Dropping the [`TaskScheduler`] stops the workers from taking new work,
//! cancels everything still pending (each completion receives
//! `OperationAborted`), and joins the workers. Tasks already executing run to
//! completion and post normally. [`SchedulerHandle`]s that outlive the
//! scheduler turn into no-ops that return invalid ids.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use taskport_core::{kdebug, kerror, ktrace, SchedError, SchedResult, TaskError, TaskId};

use crate::config::{SchedulerConfig, WorkerContext, WorkerFn};
use crate::port::CompletionPort;
use crate::task::TaskRecord;
use crate::worker::ThreadGroup;

struct PendingQueue {
    tasks: VecDeque<TaskRecord>,
    /// Set on teardown; workers exit and new records are canceled
    stopped: bool,
}

struct SchedulerShared {
    port: CompletionPort,
    queue: Mutex<PendingQueue>,
    cond: Condvar,
    concurrency: usize,
}

impl SchedulerShared {
    fn lock(&self) -> MutexGuard<'_, PendingQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Worker run loop
    fn run_worker(&self) {
        loop {
            let record = {
                let mut q = self.lock();
                loop {
                    if q.stopped {
                        return;
                    }
                    if let Some(record) = q.tasks.pop_front() {
                        break record;
                    }
                    q = self.cond.wait(q).unwrap_or_else(PoisonError::into_inner);
                }
            };
            ktrace!("executing task {}", record.id());
            record.execute(&self.port);
        }
    }

    /// Mark stopped and hand back whatever was still pending
    fn shutdown(&self) -> Vec<TaskRecord> {
        let pending: Vec<TaskRecord> = {
            let mut q = self.lock();
            q.stopped = true;
            q.tasks.drain(..).collect()
        };
        self.cond.notify_all();
        pending
    }
}

fn worker_main(shared: Arc<SchedulerShared>, context: Option<WorkerContext>) {
    let run: WorkerFn = Box::new(move || shared.run_worker());
    match context {
        Some(context) => context(run),
        None => run(),
    }
}

/// Cheap, clonable access to a scheduler
///
/// Handles do not keep the worker pool alive. Once the owning
/// [`TaskScheduler`] is dropped, `schedule` returns invalid ids and every
/// other operation reports nothing to do.
#[derive(Clone)]
pub struct SchedulerHandle {
    shared: Arc<SchedulerShared>,
}

impl SchedulerHandle {
    /// Port that receives this scheduler's completions
    pub fn port(&self) -> &CompletionPort {
        &self.shared.port
    }

    /// Number of worker threads
    pub fn concurrency(&self) -> usize {
        self.shared.concurrency
    }

    /// False once the owning scheduler has been dropped
    pub fn is_running(&self) -> bool {
        !self.shared.lock().stopped
    }

    pub fn same_scheduler(a: &SchedulerHandle, b: &SchedulerHandle) -> bool {
        Arc::ptr_eq(&a.shared, &b.shared)
    }

    /// Run `task` on a worker, then post `completion` with the error the
    /// task reported.
    ///
    /// Returns an invalid id, and drops both closures unrun, if the port is
    /// stopped or the scheduler is gone.
    pub fn schedule<T, C>(&self, task: T, completion: C) -> TaskId
    where
        T: FnOnce(&mut TaskError) + Send + 'static,
        C: FnOnce(&TaskError) + Send + 'static,
    {
        if !self.is_running() {
            return TaskId::NONE;
        }
        let id = self.shared.port.next_operation_id();
        if id.is_none() {
            return TaskId::NONE;
        }
        self.submit(TaskRecord::new(id.clone(), Box::new(task), Box::new(completion)));
        TaskId::new(id)
    }

    /// [`schedule`](Self::schedule) with a no-op completion
    pub fn schedule_task<T>(&self, task: T) -> TaskId
    where
        T: FnOnce(&mut TaskError) + Send + 'static,
    {
        self.schedule(task, |_: &TaskError| {})
    }

    /// Queue an already admitted record. After teardown the record is
    /// canceled instead, so its operation is still released.
    pub(crate) fn submit(&self, record: TaskRecord) {
        let mut q = self.shared.lock();
        if q.stopped {
            drop(q);
            ktrace!("scheduler stopped, canceling task {}", record.id());
            record.cancel(&self.shared.port);
            return;
        }
        q.tasks.push_back(record);
        drop(q);
        self.shared.cond.notify_one();
    }

    /// Cancel a task that has not started executing.
    ///
    /// Its completion is posted with `OperationAborted`. Returns false if the
    /// task is unknown, already executing or finished.
    pub fn cancel(&self, id: &TaskId) -> bool {
        if !id.is_valid() {
            return false;
        }
        let record = {
            let mut q = self.shared.lock();
            let pos = q.tasks.iter().position(|r| r.id() == id.operation());
            pos.and_then(|pos| q.tasks.remove(pos))
        };
        match record {
            Some(record) => {
                ktrace!("canceled task {}", id);
                record.cancel(&self.shared.port);
                true
            }
            None => false,
        }
    }

    /// Cancel every pending task. Returns how many were canceled.
    pub fn cancel_all(&self) -> usize {
        let pending: Vec<TaskRecord> = self.shared.lock().tasks.drain(..).collect();
        let n = pending.len();
        for record in pending {
            record.cancel(&self.shared.port);
        }
        if n > 0 {
            kdebug!("canceled {} pending task(s)", n);
        }
        n
    }

    /// Tasks waiting for a worker (executing tasks are not counted)
    pub fn packaged_tasks(&self) -> usize {
        self.shared.lock().tasks.len()
    }
}

impl AsRef<SchedulerHandle> for SchedulerHandle {
    fn as_ref(&self) -> &SchedulerHandle {
        self
    }
}

impl fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("concurrency", &self.shared.concurrency)
            .field("pending", &self.packaged_tasks())
            .field("running", &self.is_running())
            .finish()
    }
}

/// Owns the worker pool; see the [module docs](self)
pub struct TaskScheduler {
    handle: SchedulerHandle,
    threads: ThreadGroup,
}

impl TaskScheduler {
    /// One worker per available CPU
    ///
    /// # Panics
    ///
    /// If the OS refuses to spawn a worker thread; the same holds for
    /// [`with_concurrency`](Self::with_concurrency) and
    /// [`with_context`](Self::with_context). Use
    /// [`from_config`](Self::from_config) to get that failure as an error.
    pub fn new(port: &CompletionPort) -> Self {
        Self::start(port, SchedulerConfig::default())
    }

    /// `hint` workers, or one per CPU if `hint` is 0
    pub fn with_concurrency(port: &CompletionPort, hint: usize) -> Self {
        Self::start(port, SchedulerConfig::new().concurrency_hint(hint))
    }

    /// Like [`with_concurrency`](Self::with_concurrency), with every worker's
    /// run loop wrapped by `context`
    pub fn with_context<F>(port: &CompletionPort, hint: usize, context: F) -> Self
    where
        F: Fn(WorkerFn) + Send + Sync + 'static,
    {
        Self::start(port, SchedulerConfig::new().concurrency_hint(hint).worker_context(context))
    }

    fn start(port: &CompletionPort, config: SchedulerConfig) -> Self {
        Self::from_config(port, config).expect("failed to start task scheduler")
    }

    /// Validate `config` and start the workers
    pub fn from_config(port: &CompletionPort, config: SchedulerConfig) -> SchedResult<Self> {
        config.validate().map_err(SchedError::InvalidConfig)?;
        let workers = config.worker_count();

        let handle = SchedulerHandle {
            shared: Arc::new(SchedulerShared {
                port: port.clone(),
                queue: Mutex::new(PendingQueue {
                    tasks: VecDeque::new(),
                    stopped: false,
                }),
                cond: Condvar::new(),
                concurrency: workers,
            }),
        };

        let mut threads = ThreadGroup::new(config.thread_name.clone());
        for _ in 0..workers {
            let shared = Arc::clone(&handle.shared);
            let context = config.worker_context.clone();
            if let Err(e) = threads.spawn(move |_| worker_main(shared, context)) {
                kerror!("failed to spawn worker {}: {}", threads.len(), e);
                handle.shared.shutdown();
                threads.join();
                return Err(e.into());
            }
        }

        kdebug!("task scheduler started with {} worker(s)", workers);
        Ok(Self { handle, threads })
    }

    /// A handle that can be moved into closures and channels
    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    pub fn port(&self) -> &CompletionPort {
        self.handle.port()
    }

    pub fn concurrency(&self) -> usize {
        self.handle.concurrency()
    }

    /// See [`SchedulerHandle::schedule`]
    pub fn schedule<T, C>(&self, task: T, completion: C) -> TaskId
    where
        T: FnOnce(&mut TaskError) + Send + 'static,
        C: FnOnce(&TaskError) + Send + 'static,
    {
        self.handle.schedule(task, completion)
    }

    pub fn schedule_task<T>(&self, task: T) -> TaskId
    where
        T: FnOnce(&mut TaskError) + Send + 'static,
    {
        self.handle.schedule_task(task)
    }

    /// See [`SchedulerHandle::cancel`]
    pub fn cancel(&self, id: &TaskId) -> bool {
        self.handle.cancel(id)
    }

    pub fn cancel_all(&self) -> usize {
        self.handle.cancel_all()
    }

    pub fn packaged_tasks(&self) -> usize {
        self.handle.packaged_tasks()
    }
}

impl AsRef<SchedulerHandle> for TaskScheduler {
    fn as_ref(&self) -> &SchedulerHandle {
        &self.handle
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        let pending = self.handle.shared.shutdown();
        let canceled = pending.len();
        for record in pending {
            record.cancel(&self.handle.shared.port);
        }
        self.threads.join();
        kdebug!("task scheduler stopped, {} pending task(s) canceled", canceled);
    }
}

impl fmt::Debug for TaskScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskScheduler")
            .field("handle", &self.handle)
            .field("threads", &self.threads)
            .finish()
    }
}
