//! Completion port
//!
//! The port is the single exchange point between producers of results and the
//! threads that consume them. Producers either reserve an operation id up
//! front ([`CompletionPort::next_operation_id`]) and later post a completion
//! under that id, or dispatch a completion that jumps ahead of everything
//! posted. Consumers drain ready completions with the `wait*`, `run*` and
//! `pull*` families.
//!
//! # Draining
//!
//! | method      | blocks while                                      | returns          |
//! |-------------|---------------------------------------------------|------------------|
//! | `wait`      | nothing ready, operations outstanding, not stopped | handlers run     |
//! | `wait_one`  | same as `wait`                                     | whether one ran  |
//! | `run`       | not stopped                                        | handlers run     |
//! | `run_one`   | nothing ready, not stopped                         | whether one ran  |
//! | `pull`      | never                                              | handlers run     |
//! | `pull_one`  | never                                              | whether one ran  |
//!
//! After [`stop`](CompletionPort::stop) every blocking drain still runs what
//! is already ready, then returns instead of blocking.
//!
//! No lock is held while a handler runs, so handlers may freely post,
//! dispatch or schedule more work.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use taskport_core::{kdebug, ktrace, OperationId, TaskError};

use crate::handler::{CompletionFn, HandlerRecord, ReadyQueue};

/// Kind of blocked drainer, for wakeup decisions
#[derive(Clone, Copy)]
enum Drainer {
    /// `wait` / `wait_one`: also cares about outstanding operations
    Wait,
    /// `run` / `run_one`: only cares about ready handlers and stop
    Run,
}

struct PortState {
    stopped: bool,
    /// Operations admitted but not yet posted
    queued_ops: usize,
    wait_threads: usize,
    run_threads: usize,
    next_seqno: usize,
    ready: ReadyQueue,
}

struct PortCore {
    state: Mutex<PortState>,
    cond: Condvar,
}

/// Thread-safe queue of ready completion handlers
///
/// `CompletionPort` is a handle: clones refer to the same port. The queued
/// handlers are dropped without being run when the last handle goes away.
#[derive(Clone)]
pub struct CompletionPort {
    core: Arc<PortCore>,
}

impl CompletionPort {
    pub fn new() -> Self {
        Self {
            core: Arc::new(PortCore {
                state: Mutex::new(PortState {
                    stopped: false,
                    queued_ops: 0,
                    wait_threads: 0,
                    run_threads: 0,
                    next_seqno: 0,
                    ready: ReadyQueue::new(),
                }),
                cond: Condvar::new(),
            }),
        }
    }

    /// True if both handles refer to the same port
    pub fn same_port(a: &CompletionPort, b: &CompletionPort) -> bool {
        Arc::ptr_eq(&a.core, &b.core)
    }

    fn lock(&self) -> MutexGuard<'_, PortState> {
        self.core.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn park<'a>(&'a self, mut st: MutexGuard<'a, PortState>, who: Drainer) -> MutexGuard<'a, PortState> {
        match who {
            Drainer::Wait => st.wait_threads += 1,
            Drainer::Run => st.run_threads += 1,
        }
        let mut st = self.core.cond.wait(st).unwrap_or_else(PoisonError::into_inner);
        match who {
            Drainer::Wait => st.wait_threads -= 1,
            Drainer::Run => st.run_threads -= 1,
        }
        st
    }

    // ------------------------------------------------------------------
    // Producer side
    // ------------------------------------------------------------------

    /// Admit a new operation.
    ///
    /// Returns [`OperationId::NONE`] if the port is stopped. Otherwise the
    /// operation counts as outstanding until a completion is posted under
    /// its id, and `wait` will keep blocking for it.
    pub fn next_operation_id(&self) -> OperationId {
        let mut st = self.lock();
        if st.stopped {
            return OperationId::NONE;
        }
        st.queued_ops += 1;
        st.next_seqno = st.next_seqno.wrapping_add(1);
        if st.next_seqno == 0 {
            st.next_seqno = 1;
        }
        OperationId::new(st.next_seqno)
    }

    /// Queue a completion under `seqno`. A non-zero seqno releases one
    /// outstanding operation.
    pub(crate) fn post_with_seqno(&self, handler: CompletionFn, seqno: usize, error: TaskError) {
        let mut st = self.lock();
        if seqno > 0 {
            debug_assert!(st.queued_ops > 0, "completion posted for an operation that was never admitted");
            st.queued_ops = st.queued_ops.saturating_sub(1);
        }
        st.ready.push(HandlerRecord::new(handler, seqno, error));

        if st.queued_ops == 0 && st.wait_threads > 0 {
            self.core.cond.notify_all();
        } else {
            self.core.cond.notify_one();
        }
    }

    /// Queue `handler` behind everything already posted
    pub fn post<F>(&self, handler: F)
    where
        F: FnOnce(&TaskError) + Send + 'static,
    {
        self.post_with_error(handler, TaskError::None)
    }

    /// Queue `handler` to be invoked with `error`
    pub fn post_with_error<F>(&self, handler: F, error: TaskError)
    where
        F: FnOnce(&TaskError) + Send + 'static,
    {
        let op = self.next_operation_id();
        self.post_with_seqno(Box::new(handler), op.value(), error);
    }

    /// Queue `handler` ahead of every posted handler
    pub fn dispatch<F>(&self, handler: F)
    where
        F: FnOnce(&TaskError) + Send + 'static,
    {
        self.dispatch_with_error(handler, TaskError::None)
    }

    pub fn dispatch_with_error<F>(&self, handler: F, error: TaskError)
    where
        F: FnOnce(&TaskError) + Send + 'static,
    {
        self.post_with_seqno(Box::new(handler), 0, error);
    }

    /// Invoke `handler` right here, bypassing the queue
    pub fn call<F>(&self, handler: F)
    where
        F: FnOnce(&TaskError),
    {
        handler(&TaskError::None)
    }

    pub fn call_with_error<F>(&self, handler: F, error: TaskError)
    where
        F: FnOnce(&TaskError),
    {
        handler(&error)
    }

    // ------------------------------------------------------------------
    // Consumer side
    // ------------------------------------------------------------------

    /// Run ready handlers until no operation is outstanding or the port is
    /// stopped. Returns how many ran.
    pub fn wait(&self) -> usize {
        let mut n = 0;
        let mut st = self.lock();
        loop {
            if let Some(record) = st.ready.pop() {
                drop(st);
                record.complete();
                n += 1;
                st = self.lock();
            } else if st.stopped || st.queued_ops == 0 {
                return n;
            } else {
                st = self.park(st, Drainer::Wait);
            }
        }
    }

    /// Run at most one handler, blocking like [`wait`](Self::wait)
    pub fn wait_one(&self) -> bool {
        let mut st = self.lock();
        loop {
            if let Some(record) = st.ready.pop() {
                drop(st);
                record.complete();
                return true;
            }
            if st.stopped || st.queued_ops == 0 {
                return false;
            }
            st = self.park(st, Drainer::Wait);
        }
    }

    /// Run handlers until [`stop`](Self::stop). Returns how many ran.
    pub fn run(&self) -> usize {
        let mut n = 0;
        let mut st = self.lock();
        loop {
            if let Some(record) = st.ready.pop() {
                drop(st);
                record.complete();
                n += 1;
                st = self.lock();
            } else if st.stopped {
                return n;
            } else {
                st = self.park(st, Drainer::Run);
            }
        }
    }

    /// Block until one handler ran (true) or the port is stopped (false)
    pub fn run_one(&self) -> bool {
        let mut st = self.lock();
        loop {
            if let Some(record) = st.ready.pop() {
                drop(st);
                record.complete();
                return true;
            }
            if st.stopped {
                return false;
            }
            st = self.park(st, Drainer::Run);
        }
    }

    /// Run whatever is ready without blocking
    pub fn pull(&self) -> usize {
        let mut n = 0;
        while self.pull_one() {
            n += 1;
        }
        n
    }

    /// Run one ready handler without blocking
    pub fn pull_one(&self) -> bool {
        let record = self.lock().ready.pop();
        match record {
            Some(record) => {
                record.complete();
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Control
    // ------------------------------------------------------------------

    /// Reject new operations and release every blocked drainer
    pub fn stop(&self) {
        let mut st = self.lock();
        st.stopped = true;
        kdebug!(
            "completion port stopped ({} ready, {} outstanding)",
            st.ready.len(),
            st.queued_ops
        );
        self.core.cond.notify_all();
    }

    /// Accept operations again after [`stop`](Self::stop)
    pub fn reset(&self) {
        self.lock().stopped = false;
        ktrace!("completion port reset");
    }

    pub fn stopped(&self) -> bool {
        self.lock().stopped
    }

    /// Handlers waiting to be drained
    pub fn ready_handlers(&self) -> usize {
        self.lock().ready.len()
    }

    /// Threads currently parked inside a blocking drain
    pub fn blocked_threads(&self) -> usize {
        let st = self.lock();
        st.wait_threads + st.run_threads
    }

    /// Operations admitted whose completion has not been posted yet
    pub fn queued_operations(&self) -> usize {
        self.lock().queued_ops
    }
}

impl Default for CompletionPort {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CompletionPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.lock();
        f.debug_struct("CompletionPort")
            .field("stopped", &st.stopped)
            .field("queued_ops", &st.queued_ops)
            .field("ready", &st.ready.len())
            .field("blocked", &(st.wait_threads + st.run_threads))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn wait_for_blocked(port: &CompletionPort, n: usize) {
        while port.blocked_threads() < n {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_dispatch_drains_before_post() {
        let port = CompletionPort::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o = Arc::clone(&order);
        port.post(move |_| o.lock().unwrap().push("h1"));
        let o = Arc::clone(&order);
        port.dispatch(move |_| o.lock().unwrap().push("h2"));

        assert_eq!(port.ready_handlers(), 2);
        assert_eq!(port.wait(), 2);
        assert_eq!(*order.lock().unwrap(), vec!["h2", "h1"]);
    }

    #[test]
    fn test_posts_drain_in_order() {
        let port = CompletionPort::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..16 {
            let o = Arc::clone(&order);
            port.post(move |_| o.lock().unwrap().push(i));
        }
        assert_eq!(port.pull(), 16);
        assert_eq!(*order.lock().unwrap(), (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn test_wait_returns_when_idle() {
        let port = CompletionPort::new();
        assert_eq!(port.wait(), 0);
        assert!(!port.wait_one());
        assert_eq!(port.pull(), 0);
        assert!(!port.pull_one());
    }

    #[test]
    fn test_error_reaches_handler() {
        let port = CompletionPort::new();
        let code = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&code);
        port.post_with_error(
            move |e: &TaskError| c.store(e.code() as usize, Ordering::SeqCst),
            TaskError::new(17, "seventeen"),
        );
        assert!(port.wait_one());
        assert_eq!(code.load(Ordering::SeqCst), 17);
    }

    #[test]
    fn test_call_is_synchronous() {
        let port = CompletionPort::new();
        let mut hit = false;
        port.call(|e| {
            assert!(e.is_ok());
            hit = true;
        });
        assert!(hit);
        port.call_with_error(|e| assert!(e.is_aborted()), TaskError::OperationAborted);
        assert_eq!(port.ready_handlers(), 0);
    }

    #[test]
    fn test_operation_ids_while_running_and_stopped() {
        let port = CompletionPort::new();
        let a = port.next_operation_id();
        let b = port.next_operation_id();
        assert!(a.is_valid());
        assert!(a < b);
        assert_eq!(port.queued_operations(), 2);

        port.stop();
        assert!(port.stopped());
        assert!(port.next_operation_id().is_none());
        assert_eq!(port.queued_operations(), 2);

        port.reset();
        assert!(!port.stopped());
        assert!(port.next_operation_id().is_valid());
    }

    #[test]
    fn test_seqno_skips_zero_on_wrap() {
        let port = CompletionPort::new();
        port.lock().next_seqno = usize::MAX - 1;
        assert_eq!(port.next_operation_id().value(), usize::MAX);
        assert_eq!(port.next_operation_id().value(), 1);
    }

    #[test]
    fn test_stopped_port_still_drains_ready() {
        let port = CompletionPort::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        port.post(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        // an outstanding operation that will never complete
        let _pending = port.next_operation_id();

        port.stop();
        assert_eq!(port.wait(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // nothing ready: every blocking drain returns at once
        assert_eq!(port.wait(), 0);
        assert!(!port.wait_one());
        assert_eq!(port.run(), 0);
        assert!(!port.run_one());

        let bump = |hits: &Arc<AtomicUsize>| {
            let h = Arc::clone(hits);
            move |_: &TaskError| {
                h.fetch_add(1, Ordering::SeqCst);
            }
        };
        port.post(bump(&hits));
        assert_eq!(port.run(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        port.post(bump(&hits));
        assert_eq!(port.pull(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        port.dispatch(bump(&hits));
        assert!(port.run_one());
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_post_on_stopped_port_is_queued() {
        let port = CompletionPort::new();
        port.stop();
        port.post(|_| {});
        assert_eq!(port.ready_handlers(), 1);
        assert_eq!(port.pull(), 1);
    }

    #[test]
    fn test_wait_blocks_for_outstanding_operation() {
        let port = CompletionPort::new();
        let op = port.next_operation_id();
        let hits = Arc::new(AtomicUsize::new(0));

        let producer = {
            let port = port.clone();
            let hits = Arc::clone(&hits);
            thread::spawn(move || {
                wait_for_blocked(&port, 1);
                port.post_with_seqno(
                    Box::new(move |_: &TaskError| {
                        hits.fetch_add(1, Ordering::SeqCst);
                    }),
                    op.value(),
                    TaskError::None,
                );
            })
        };

        assert_eq!(port.wait(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(port.queued_operations(), 0);
        producer.join().unwrap();
    }

    #[test]
    fn test_every_waiter_released_by_last_completion() {
        let port = CompletionPort::new();
        let op = port.next_operation_id();
        let n = 4;

        let waiters: Vec<_> = (0..n)
            .map(|_| {
                let port = port.clone();
                thread::spawn(move || port.wait())
            })
            .collect();

        wait_for_blocked(&port, n);
        port.post_with_seqno(Box::new(|_: &TaskError| {}), op.value(), TaskError::None);

        let total: usize = waiters.into_iter().map(|t| t.join().unwrap()).sum();
        assert_eq!(total, 1);
        assert_eq!(port.blocked_threads(), 0);
    }

    #[test]
    fn test_run_one_blocks_until_stop() {
        let port = CompletionPort::new();
        let runner = {
            let port = port.clone();
            thread::spawn(move || port.run_one())
        };

        wait_for_blocked(&port, 1);
        port.stop();
        assert!(!runner.join().unwrap());
        assert_eq!(port.blocked_threads(), 0);

        port.reset();
        let runner = {
            let port = port.clone();
            thread::spawn(move || port.run_one())
        };
        wait_for_blocked(&port, 1);
        port.post(|_| {});
        assert!(runner.join().unwrap());
    }

    #[test]
    fn test_run_processes_until_stop() {
        let port = CompletionPort::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let runner = {
            let port = port.clone();
            thread::spawn(move || port.run())
        };

        for _ in 0..3 {
            let h = Arc::clone(&hits);
            port.post(move |_| {
                h.fetch_add(1, Ordering::SeqCst);
            });
        }
        while hits.load(Ordering::SeqCst) < 3 {
            thread::sleep(Duration::from_millis(1));
        }
        wait_for_blocked(&port, 1);
        port.stop();
        assert_eq!(runner.join().unwrap(), 3);
    }

    #[test]
    fn test_handler_may_post_more_work() {
        let port = CompletionPort::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let inner_port = port.clone();
        let h = Arc::clone(&hits);
        port.post(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            let h = Arc::clone(&h);
            inner_port.post(move |_| {
                h.fetch_add(1, Ordering::SeqCst);
            });
        });
        assert_eq!(port.wait(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dropped_port_does_not_run_handlers() {
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let port = CompletionPort::new();
            let h = Arc::clone(&hits);
            port.post(move |_| {
                h.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(Arc::strong_count(&hits), 1);
    }

    #[test]
    fn test_same_port() {
        let a = CompletionPort::new();
        let b = a.clone();
        assert!(CompletionPort::same_port(&a, &b));
        assert!(!CompletionPort::same_port(&a, &CompletionPort::new()));
    }
}
