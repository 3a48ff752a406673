//! Manual-reset event
//!
//! Once signaled, every current and future waiter returns immediately until
//! [`Event::reset`] is called. Used for task-status waiting and for gating
//! workers in tests and demos.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Outcome of a bounded wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// The event was signaled before the deadline
    Signaled,
    /// The deadline passed first
    Timeout,
}

impl WaitStatus {
    #[inline]
    pub fn timed_out(self) -> bool {
        self == WaitStatus::Timeout
    }
}

/// A boolean flag plus a condition variable
pub struct Event {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl Event {
    pub const fn new(signaled: bool) -> Self {
        Self {
            signaled: Mutex::new(signaled),
            cond: Condvar::new(),
        }
    }

    fn flag(&self) -> MutexGuard<'_, bool> {
        self.signaled.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until signaled
    pub fn wait(&self) {
        let mut signaled = self.flag();
        while !*signaled {
            signaled = self.cond.wait(signaled).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until signaled or `timeout` elapses
    pub fn wait_for(&self, timeout: Duration) -> WaitStatus {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.wait_until(deadline),
            None => {
                self.wait();
                WaitStatus::Signaled
            }
        }
    }

    /// Block until signaled or `deadline` is reached
    pub fn wait_until(&self, deadline: Instant) -> WaitStatus {
        let mut signaled = self.flag();
        while !*signaled {
            let now = Instant::now();
            if now >= deadline {
                return WaitStatus::Timeout;
            }
            let (guard, _) = self
                .cond
                .wait_timeout(signaled, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            signaled = guard;
        }
        WaitStatus::Signaled
    }

    /// Signal and wake one waiter
    pub fn notify_one(&self) {
        let mut signaled = self.flag();
        *signaled = true;
        self.cond.notify_one();
    }

    /// Signal and wake every waiter
    pub fn notify_all(&self) {
        let mut signaled = self.flag();
        *signaled = true;
        self.cond.notify_all();
    }

    /// Back to non-signaled
    pub fn reset(&self) {
        *self.flag() = false;
    }

    pub fn signaled(&self) -> bool {
        *self.flag()
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new(false)
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event").field("signaled", &self.signaled()).finish()
    }
}
