//! Worker thread management
//!
//! A [`ThreadGroup`] owns a set of named OS threads and joins them when it is
//! dropped. Threads spawned through it are tagged with their index for log
//! output.

use std::io;
use std::thread::{self, JoinHandle};

use taskport_core::kprint::set_worker_index;
use taskport_core::{kerror, ktrace};

pub struct ThreadGroup {
    prefix: String,
    handles: Vec<JoinHandle<()>>,
}

impl ThreadGroup {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            handles: Vec::new(),
        }
    }

    /// Start a thread named `<prefix>-<index>` running `f(index)`
    pub fn spawn<F>(&mut self, f: F) -> io::Result<()>
    where
        F: FnOnce(usize) + Send + 'static,
    {
        let index = self.handles.len();
        let handle = thread::Builder::new()
            .name(format!("{}-{}", self.prefix, index))
            .spawn(move || {
                set_worker_index(Some(index));
                ktrace!("worker thread started");
                f(index);
                ktrace!("worker thread exiting");
                set_worker_index(None);
            })?;
        self.handles.push(handle);
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every thread to exit. Returns how many panicked.
    pub fn join(&mut self) -> usize {
        let mut panicked = 0;
        for handle in self.handles.drain(..) {
            let name = handle.thread().name().unwrap_or("<unnamed>").to_string();
            if handle.join().is_err() {
                kerror!("thread {} panicked", name);
                panicked += 1;
            }
        }
        panicked
    }
}

impl Drop for ThreadGroup {
    fn drop(&mut self) {
        self.join();
    }
}

impl std::fmt::Debug for ThreadGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadGroup")
            .field("prefix", &self.prefix)
            .field("threads", &self.handles.len())
            .finish()
    }
}
