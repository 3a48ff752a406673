//! Scheduler configuration

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use taskport_core::constants::{DEFAULT_THREAD_NAME, ENV_THREAD_NAME, ENV_WORKERS, MAX_WORKERS};

/// Worker run loop handed to a [`WorkerContext`]
pub type WorkerFn = Box<dyn FnOnce() + Send + 'static>;

/// Wraps every worker thread's run loop.
///
/// Invoked once on each worker thread with that worker's run loop, which it
/// must call exactly once. Anything set up before the call (thread-local
/// state, affinity, a per-thread resource) is in effect for every task the
/// worker executes.
pub type WorkerContext = Arc<dyn Fn(WorkerFn) + Send + Sync + 'static>;

/// Configuration for [`TaskScheduler`](crate::TaskScheduler)
#[derive(Clone)]
pub struct SchedulerConfig {
    /// Requested worker count; 0 means one per available CPU
    pub concurrency_hint: usize,

    /// Worker thread name prefix; threads are named `<prefix>-<index>`
    pub thread_name: String,

    pub worker_context: Option<WorkerContext>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency_hint: 0,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            worker_context: None,
        }
    }
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `TASKPORT_WORKERS` / `TASKPORT_THREAD_NAME`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(n) = env_parse::<usize>(ENV_WORKERS) {
            config.concurrency_hint = n;
        }
        if let Some(name) = std::env::var(ENV_THREAD_NAME).ok().filter(|s| !s.is_empty()) {
            config.thread_name = name;
        }
        config
    }

    pub fn concurrency_hint(mut self, n: usize) -> Self {
        self.concurrency_hint = n;
        self
    }

    pub fn thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name = prefix.into();
        self
    }

    pub fn worker_context<F>(mut self, f: F) -> Self
    where
        F: Fn(WorkerFn) + Send + Sync + 'static,
    {
        self.worker_context = Some(Arc::new(f));
        self
    }

    /// Number of threads the scheduler will actually start. An explicit hint
    /// is taken as is; detection is capped at `MAX_WORKERS`.
    pub fn worker_count(&self) -> usize {
        if self.concurrency_hint > 0 {
            return self.concurrency_hint;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .clamp(1, MAX_WORKERS)
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.thread_name.is_empty() {
            return Err("thread_name must not be empty");
        }
        if self.thread_name.contains('\0') {
            return Err("thread_name must not contain NUL");
        }
        Ok(())
    }
}

impl fmt::Debug for SchedulerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerConfig")
            .field("concurrency_hint", &self.concurrency_hint)
            .field("thread_name", &self.thread_name)
            .field("worker_context", &self.worker_context.is_some())
            .finish()
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_resolves_to_at_least_one_worker() {
        let config = SchedulerConfig::default();
        assert_eq!(config.concurrency_hint, 0);
        assert!(config.worker_count() >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = SchedulerConfig::new()
            .concurrency_hint(3)
            .thread_name("io")
            .worker_context(|run| run());
        assert_eq!(config.worker_count(), 3);
        assert_eq!(config.thread_name, "io");
        assert!(config.worker_context.is_some());
        assert!(format!("{:?}", config).contains("worker_context: true"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(SchedulerConfig::new().thread_name("").validate().is_err());
        assert!(SchedulerConfig::new().thread_name("a\0b").validate().is_err());
    }

    #[test]
    fn test_large_hint_is_not_capped() {
        let config = SchedulerConfig::new().concurrency_hint(MAX_WORKERS + 476);
        assert!(config.validate().is_ok());
        assert_eq!(config.worker_count(), 1500);
    }

    #[test]
    fn test_env_parse_missing_or_garbage() {
        assert_eq!(env_parse::<usize>("TASKPORT_TEST_SURELY_UNSET_VAR"), None);
    }
}
