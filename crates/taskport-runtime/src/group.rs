//! Keyed groups of task channels
//!
//! A [`TaskChannelGroup`] creates one [`TaskChannel`] per key on first use, all
//! sharing the same scheduler. Tasks enqueued under the same key are
//! serialized; tasks under different keys run independently.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use taskport_core::{TaskError, TaskId};

use crate::channel::TaskChannel;
use crate::scheduler::SchedulerHandle;

pub struct TaskChannelGroup<K> {
    scheduler: SchedulerHandle,
    channels: Mutex<HashMap<K, Arc<TaskChannel>>>,
}

impl<K> TaskChannelGroup<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new<S: AsRef<SchedulerHandle>>(scheduler: &S) -> Self {
        Self {
            scheduler: scheduler.as_ref().clone(),
            channels: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Arc<TaskChannel>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }

    /// Channel for `key`, created if missing
    pub fn get_channel(&self, key: &K) -> Arc<TaskChannel> {
        let mut map = self.lock();
        match map.get(key) {
            Some(channel) => Arc::clone(channel),
            None => {
                let channel = TaskChannel::make(&self.scheduler);
                map.insert(key.clone(), Arc::clone(&channel));
                channel
            }
        }
    }

    fn find(&self, key: &K) -> Option<Arc<TaskChannel>> {
        self.lock().get(key).cloned()
    }

    pub fn enqueue_back<T, C>(&self, key: &K, task: T, completion: C) -> TaskId
    where
        T: FnOnce(&mut TaskError) + Send + 'static,
        C: FnOnce(&TaskError) + Send + 'static,
    {
        self.get_channel(key).enqueue_back(task, completion)
    }

    pub fn enqueue_front<T, C>(&self, key: &K, task: T, completion: C) -> TaskId
    where
        T: FnOnce(&mut TaskError) + Send + 'static,
        C: FnOnce(&TaskError) + Send + 'static,
    {
        self.get_channel(key).enqueue_front(task, completion)
    }

    pub fn enqueue_back_task<T>(&self, key: &K, task: T) -> TaskId
    where
        T: FnOnce(&mut TaskError) + Send + 'static,
    {
        self.get_channel(key).enqueue_back_task(task)
    }

    pub fn enqueue_front_task<T>(&self, key: &K, task: T) -> TaskId
    where
        T: FnOnce(&mut TaskError) + Send + 'static,
    {
        self.get_channel(key).enqueue_front_task(task)
    }

    /// Cancel a task of the channel under `key`; false for unknown keys
    pub fn cancel(&self, key: &K, id: &TaskId) -> bool {
        self.find(key).map_or(false, |c| c.cancel(id))
    }

    pub fn cancel_all(&self, key: &K) -> usize {
        self.find(key).map_or(0, |c| c.cancel_all())
    }

    /// Tasks waiting in the channel under `key`; 0 for unknown keys
    pub fn enqueued_tasks(&self, key: &K) -> usize {
        self.find(key).map_or(0, |c| c.enqueued_tasks())
    }

    pub fn current_task(&self, key: &K) -> TaskId {
        self.find(key).map(|c| c.current_task()).unwrap_or_default()
    }

    /// Forget the channel under `key`.
    ///
    /// Nothing is canceled while the returned channel is held. Dropping it
    /// cancels the tasks still waiting in it.
    pub fn erase(&self, key: &K) -> Option<Arc<TaskChannel>> {
        self.lock().remove(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl<K> fmt::Debug for TaskChannelGroup<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner).len();
        f.debug_struct("TaskChannelGroup").field("channels", &channels).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crossbeam_queue::SegQueue;
    use taskport_core::Event;

    use crate::port::CompletionPort;
    use crate::TaskScheduler;

    #[test]
    fn test_channels_created_per_key() {
        let port = CompletionPort::new();
        let ts = TaskScheduler::with_concurrency(&port, 2);
        let group: TaskChannelGroup<&'static str> = TaskChannelGroup::new(&ts);
        assert!(group.is_empty());

        let a = group.get_channel(&"a");
        let again = group.get_channel(&"a");
        let b = group.get_channel(&"b");
        assert!(Arc::ptr_eq(&a, &again));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(group.len(), 2);
        assert!(group.contains(&"b"));
    }

    #[test]
    fn test_per_key_fifo() {
        let port = CompletionPort::new();
        let gate = Arc::new(Event::default());
        let g = Arc::clone(&gate);
        let ts = TaskScheduler::with_context(&port, 4, move |run| {
            g.wait();
            run();
        });
        let group = TaskChannelGroup::new(&ts);
        let logs: Vec<Arc<SegQueue<usize>>> = (0..3).map(|_| Arc::new(SegQueue::new())).collect();

        for n in 0..60 {
            let key = n % 3;
            let log = Arc::clone(&logs[key]);
            group.enqueue_back_task(&key, move |_| log.push(n));
        }

        gate.notify_all();
        assert_eq!(port.wait(), 60);
        for (key, log) in logs.iter().enumerate() {
            let seen: Vec<usize> = std::iter::from_fn(|| log.pop()).collect();
            let expected: Vec<usize> = (0..60).filter(|n| n % 3 == key).collect();
            assert_eq!(seen, expected);
        }
    }

    #[test]
    fn test_forwarded_operations() {
        let port = CompletionPort::new();
        let ts = TaskScheduler::with_concurrency(&port, 1);
        let group = TaskChannelGroup::new(&ts);
        let gate = Arc::new(Event::default());
        let started = Arc::new(Event::default());

        let (g, s) = (Arc::clone(&gate), Arc::clone(&started));
        let first = group.enqueue_back(
            &7u32,
            move |_| {
                s.notify_all();
                g.wait();
            },
            |_| {},
        );
        let aborted = Arc::new(AtomicUsize::new(0));
        let a = Arc::clone(&aborted);
        let victim = group.enqueue_front(&7, |_| {}, move |e| {
            if e.is_aborted() {
                a.fetch_add(1, Ordering::SeqCst);
            }
        });
        group.enqueue_front_task(&7, |_| {});
        group.enqueue_back_task(&7, |_| {});
        started.wait();

        assert_eq!(group.current_task(&7), first);
        assert_eq!(group.enqueued_tasks(&7), 3);
        assert!(group.cancel(&7, &victim));
        assert_eq!(group.cancel_all(&7), 2);

        // unknown keys
        assert_eq!(group.enqueued_tasks(&8), 0);
        assert!(!group.current_task(&8).is_valid());
        assert!(!group.cancel(&8, &first));
        assert_eq!(group.cancel_all(&8), 0);
        assert_eq!(group.len(), 1);

        gate.notify_all();
        assert_eq!(port.wait(), 4);
        assert_eq!(aborted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_erase_keeps_channel_running() {
        let port = CompletionPort::new();
        let ts = TaskScheduler::with_concurrency(&port, 1);
        let group = TaskChannelGroup::new(&ts);
        let gate = Arc::new(Event::default());
        let done = Arc::new(AtomicUsize::new(0));

        let g = Arc::clone(&gate);
        group.enqueue_back_task(&"k", move |_| g.wait());
        let d = Arc::clone(&done);
        group.enqueue_back(&"k", |_| {}, move |_| {
            d.fetch_add(1, Ordering::SeqCst);
        });

        let erased = group.erase(&"k").unwrap();
        assert_eq!(erased.enqueued_tasks(), 1);
        assert!(group.erase(&"k").is_none());
        assert!(group.is_empty());

        let fresh = group.get_channel(&"k");
        assert!(!Arc::ptr_eq(&erased, &fresh));

        gate.notify_all();
        assert_eq!(port.wait(), 2);
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
