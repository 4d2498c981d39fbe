//! Deferred work for the cooperative event loop.
//!
//! Work that must not run inside the dispatch frame that requested it (most
//! notably starting the next application after a close request) is queued
//! here and picked up on the next loop iteration. Tasks run in FIFO order.
//! Tasks queued while a batch is running wait for the following tick.

use heapless::{Deque, Vec};
use thiserror_no_std::Error;

/// Maximum number of pending deferred tasks
pub const DEFERRED_CAPACITY: usize = 8;

/// A unit of deferred work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredTask {
    /// Bring the application at this slot to the foreground
    StartApp(usize),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("deferred queue is full")]
    Full,
}

/// FIFO of deferred tasks
#[derive(Default)]
pub struct DeferredQueue {
    tasks: Deque<DeferredTask, DEFERRED_CAPACITY>,
}

impl DeferredQueue {
    pub const fn new() -> Self {
        Self {
            tasks: Deque::new(),
        }
    }

    pub fn push(&mut self, task: DeferredTask) -> Result<(), SchedulerError> {
        self.tasks.push_back(task).map_err(|_| SchedulerError::Full)
    }

    /// Take every task queued so far, leaving the queue empty.
    ///
    /// The event loop runs the returned batch; anything pushed while it
    /// runs lands in the next batch.
    pub fn take_batch(&mut self) -> Vec<DeferredTask, DEFERRED_CAPACITY> {
        let mut batch = Vec::new();
        while let Some(task) = self.tasks.pop_front() {
            // Same capacity on both sides
            let _ = batch.push(task);
        }
        batch
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.tasks.is_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_is_fifo() {
        let mut queue = DeferredQueue::new();
        queue.push(DeferredTask::StartApp(1)).unwrap();
        queue.push(DeferredTask::StartApp(2)).unwrap();

        let batch = queue.take_batch();

        assert_eq!(
            batch.as_slice(),
            [DeferredTask::StartApp(1), DeferredTask::StartApp(2)]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_tasks_pushed_during_batch_wait_for_next() {
        let mut queue = DeferredQueue::new();
        queue.push(DeferredTask::StartApp(1)).unwrap();

        let batch = queue.take_batch();
        for _ in batch {
            queue.push(DeferredTask::StartApp(2)).unwrap();
        }

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.take_batch().as_slice(), [DeferredTask::StartApp(2)]);
    }

    #[test]
    fn test_full_queue_rejects() {
        let mut queue = DeferredQueue::new();
        for slot in 0..DEFERRED_CAPACITY {
            queue.push(DeferredTask::StartApp(slot)).unwrap();
        }

        assert!(queue.is_full());
        assert_eq!(
            queue.push(DeferredTask::StartApp(99)),
            Err(SchedulerError::Full)
        );
    }
}
