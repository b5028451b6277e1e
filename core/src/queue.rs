/*!
# Queue Module

This module defines the holding area for submitted tasks that have not
started yet.

The queue is:
- Strictly FIFO: tasks leave in the order they arrived
- Unbounded: submission never waits for room
- Not synchronized on its own: the dispatcher guards it with the same
  mutex that guards its capacity bookkeeping
*/

use crate::task::Task;
use std::collections::VecDeque;

/// FIFO queue of pending tasks backed by a `VecDeque`
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: VecDeque<Task>,
}

impl TaskQueue {
    /// Create a new empty queue
    pub fn new() -> Self {
        Self {
            tasks: VecDeque::new(),
        }
    }

    /// Append a task at the tail
    pub fn push(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    /// Remove the task at the head, if any
    pub fn pop(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    /// Number of pending tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Check if no task is pending
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Drop every pending task and return how many were discarded
    pub fn clear(&mut self) -> usize {
        let discarded = self.tasks.len();
        self.tasks.clear();
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording_task(log: &Arc<Mutex<Vec<usize>>>, index: usize) -> Task {
        let log = Arc::clone(log);
        Task::blocking(move || log.lock().unwrap().push(index))
    }

    #[test]
    fn pop_on_empty_queue_returns_none() {
        let mut queue = TaskQueue::new();
        assert!(queue.is_empty());
        assert!(queue.pop().is_none());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn tasks_leave_in_submission_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue = TaskQueue::new();
        for index in 0..5 {
            queue.push(recording_task(&log, index));
        }
        assert_eq!(queue.len(), 5);

        while let Some(task) = queue.pop() {
            match task {
                Task::Blocking(f) => f(),
                Task::Async(_) => unreachable!(),
            }
        }

        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn clear_reports_discarded_tasks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue = TaskQueue::new();
        queue.push(recording_task(&log, 0));
        queue.push(recording_task(&log, 1));

        assert_eq!(queue.clear(), 2);
        assert_eq!(queue.clear(), 0);
        assert!(log.lock().unwrap().is_empty());
    }
}
