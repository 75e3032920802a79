/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

use std::collections::VecDeque;
use std::sync::Arc;

use allocative::Allocative;
use dupe::Dupe;
use parking_lot::Mutex;

use crate::executor::Executor;
use crate::task::Task;

/// An executor whose queue is drained explicitly by its owner.
///
/// Nothing runs until `run_one` or `run_all` is called, which makes the
/// interleaving of continuation dispatch fully deterministic. Clones share
/// the queue.
#[derive(Clone, Dupe, Default, Allocative)]
pub struct ManualExecutor {
    #[allocative(skip)]
    queue: Arc<Mutex<VecDeque<Task>>>,
}

impl ManualExecutor {
    pub fn new() -> Self {
        ManualExecutor::default()
    }

    /// Tasks currently queued and not yet run.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Runs the oldest queued task, if any. The queue lock is not held while
    /// the task runs, so tasks may enqueue further work.
    pub fn run_one(&self) -> bool {
        let task = self.queue.lock().pop_front();
        match task {
            Some(task) => {
                task.run(());
                true
            }
            None => false,
        }
    }

    /// Runs tasks until the queue is empty, including work enqueued by the
    /// tasks themselves. Returns the number of tasks run.
    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        while self.run_one() {
            ran += 1;
        }
        ran
    }
}

impl Executor for ManualExecutor {
    fn execute(&self, task: Task) {
        self.queue.lock().push_back(task);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::executor::ExecutorRef;

    #[test]
    fn queues_until_drained() {
        let executor = ManualExecutor::new();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let counter = Arc::clone(&counter);
            executor.execute(Task::new(move |()| {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(executor.pending(), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(executor.run_one());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(executor.run_all(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(!executor.run_one());
    }

    #[test]
    fn run_all_covers_reentrant_submissions() {
        let executor = ManualExecutor::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let inner = executor.dupe();
        let inner_counter = Arc::clone(&counter);
        executor.execute(Task::new(move |()| {
            inner_counter.fetch_add(1, Ordering::SeqCst);
            let chained = Arc::clone(&inner_counter);
            inner.execute(Task::new(move |()| {
                chained.fetch_add(1, Ordering::SeqCst);
            }));
        }));
        assert_eq!(executor.run_all(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn clones_share_the_queue() {
        let executor = ManualExecutor::new();
        let other = executor.dupe();
        ExecutorRef::new(other).execute_fn(|| {});
        assert_eq!(executor.pending(), 1);
    }
}
