/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! The scheduling contract the library is parameterized by.
//!
//! The library has no threads of its own; everything that runs, runs because
//! it was handed to an executor. Executors are untrusted for ordering: two
//! tasks submitted to the same executor may run in any order unless the
//! executor itself guarantees one.

use std::sync::Arc;
use std::time::Instant;

use allocative::Allocative;
use dupe::Dupe;

use crate::task::Task;

mod immediate;
mod manual;
mod spawner;

pub use self::immediate::ImmediateExecutor;
pub use self::manual::ManualExecutor;
pub use self::spawner::TokioExecutor;

/// Accepts nullary tasks and arranges for them to run at some later point.
///
/// Submission has no return value; a failure to enqueue is fatal by contract
/// and implementations are expected to panic rather than drop work silently.
pub trait Executor: Send + Sync + 'static {
    fn execute(&self, task: Task);

    /// Run `task` no earlier than `deadline`. Executors without a timer run
    /// the task without delay.
    fn execute_at(&self, deadline: Instant, task: Task) {
        let _ = deadline;
        self.execute(task);
    }
}

/// Shared handle to an executor.
#[derive(Clone, Dupe, Allocative)]
pub struct ExecutorRef(#[allocative(skip)] Arc<dyn Executor>);

impl ExecutorRef {
    pub fn new(executor: impl Executor) -> Self {
        ExecutorRef(Arc::new(executor))
    }

    /// The inline executor; runs tasks on the calling thread.
    pub fn immediate() -> Self {
        ExecutorRef::new(ImmediateExecutor)
    }

    pub fn execute(&self, task: Task) {
        self.0.execute(task);
    }

    pub fn execute_at(&self, deadline: Instant, task: Task) {
        self.0.execute_at(deadline, task);
    }

    pub fn execute_fn(&self, f: impl FnOnce() + Send + 'static) {
        self.0.execute(Task::new(move |()| f()));
    }
}

impl std::fmt::Debug for ExecutorRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ExecutorRef")
    }
}
