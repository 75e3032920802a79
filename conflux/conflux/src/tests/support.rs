/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Shared fixtures for the scenario suites.

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dupe::Dupe;

use crate::executor::Executor;
use crate::task::Task;

/// A value without `Clone`; chains over it must move it exactly once.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct MoveOnly {
    member: i32,
}

impl MoveOnly {
    pub(crate) fn new(member: i32) -> Self {
        MoveOnly { member }
    }

    pub(crate) fn member(&self) -> i32 {
        self.member
    }
}

/// Runs tasks inline like the immediate executor, counting submissions.
#[derive(Clone, Dupe, Default)]
pub(crate) struct CountingExecutor {
    submissions: Arc<AtomicUsize>,
}

impl CountingExecutor {
    pub(crate) fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }
}

impl Executor for CountingExecutor {
    fn execute(&self, task: Task) {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        task.run(());
    }
}
