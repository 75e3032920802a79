/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

use std::time::Instant;

use allocative::Allocative;
use dupe::Dupe;

use crate::executor::Executor;
use crate::task::Task;

/// Runs every task inline on the submitting thread.
///
/// Continuations scheduled here never hop threads, which also makes this the
/// executor of choice for deterministic tests.
#[derive(Clone, Copy, Dupe, Debug, Default, Allocative)]
pub struct ImmediateExecutor;

impl Executor for ImmediateExecutor {
    fn execute(&self, task: Task) {
        task.run(());
    }

    // The timed overload runs without delay, like the untimed one.
    fn execute_at(&self, _deadline: Instant, task: Task) {
        task.run(());
    }
}
