/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Entry points: scheduling a callable as a future, and ready-made futures.

use dupe::Dupe;

use crate::error::Error;
use crate::executor::ExecutorRef;
use crate::future::Future;
use crate::promise::package;
use crate::promise::try_package;
use crate::state::SharedState;
use crate::task::Task;

/// Schedules `f` on `executor` and returns the future of its result.
///
/// Arguments travel by closure capture; move a value in to transfer it,
/// capture a clone to keep one. If every handle to the returned future (and
/// everything attached to it) is dropped before `f` starts, `f` is elided.
pub fn spawn<T, F>(executor: &ExecutorRef, f: F) -> Future<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (task, future) = package(executor, move |()| f());
    executor.execute(Task::new(move |()| task.run(())));
    future
}

/// Like [`spawn`], for a fallible callable: an `Err` makes the future ready
/// with that error.
pub fn try_spawn<T, F>(executor: &ExecutorRef, f: F) -> Future<T>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    let (task, future) = try_package(executor, move |()| f());
    executor.execute(Task::new(move |()| task.run(())));
    future
}

/// An already-ready future carrying `value`, recorded on `executor` for the
/// continuations that inherit it. The usual head of a pipeline.
pub fn make_ready_future<T: Send + 'static>(executor: &ExecutorRef, value: T) -> Future<T> {
    let state = SharedState::new(executor.dupe());
    state.resolve(Ok(value));
    Future::from_state(state)
}

/// An already-failed future carrying `error`.
pub fn make_error_future<T: Send + 'static>(
    executor: &ExecutorRef,
    error: impl Into<anyhow::Error>,
) -> Future<T> {
    let state = SharedState::new(executor.dupe());
    state.resolve(Err(Error::new(error)));
    Future::from_state(state)
}
