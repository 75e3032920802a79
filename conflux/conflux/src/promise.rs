/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! The producer side of a shared state.

use std::sync::Arc;
use std::sync::Weak;

use dupe::Dupe;

use crate::error::Error;
use crate::executor::ExecutorRef;
use crate::future::Future;
use crate::state::SharedState;

/// The unique producer end of a shared state.
///
/// Holds the state weakly: if every observer goes away first, fulfilling
/// becomes a no-op, and the producing work can be elided. Dropping an armed
/// promise resolves the state to a broken-promise error instead.
pub(crate) struct Promise<T> {
    state: Weak<SharedState<T>>,
    fulfilled: bool,
}

impl<T> Promise<T> {
    pub(crate) fn new(state: &Arc<SharedState<T>>) -> Self {
        Promise {
            state: Arc::downgrade(state),
            fulfilled: false,
        }
    }

    /// True while some observer can still see a result.
    pub(crate) fn is_observed(&self) -> bool {
        self.state.strong_count() > 0
    }

    pub(crate) fn fulfill(mut self, result: Result<T, Error>) {
        self.fulfilled = true;
        if let Some(state) = self.state.upgrade() {
            state.resolve(result);
        }
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if self.fulfilled {
            return;
        }
        if let Some(state) = self.state.upgrade() {
            tracing::debug!("promise dropped before fulfillment; observers see a broken promise");
            state.resolve(Err(Error::broken_promise()));
        }
    }
}

/// A one-shot producer bundling a callable with the promise it fulfills.
///
/// Created by [`package`]; running it invokes the callable and fulfills the
/// paired future. If no observer of that future remains, the callable is
/// elided entirely.
pub struct PackagedTask<A, T> {
    promise: Promise<T>,
    run: Option<Box<dyn FnOnce(A) -> Result<T, Error> + Send + 'static>>,
}

impl<A: Send + 'static, T: Send + 'static> PackagedTask<A, T> {
    /// Runs the packaged callable with `arg` and fulfills the paired future.
    /// First fulfillment wins; the task is consumed either way.
    pub fn run(mut self, arg: A) {
        if !self.promise.is_observed() {
            tracing::trace!("packaged task elided; no live observers");
            return;
        }
        let run = self
            .run
            .take()
            .expect("a packaged task holds its callable until run");
        self.promise.fulfill(run(arg));
    }
}

/// Creates a linked producer/observer pair on `executor`.
///
/// The returned future observes the result of `f`; continuations attached to
/// it without an explicit executor inherit `executor`. This is the only
/// factory for promise/future pairs.
pub fn package<A, T, F>(executor: &ExecutorRef, f: F) -> (PackagedTask<A, T>, Future<T>)
where
    A: Send + 'static,
    T: Send + 'static,
    F: FnOnce(A) -> T + Send + 'static,
{
    let state = SharedState::new(executor.dupe());
    let task = PackagedTask {
        promise: Promise::new(&state),
        run: Some(Box::new(move |arg| Ok(f(arg)))),
    };
    (task, Future::from_state(state))
}

/// Like [`package`], for a fallible callable. An `Err` fulfills the paired
/// future with that error.
pub fn try_package<A, T, F>(executor: &ExecutorRef, f: F) -> (PackagedTask<A, T>, Future<T>)
where
    A: Send + 'static,
    T: Send + 'static,
    F: FnOnce(A) -> anyhow::Result<T> + Send + 'static,
{
    let state = SharedState::new(executor.dupe());
    let task = PackagedTask {
        promise: Promise::new(&state),
        run: Some(Box::new(move |arg| f(arg).map_err(Error::new))),
    };
    (task, Future::from_state(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorRef;

    #[test]
    fn running_fulfills_the_future() {
        let executor = ExecutorRef::immediate();
        let (task, future) = package(&executor, |n: u32| n * 2);
        assert!(!future.is_ready());
        task.run(21);
        assert_eq!(future.try_get().unwrap(), Some(42));
    }

    #[test]
    fn dropping_an_armed_task_breaks_the_promise() {
        let executor = ExecutorRef::immediate();
        let (task, future) = package(&executor, |n: u32| n);
        drop(task);
        assert!(future.error().unwrap().is_broken_promise());
    }

    #[test]
    fn unobserved_task_is_elided() {
        let executor = ExecutorRef::immediate();
        let (task, future) = package(&executor, |()| {
            panic!("must never run");
        });
        drop(future);
        task.run(());
    }

    #[test]
    fn a_failing_callable_fulfills_with_its_error() {
        let executor = ExecutorRef::immediate();
        let (task, future) = try_package(&executor, |()| -> anyhow::Result<u32> {
            Err(anyhow::anyhow!("boom"))
        });
        task.run(());
        assert_eq!(future.error().unwrap().to_string(), "boom");
    }
}
