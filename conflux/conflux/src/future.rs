/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! The observer handle of a shared state and its continuation surface.

use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use dupe::Dupe;
use futures::task::AtomicWaker;

use crate::error::Error;
use crate::executor::ExecutorRef;
use crate::state::SharedState;
use crate::task::Task;

/// An observer of a value that a producer will supply at some later point.
///
/// Continuations (`map`, `then`, `recover` and their fallible variants) are
/// scheduled on an executor once the value arrives; the variants without an
/// explicit executor inherit the one the future was created on. Errors skip
/// `map` and `then` callables and surface either through `recover` or at the
/// consuming accessors.
///
/// A future is clonable only when its value type is: clones share the state,
/// every attached continuation then observes a copy of the value. For
/// move-only values the single handle is the single consumer, and the value
/// is moved into whichever continuation or accessor claims it.
///
/// Dropping the last handle to a chain whose producing task has not started
/// lets that work be elided; `detach` opts a chain out of this.
pub struct Future<T> {
    state: Arc<SharedState<T>>,
    waker: Option<Arc<AtomicWaker>>,
}

impl<T: Send + 'static> Future<T> {
    pub(crate) fn from_state(state: Arc<SharedState<T>>) -> Self {
        Future { state, waker: None }
    }

    /// True once a value or error is stored. Monotonic.
    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// The stored error, if this future is ready with one.
    pub fn error(&self) -> Option<Error> {
        self.state.error()
    }

    /// The executor continuations inherit when none is given explicitly.
    pub fn executor(&self) -> &ExecutorRef {
        self.state.executor()
    }

    /// Moves the result out: `Ok(None)` while pending, the value once ready,
    /// the stored error once failed. The terminal accessor for move-only
    /// values; taking a value twice is a programming error.
    pub fn try_take(&self) -> Result<Option<T>, Error> {
        self.state.try_take()
    }

    /// Keeps the chain alive through completion even with no handle held.
    ///
    /// The state pins itself through its own continuation list until it
    /// resolves, the one deliberate exception to the tail-first ownership
    /// that makes abandoned chains collapse.
    pub fn detach(self) {
        let state = Arc::clone(&self.state);
        self.state
            .attach(ExecutorRef::immediate(), Task::new(move |()| drop(state)));
    }

    /// Schedules `f` with the value once it arrives; an upstream error skips
    /// `f` and propagates unchanged.
    pub fn map<U>(self, f: impl FnOnce(T) -> U + Send + 'static) -> Future<U>
    where
        U: Send + 'static,
    {
        self.map_impl(None, f)
    }

    /// `map` on an explicit executor.
    pub fn map_on<U>(
        self,
        executor: &ExecutorRef,
        f: impl FnOnce(T) -> U + Send + 'static,
    ) -> Future<U>
    where
        U: Send + 'static,
    {
        self.map_impl(Some(executor), f)
    }

    /// Schedules a fallible `f` with the value; its `Err` becomes the
    /// downstream error. An upstream error still skips `f`.
    pub fn try_map<U>(self, f: impl FnOnce(T) -> anyhow::Result<U> + Send + 'static) -> Future<U>
    where
        U: Send + 'static,
    {
        self.try_map_impl(None, f)
    }

    /// `try_map` on an explicit executor.
    pub fn try_map_on<U>(
        self,
        executor: &ExecutorRef,
        f: impl FnOnce(T) -> anyhow::Result<U> + Send + 'static,
    ) -> Future<U>
    where
        U: Send + 'static,
    {
        self.try_map_impl(Some(executor), f)
    }

    /// Schedules `f` with the value and adopts the future it returns: the
    /// result observes the inner value directly, never a nested future, and
    /// stays pending until the inner future is ready.
    pub fn then<U>(self, f: impl FnOnce(T) -> Future<U> + Send + 'static) -> Future<U>
    where
        U: Send + 'static,
    {
        self.then_impl(None, f)
    }

    /// `then` on an explicit executor.
    pub fn then_on<U>(
        self,
        executor: &ExecutorRef,
        f: impl FnOnce(T) -> Future<U> + Send + 'static,
    ) -> Future<U>
    where
        U: Send + 'static,
    {
        self.then_impl(Some(executor), f)
    }

    /// Schedules `f` with the outcome, value or error alike. The only way an
    /// upstream error reaches user code.
    pub fn recover<U>(self, f: impl FnOnce(Result<T, Error>) -> U + Send + 'static) -> Future<U>
    where
        U: Send + 'static,
    {
        self.recover_impl(None, f)
    }

    /// `recover` on an explicit executor.
    pub fn recover_on<U>(
        self,
        executor: &ExecutorRef,
        f: impl FnOnce(Result<T, Error>) -> U + Send + 'static,
    ) -> Future<U>
    where
        U: Send + 'static,
    {
        self.recover_impl(Some(executor), f)
    }

    /// Fallible `recover`: the callable observes the outcome and may itself
    /// fail, which fails the downstream.
    pub fn try_recover<U>(
        self,
        f: impl FnOnce(Result<T, Error>) -> anyhow::Result<U> + Send + 'static,
    ) -> Future<U>
    where
        U: Send + 'static,
    {
        self.try_recover_impl(None, f)
    }

    /// `try_recover` on an explicit executor.
    pub fn try_recover_on<U>(
        self,
        executor: &ExecutorRef,
        f: impl FnOnce(Result<T, Error>) -> anyhow::Result<U> + Send + 'static,
    ) -> Future<U>
    where
        U: Send + 'static,
    {
        self.try_recover_impl(Some(executor), f)
    }

    fn map_impl<U: Send + 'static>(
        self,
        executor: Option<&ExecutorRef>,
        f: impl FnOnce(T) -> U + Send + 'static,
    ) -> Future<U> {
        self.pipe(executor, move |result, downstream| match result {
            Ok(value) => downstream.resolve(Ok(f(value))),
            Err(error) => downstream.resolve(Err(error)),
        })
    }

    fn try_map_impl<U: Send + 'static>(
        self,
        executor: Option<&ExecutorRef>,
        f: impl FnOnce(T) -> anyhow::Result<U> + Send + 'static,
    ) -> Future<U> {
        self.pipe(executor, move |result, downstream| match result {
            Ok(value) => downstream.resolve(f(value).map_err(Error::new)),
            Err(error) => downstream.resolve(Err(error)),
        })
    }

    fn then_impl<U: Send + 'static>(
        self,
        executor: Option<&ExecutorRef>,
        f: impl FnOnce(T) -> Future<U> + Send + 'static,
    ) -> Future<U> {
        self.pipe(executor, move |result, downstream| match result {
            Ok(value) => f(value).forward_to(downstream),
            Err(error) => downstream.resolve(Err(error)),
        })
    }

    fn recover_impl<U: Send + 'static>(
        self,
        executor: Option<&ExecutorRef>,
        f: impl FnOnce(Result<T, Error>) -> U + Send + 'static,
    ) -> Future<U> {
        self.pipe(executor, move |result, downstream| {
            downstream.resolve(Ok(f(result)))
        })
    }

    fn try_recover_impl<U: Send + 'static>(
        self,
        executor: Option<&ExecutorRef>,
        f: impl FnOnce(Result<T, Error>) -> anyhow::Result<U> + Send + 'static,
    ) -> Future<U> {
        self.pipe(executor, move |result, downstream| {
            downstream.resolve(f(result).map_err(Error::new))
        })
    }

    /// The continuation primitive: creates the downstream state, registers a
    /// continuation on this future that extracts the outcome and hands it to
    /// `f` together with the downstream, and returns the downstream handle.
    ///
    /// Ownership runs tail-first: the downstream retains this state until it
    /// resolves, while the queued continuation holds both endpoints weakly.
    /// Dropping every handle to the downstream therefore releases the whole
    /// upstream chain, its not-yet-run producer included, and a dispatch
    /// that finds the downstream gone elides `f`.
    fn pipe<U, F>(self, executor: Option<&ExecutorRef>, f: F) -> Future<U>
    where
        U: Send + 'static,
        F: FnOnce(Result<T, Error>, &Arc<SharedState<U>>) + Send + 'static,
    {
        let executor = match executor {
            Some(executor) => executor.dupe(),
            None => self.state.executor().dupe(),
        };
        let downstream = SharedState::new(executor.dupe());
        downstream.retain(Box::new(Arc::clone(&self.state)));
        let weak_downstream = Arc::downgrade(&downstream);
        let weak_upstream = Arc::downgrade(&self.state);
        self.state.attach(
            executor,
            Task::new(move |()| {
                let downstream = match weak_downstream.upgrade() {
                    Some(downstream) => downstream,
                    None => {
                        tracing::trace!("continuation elided; its future was dropped");
                        return;
                    }
                };
                // A live downstream retains the upstream, so this upgrade
                // only fails once the chain is torn down.
                let upstream = match weak_upstream.upgrade() {
                    Some(upstream) => upstream,
                    None => return,
                };
                f(upstream.take_ready(), &downstream);
            }),
        );
        Future::from_state(downstream)
    }

    /// Resolves `target` with this future's outcome once it is ready. Used
    /// to adopt an inner future: no executor hop, the target takes over the
    /// retention of this chain, and is itself held weakly so an unobserved
    /// adoption dissolves.
    pub(crate) fn forward_to(self, target: &Arc<SharedState<T>>) {
        target.retain(Box::new(Arc::clone(&self.state)));
        let weak_target = Arc::downgrade(target);
        let weak_inner = Arc::downgrade(&self.state);
        self.state.attach(
            ExecutorRef::immediate(),
            Task::new(move |()| {
                let target = match weak_target.upgrade() {
                    Some(target) => target,
                    None => return,
                };
                let inner = match weak_inner.upgrade() {
                    Some(inner) => inner,
                    None => return,
                };
                target.resolve(inner.take_ready());
            }),
        );
    }

    /// Registers `f` to run with the outcome on `executor` once ready. The
    /// callable holds this state weakly and is skipped if the state died
    /// first; a caller that needs the state fed must retain it elsewhere,
    /// the way a join's downstream retains its inputs.
    pub(crate) fn on_ready(
        self,
        executor: ExecutorRef,
        f: impl FnOnce(Result<T, Error>) + Send + 'static,
    ) {
        let upstream = Arc::downgrade(&self.state);
        self.state.attach(
            executor,
            Task::new(move |()| {
                if let Some(upstream) = upstream.upgrade() {
                    f(upstream.take_ready());
                }
            }),
        );
    }

    pub(crate) fn state(&self) -> &Arc<SharedState<T>> {
        &self.state
    }
}

impl<T: Clone + Send + 'static> Future<T> {
    /// Copies the result out: `Ok(None)` while pending, a copy of the value
    /// once ready, the stored error once failed. The value stays in place
    /// for other observers.
    pub fn try_get(&self) -> Result<Option<T>, Error> {
        self.state.try_peek()
    }
}

impl<U: Send + 'static> Future<Future<U>> {
    /// Collapses a nested future. Equivalent to `then` with the identity
    /// callable.
    pub fn flatten(self) -> Future<U> {
        self.then(|inner| inner)
    }
}

/// Cloning marks the state as shared, so the value is copied to every
/// observer instead of moved into the first.
impl<T: Clone + Send + 'static> Clone for Future<T> {
    fn clone(&self) -> Self {
        self.state.mark_shared(<T as Clone>::clone as fn(&T) -> T);
        Future {
            state: Arc::clone(&self.state),
            waker: None,
        }
    }
}

impl<T: Clone + Send + 'static> Dupe for Future<T> {}

/// Awaiting a future consumes its value the way `try_take` does (for shared,
/// clonable states each awaiting handle observes a copy). The stored error
/// surfaces as the `Err` branch at the await point.
impl<T: Send + 'static> std::future::Future for Future<T> {
    type Output = Result<T, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        match this.state.try_extract() {
            Ok(Some(value)) => return Poll::Ready(Ok(value)),
            Err(error) => return Poll::Ready(Err(error)),
            Ok(None) => {}
        }
        match &this.waker {
            Some(waker) => waker.register(cx.waker()),
            None => {
                let waker = Arc::new(AtomicWaker::new());
                waker.register(cx.waker());
                let wake = Arc::clone(&waker);
                this.state.attach(
                    ExecutorRef::immediate(),
                    Task::new(move |()| wake.wake()),
                );
                this.waker = Some(waker);
            }
        }
        // Resolution may have raced the registration; the registered waker
        // stays armed either way.
        match this.state.try_extract() {
            Ok(Some(value)) => Poll::Ready(Ok(value)),
            Err(error) => Poll::Ready(Err(error)),
            Ok(None) => Poll::Pending,
        }
    }
}
