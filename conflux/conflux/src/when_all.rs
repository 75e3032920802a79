/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Joins: waiting for every input before combining their values.
//!
//! Both forms short-circuit on the first input to fail; the combiner never
//! runs and pending values are discarded. Input futures are consumed, their
//! values moved into the aggregation.

use std::any::Any;
use std::mem;
use std::sync::Arc;
use std::sync::Weak;

use dupe::Dupe;
use parking_lot::Mutex;

use crate::error::Error;
use crate::executor::ExecutorRef;
use crate::future::Future;
use crate::state::SharedState;

/// Waits for every future in `inputs`, then schedules
/// `combiner(values)` on `executor` with the values in input order. An empty
/// range is permitted: the combiner runs with an empty vector.
///
/// ```
/// use conflux::make_ready_future;
/// use conflux::when_all;
/// use conflux::ExecutorRef;
///
/// let executor = ExecutorRef::immediate();
/// let inputs = vec![
///     make_ready_future(&executor, 1),
///     make_ready_future(&executor, 2),
/// ];
/// let sum = when_all(&executor, |values| values.iter().sum::<i32>(), inputs);
/// assert_eq!(sum.try_get().unwrap(), Some(3));
/// ```
pub fn when_all<T, U, F>(executor: &ExecutorRef, combiner: F, inputs: Vec<Future<T>>) -> Future<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnOnce(Vec<T>) -> U + Send + 'static,
{
    let downstream = SharedState::new(executor.dupe());
    if inputs.is_empty() {
        let weak = Arc::downgrade(&downstream);
        executor.execute_fn(move || {
            if let Some(downstream) = weak.upgrade() {
                downstream.resolve(Ok(combiner(Vec::new())));
            }
        });
        return Future::from_state(downstream);
    }
    // The join result owns its inputs until it resolves; dropping it (or an
    // early error) releases them, and unstarted input producers elide.
    let retained: Vec<Arc<SharedState<T>>> = inputs
        .iter()
        .map(|input| Arc::clone(input.state()))
        .collect();
    downstream.retain(Box::new(retained));
    let gather = Arc::new(Gather {
        executor: executor.dupe(),
        downstream: Arc::downgrade(&downstream),
        inner: Mutex::new(GatherInner {
            remaining: inputs.len(),
            failed: false,
            values: (0..inputs.len()).map(|_| None).collect(),
            combiner: Some(combiner),
        }),
    });
    for (index, input) in inputs.into_iter().enumerate() {
        let gather = Arc::clone(&gather);
        input.on_ready(ExecutorRef::immediate(), move |result| match result {
            Ok(value) => gather.accept(index, value),
            Err(error) => gather.fail(error),
        });
    }
    Future::from_state(downstream)
}

struct Gather<T, U, F> {
    executor: ExecutorRef,
    downstream: Weak<SharedState<U>>,
    inner: Mutex<GatherInner<T, F>>,
}

struct GatherInner<T, F> {
    remaining: usize,
    failed: bool,
    values: Vec<Option<T>>,
    combiner: Option<F>,
}

impl<T, U, F> Gather<T, U, F>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnOnce(Vec<T>) -> U + Send + 'static,
{
    fn fail(&self, error: Error) {
        {
            let mut inner = self.inner.lock();
            if inner.failed {
                return;
            }
            inner.failed = true;
            inner.values.clear();
            inner.combiner = None;
        }
        if let Some(downstream) = self.downstream.upgrade() {
            downstream.resolve(Err(error));
        }
    }

    fn accept(&self, index: usize, value: T) {
        let finished = {
            let mut inner = self.inner.lock();
            if inner.failed {
                return;
            }
            inner.values[index] = Some(value);
            inner.remaining -= 1;
            if inner.remaining == 0 {
                let values = inner
                    .values
                    .iter_mut()
                    .map(|slot| slot.take().expect("every input reported a value"))
                    .collect::<Vec<_>>();
                Some((values, inner.combiner.take().expect("combiner runs once")))
            } else {
                None
            }
        };
        if let Some((values, combiner)) = finished {
            let downstream = self.downstream.clone();
            self.executor.execute_fn(move || {
                if let Some(downstream) = downstream.upgrade() {
                    downstream.resolve(Ok(combiner(values)));
                }
            });
        }
    }
}

/// The variadic join: implemented for tuples of futures up to arity five,
/// the combiner receives the values as positional arguments.
pub trait FutureArgs<U, F> {
    fn join(self, executor: &ExecutorRef, combiner: F) -> Future<U>;
}

/// Waits for every future in the tuple, then schedules the combiner on
/// `executor` with the values in positional order. Input types may differ.
pub fn when_all_args<U, F, Args>(executor: &ExecutorRef, combiner: F, futures: Args) -> Future<U>
where
    Args: FutureArgs<U, F>,
{
    futures.join(executor, combiner)
}

struct ArgsGather<S, U> {
    executor: ExecutorRef,
    downstream: Weak<SharedState<U>>,
    inner: Mutex<ArgsInner<S, U>>,
}

struct ArgsInner<S, U> {
    remaining: usize,
    failed: bool,
    slots: S,
    finish: Option<Box<dyn FnOnce(S) -> U + Send + 'static>>,
}

impl<S, U> ArgsGather<S, U>
where
    S: Default + Send + 'static,
    U: Send + 'static,
{
    fn fail(&self, error: Error) {
        {
            let mut inner = self.inner.lock();
            if inner.failed {
                return;
            }
            inner.failed = true;
            inner.slots = S::default();
            inner.finish = None;
        }
        if let Some(downstream) = self.downstream.upgrade() {
            downstream.resolve(Err(error));
        }
    }

    fn complete_one(&self, store: impl FnOnce(&mut S)) {
        let finished = {
            let mut inner = self.inner.lock();
            if inner.failed {
                return;
            }
            store(&mut inner.slots);
            inner.remaining -= 1;
            if inner.remaining == 0 {
                Some((
                    mem::take(&mut inner.slots),
                    inner.finish.take().expect("combiner runs once"),
                ))
            } else {
                None
            }
        };
        if let Some((slots, finish)) = finished {
            let downstream = self.downstream.clone();
            self.executor.execute_fn(move || {
                if let Some(downstream) = downstream.upgrade() {
                    downstream.resolve(Ok(finish(slots)));
                }
            });
        }
    }
}

macro_rules! impl_future_args {
    ($($var:ident $T:ident $idx:tt),+) => {
        impl<U, F, $($T,)+> FutureArgs<U, F> for ($(Future<$T>,)+)
        where
            U: Send + 'static,
            F: FnOnce($($T),+) -> U + Send + 'static,
            $($T: Send + 'static,)+
        {
            fn join(self, executor: &ExecutorRef, combiner: F) -> Future<U> {
                let downstream = SharedState::new(executor.dupe());
                let finish = Box::new(move |slots: ($(Option<$T>,)+)| {
                    let ($($var,)+) = slots;
                    combiner($($var.expect("every input reported a value"),)+)
                });
                let gather = Arc::new(ArgsGather {
                    executor: executor.dupe(),
                    downstream: Arc::downgrade(&downstream),
                    inner: Mutex::new(ArgsInner {
                        remaining: [$(stringify!($T),)+].len(),
                        failed: false,
                        slots: <($(Option<$T>,)+)>::default(),
                        finish: Some(finish),
                    }),
                });
                let ($($var,)+) = self;
                let retained: Vec<Box<dyn Any + Send + Sync>> =
                    vec![$(Box::new(Arc::clone($var.state())),)+];
                downstream.retain(Box::new(retained));
                $(
                    {
                        let gather = Arc::clone(&gather);
                        $var.on_ready(ExecutorRef::immediate(), move |result| match result {
                            Ok(value) => gather.complete_one(move |slots| slots.$idx = Some(value)),
                            Err(error) => gather.fail(error),
                        });
                    }
                )+
                Future::from_state(downstream)
            }
        }
    };
}

impl_future_args!(a A 0);
impl_future_args!(a A 0, b B 1);
impl_future_args!(a A 0, b B 1, c C 2);
impl_future_args!(a A 0, b B 1, c C 2, d D 3);
impl_future_args!(a A 0, b B 1, c C 2, d D 3, e E 4);
