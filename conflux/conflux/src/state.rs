/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! The single-assignment storage linking a producer to its observers.
//!
//! A `SharedState` is resolved at most once; the ready flag only ever goes
//! from pending to ready, and the stored result is immutable afterwards.
//! Continuations registered before resolution are dispatched exactly once
//! when it happens; continuations registered after are dispatched right
//! away. Dispatch always goes through the continuation's recorded executor.
//!
//! Ownership discipline: observer handles hold their state strongly, and a
//! downstream state retains its upstream until it resolves, so a chain is
//! owned tail-first by whoever can still observe it. Queued continuations
//! hold both of their endpoints weakly, and producers hold the state weakly
//! too: once the last handle of a chain is gone nothing keeps its states
//! alive, and a producer finding its state dead elides the work. `detach`
//! opts out by pinning the state through its own continuation list until
//! resolution.

use std::any::Any;
use std::mem;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dupe::Dupe;
use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::error::Error;
use crate::executor::ExecutorRef;
use crate::task::Task;

pub(crate) struct SharedState<T> {
    executor: ExecutorRef,
    ready: AtomicBool,
    inner: Mutex<Inner<T>>,
}

struct Inner<T> {
    slot: Slot<T>,
    /// Installed the first time a handle to this state is cloned. Once
    /// present, continuation dispatch copies the value out instead of moving
    /// it, so every sibling observes it.
    clone_fn: Option<fn(&T) -> T>,
    /// Whatever upstream must stay alive to feed this state, held until
    /// resolution. Type-erased: a single state, or a whole set of join
    /// inputs.
    retained: Option<Box<dyn Any + Send + Sync>>,
}

enum Slot<T> {
    Pending {
        continuations: SmallVec<[Continuation; 1]>,
    },
    Value(T),
    /// A move-only value was extracted; observing the slot again is a
    /// programming error.
    Taken,
    Failed(Error),
}

struct Continuation {
    executor: ExecutorRef,
    run: Task,
}

impl<T> SharedState<T> {
    pub(crate) fn new(executor: ExecutorRef) -> Arc<Self> {
        Arc::new(SharedState {
            executor,
            ready: AtomicBool::new(false),
            inner: Mutex::new(Inner {
                slot: Slot::Pending {
                    continuations: SmallVec::new(),
                },
                clone_fn: None,
                retained: None,
            }),
        })
    }

    pub(crate) fn executor(&self) -> &ExecutorRef {
        &self.executor
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Resolves the state; the first call wins and later calls are no-ops.
    ///
    /// Queued continuations are drained under the lock but submitted to
    /// their executors only after it is released: an immediate executor
    /// re-enters this state from inside the continuation. The retained
    /// upstream is released here too, once its value has been captured.
    pub(crate) fn resolve(&self, result: Result<T, Error>) {
        let (drained, retained) = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            match &mut inner.slot {
                Slot::Pending { continuations } => {
                    let drained = mem::take(continuations);
                    let retained = inner.retained.take();
                    inner.slot = match result {
                        Ok(value) => Slot::Value(value),
                        Err(error) => Slot::Failed(error),
                    };
                    self.ready.store(true, Ordering::Release);
                    (drained, retained)
                }
                _ => return,
            }
        };
        drop(retained);
        for continuation in drained {
            continuation.executor.execute(continuation.run);
        }
    }

    /// Registers a continuation, to be dispatched on `executor` once this
    /// state is ready. If it already is, dispatch happens immediately.
    pub(crate) fn attach(&self, executor: ExecutorRef, run: Task) {
        {
            let mut inner = self.inner.lock();
            if let Slot::Pending { continuations } = &mut inner.slot {
                continuations.push(Continuation { executor, run });
                return;
            }
        }
        executor.execute(run);
    }

    /// Marks this state as shared between several handles. Dispatch then
    /// copies values out via `clone_fn` rather than moving them.
    pub(crate) fn mark_shared(&self, clone_fn: fn(&T) -> T) {
        self.inner.lock().clone_fn = Some(clone_fn);
    }

    /// Holds `upstream` alive until this state resolves. A later call
    /// replaces the previous retention (an adopted inner future takes the
    /// place of the stage that produced it).
    pub(crate) fn retain(&self, upstream: Box<dyn Any + Send + Sync>) {
        let replaced = {
            let mut inner = self.inner.lock();
            if self.is_ready() {
                // Nothing left to feed this state.
                Some(upstream)
            } else {
                mem::replace(&mut inner.retained, Some(upstream))
            }
        };
        drop(replaced);
    }

    /// Extracts the result: a copy when the state is shared, the value
    /// itself otherwise. `Ok(None)` while pending.
    pub(crate) fn try_extract(&self) -> Result<Option<T>, Error> {
        if !self.is_ready() {
            return Ok(None);
        }
        let mut inner = self.inner.lock();
        if let Some(clone_fn) = inner.clone_fn {
            return match &inner.slot {
                Slot::Value(value) => Ok(Some(clone_fn(value))),
                Slot::Failed(error) => Err(error.dupe()),
                Slot::Taken => panic!("future value observed after it was moved out"),
                Slot::Pending { .. } => unreachable!("state is ready but unresolved"),
            };
        }
        match mem::replace(&mut inner.slot, Slot::Taken) {
            Slot::Value(value) => Ok(Some(value)),
            Slot::Failed(error) => {
                inner.slot = Slot::Failed(error.dupe());
                Err(error)
            }
            Slot::Taken => panic!("future value observed after it was moved out"),
            Slot::Pending { .. } => unreachable!("state is ready but unresolved"),
        }
    }

    /// Extraction for a dispatched continuation, where readiness is an
    /// invariant rather than a question.
    pub(crate) fn take_ready(&self) -> Result<T, Error> {
        match self.try_extract() {
            Ok(Some(value)) => Ok(value),
            Err(error) => Err(error),
            Ok(None) => panic!("continuation dispatched before its upstream resolved"),
        }
    }

    /// Copies the value out, leaving it in place for other observers.
    pub(crate) fn try_peek(&self) -> Result<Option<T>, Error>
    where
        T: Clone,
    {
        if !self.is_ready() {
            return Ok(None);
        }
        match &self.inner.lock().slot {
            Slot::Value(value) => Ok(Some(value.clone())),
            Slot::Failed(error) => Err(error.dupe()),
            Slot::Taken => panic!("future value observed after it was moved out"),
            Slot::Pending { .. } => unreachable!("state is ready but unresolved"),
        }
    }

    /// Moves the value out unconditionally. The terminal accessor for
    /// move-only values; taking twice is a programming error.
    pub(crate) fn try_take(&self) -> Result<Option<T>, Error> {
        if !self.is_ready() {
            return Ok(None);
        }
        let mut inner = self.inner.lock();
        match mem::replace(&mut inner.slot, Slot::Taken) {
            Slot::Value(value) => Ok(Some(value)),
            Slot::Failed(error) => {
                inner.slot = Slot::Failed(error.dupe());
                Err(error)
            }
            Slot::Taken => panic!("future value taken twice"),
            Slot::Pending { .. } => unreachable!("state is ready but unresolved"),
        }
    }

    pub(crate) fn error(&self) -> Option<Error> {
        if !self.is_ready() {
            return None;
        }
        match &self.inner.lock().slot {
            Slot::Failed(error) => Some(error.dupe()),
            _ => None,
        }
    }
}
