/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! A movable, type-erased, one-shot callable with a fixed signature.

/// A one-shot callable of signature `FnOnce(A) -> T`.
///
/// Invocation consumes the task, so a task can never be run twice. Executors
/// receive the nullary form `Task<(), ()>` (the default parameters).
pub struct Task<A = (), T = ()> {
    run: Box<dyn FnOnce(A) -> T + Send + 'static>,
}

impl<A: 'static, T: 'static> Task<A, T> {
    pub fn new(f: impl FnOnce(A) -> T + Send + 'static) -> Self {
        Task { run: Box::new(f) }
    }

    /// Consumes the task and runs the wrapped callable.
    pub fn run(self, arg: A) -> T {
        (self.run)(arg)
    }
}

impl<A, T> std::fmt::Debug for Task<A, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Task")
    }
}
