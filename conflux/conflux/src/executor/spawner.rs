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
use tokio::runtime::Handle;

use crate::executor::Executor;
use crate::task::Task;

/// An executor backed by a tokio runtime.
///
/// Tasks run on the runtime's worker threads; the timed overload uses the
/// runtime's timer. Intended for short, non-blocking continuations.
#[derive(Clone, Allocative)]
pub struct TokioExecutor {
    #[allocative(skip)]
    handle: Handle,
}

impl Dupe for TokioExecutor {}

impl TokioExecutor {
    pub fn new(handle: Handle) -> Self {
        TokioExecutor { handle }
    }

    /// Binds to the runtime of the calling context. Panics outside one, as
    /// `Handle::current` does.
    pub fn current() -> Self {
        TokioExecutor::new(Handle::current())
    }
}

impl Executor for TokioExecutor {
    fn execute(&self, task: Task) {
        self.handle.spawn(async move { task.run(()) });
    }

    fn execute_at(&self, deadline: Instant, task: Task) {
        self.handle.spawn(async move {
            tokio::time::sleep_until(deadline.into()).await;
            task.run(());
        });
    }
}
