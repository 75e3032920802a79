/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Composable asynchronous values driven by caller-supplied executors.
//!
//! A [`Future`] observes a value that a producer supplies once; continuations
//! attached to it run on whichever [`executor::Executor`] they were given,
//! the library itself owns no threads. Chains are built with `map`, `then`
//! (which adopts a future returned by its callable, so nesting never
//! surfaces) and `recover` (the error hand-off), joined with [`when_all`] /
//! [`when_all_args`], and entered through [`spawn`] or [`package`]. A chain
//! nobody can observe any more resolves to a [`BrokenPromise`] error rather
//! than running.
//!
//! ```
//! use conflux::spawn;
//! use conflux::ExecutorRef;
//!
//! let executor = ExecutorRef::immediate();
//! let answer = spawn(&executor, || 6 * 7).map(|n| n + 1);
//! assert_eq!(answer.try_get().unwrap(), Some(43));
//! ```

mod error;
pub mod executor;
mod future;
mod promise;
mod spawn;
mod state;
mod task;
mod when_all;

pub use crate::error::BrokenPromise;
pub use crate::error::Error;
pub use crate::executor::Executor;
pub use crate::executor::ExecutorRef;
pub use crate::executor::ImmediateExecutor;
pub use crate::executor::ManualExecutor;
pub use crate::executor::TokioExecutor;
pub use crate::future::Future;
pub use crate::promise::package;
pub use crate::promise::try_package;
pub use crate::promise::PackagedTask;
pub use crate::spawn::make_error_future;
pub use crate::spawn::make_ready_future;
pub use crate::spawn::spawn;
pub use crate::spawn::try_spawn;
pub use crate::task::Task;
pub use crate::when_all::when_all;
pub use crate::when_all::when_all_args;
pub use crate::when_all::FutureArgs;

#[cfg(test)]
mod tests;
