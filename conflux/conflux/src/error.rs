/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! The error carried by a failed future.

use std::fmt;
use std::sync::Arc;

use allocative::Allocative;
use dupe::Dupe;

/// An opaque, cheaply clonable error handle.
///
/// A single failure fans out to every downstream edge of a chain, so the
/// payload is shared rather than copied.
#[derive(Clone, Dupe, Allocative)]
pub struct Error {
    #[allocative(skip)]
    inner: Arc<anyhow::Error>,
}

impl Error {
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Error {
            inner: Arc::new(error.into()),
        }
    }

    pub(crate) fn broken_promise() -> Self {
        Error::new(BrokenPromise)
    }

    /// True if this error reports an abandoned producer.
    pub fn is_broken_promise(&self) -> bool {
        self.inner.downcast_ref::<BrokenPromise>().is_some()
    }

    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl From<anyhow::Error> for Error {
    fn from(error: anyhow::Error) -> Self {
        Error::new(error)
    }
}

/// The distinguished error observed by every downstream of a shared state
/// whose producer went away without fulfilling it.
#[derive(Debug, thiserror::Error)]
#[error("broken promise: the producer was dropped before fulfilling")]
pub struct BrokenPromise;
