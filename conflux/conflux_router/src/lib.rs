/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Keyed routing of an input stream onto typed channel endpoints.
//!
//! A [`Router`] classifies each input into keys and forwards the input to
//! the channel registered under every matching key. Classification runs on
//! the router's executor, consumption on each channel's own. Routes are
//! registered on a [`RouterBuilder`]; freezing it sorts the table, so
//! dispatch needs no lock.
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::Mutex;
//!
//! use conflux::ExecutorRef;
//! use conflux_router::RouterBuilder;
//!
//! let executor = ExecutorRef::immediate();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let mut builder = RouterBuilder::new(&executor, |n: &u32| vec![n % 10]);
//! let ones = builder.add_route(1, &executor);
//! let sink = Arc::clone(&seen);
//! ones.attach(move |n| sink.lock().unwrap().push(n));
//!
//! let router = builder.ready();
//! router.route(21);
//! router.route(30); // no route under key 0; dropped
//! assert_eq!(*seen.lock().unwrap(), vec![21]);
//! ```

mod channel;
mod router;

pub use crate::channel::channel;
pub use crate::channel::Receiver;
pub use crate::channel::Sender;
pub use crate::router::Router;
pub use crate::router::RouterBuilder;
