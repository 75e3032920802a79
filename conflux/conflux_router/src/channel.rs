/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! A minimal push channel: a callable sender, a receiver that buffers until
//! its wiring is complete.

use std::collections::VecDeque;
use std::sync::Arc;

use conflux::ExecutorRef;
use dupe::Dupe;
use parking_lot::Mutex;

/// Creates a channel whose values are consumed on `executor`.
///
/// Values sent before the receiver is marked ready are buffered; marking it
/// ready drains the backlog. Each value is consumed by one executor task.
pub fn channel<T: Send + 'static>(executor: &ExecutorRef) -> (Sender<T>, Receiver<T>) {
    let state = Arc::new(ChannelState {
        executor: executor.dupe(),
        buffer: Mutex::new(Buffer {
            ready: false,
            backlog: VecDeque::new(),
        }),
        consume: Mutex::new(None),
        upstream_ready: Mutex::new(None),
    });
    (Sender(Arc::clone(&state)), Receiver(state))
}

struct ChannelState<T> {
    executor: ExecutorRef,
    buffer: Mutex<Buffer<T>>,
    /// Kept apart from the buffer lock; user code runs under this one only.
    consume: Mutex<Option<Box<dyn FnMut(T) + Send + 'static>>>,
    /// Readiness cascade for piped channels: marking this channel ready also
    /// marks the one feeding it.
    upstream_ready: Mutex<Option<Box<dyn FnOnce() + Send + 'static>>>,
}

struct Buffer<T> {
    ready: bool,
    backlog: VecDeque<T>,
}

impl<T: Send + 'static> ChannelState<T> {
    fn dispatch(state: &Arc<Self>, value: T) {
        let consumer = Arc::clone(state);
        state.executor.execute_fn(move || {
            let mut consume = consumer.consume.lock();
            match consume.as_mut() {
                Some(consume) => consume(value),
                None => tracing::trace!("channel value dropped; no consumer attached"),
            }
        });
    }

    fn mark_ready(state: &Arc<Self>) {
        let drained = {
            let mut buffer = state.buffer.lock();
            buffer.ready = true;
            buffer.backlog.drain(..).collect::<Vec<_>>()
        };
        for value in drained {
            ChannelState::dispatch(state, value);
        }
        let upstream = state.upstream_ready.lock().take();
        if let Some(upstream) = upstream {
            upstream();
        }
    }
}

/// The producing end. Clones share the channel.
pub struct Sender<T>(Arc<ChannelState<T>>);

impl<T: Send + 'static> Sender<T> {
    /// Pushes a value: buffered while the channel is not ready, scheduled
    /// for consumption on the channel's executor afterwards.
    pub fn send(&self, value: T) {
        {
            let mut buffer = self.0.buffer.lock();
            if !buffer.ready {
                buffer.backlog.push_back(value);
                return;
            }
        }
        ChannelState::dispatch(&self.0, value);
    }

    pub(crate) fn mark_ready(&self) {
        ChannelState::mark_ready(&self.0);
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Sender(Arc::clone(&self.0))
    }
}

impl<T> Dupe for Sender<T> {}

/// The consuming end.
pub struct Receiver<T>(Arc<ChannelState<T>>);

impl<T: Send + 'static> Receiver<T> {
    /// Installs the consumer the channel's executor feeds values to.
    /// Attaching twice is a programming error.
    pub fn attach(&self, consume: impl FnMut(T) + Send + 'static) {
        let mut slot = self.0.consume.lock();
        assert!(slot.is_none(), "channel consumer attached twice");
        *slot = Some(Box::new(consume));
    }

    /// Marks the wiring complete and begins consumption, draining anything
    /// buffered so far. For a piped receiver the whole chain upstream of it
    /// becomes ready as well.
    pub fn set_ready(&self) {
        ChannelState::mark_ready(&self.0);
    }

    /// Feeds this receiver through `process`, producing a receiver of the
    /// processed values on the same executor. Consumes the attachment slot;
    /// marking the returned receiver ready readies this one too.
    pub fn pipe<U: Send + 'static>(
        self,
        mut process: impl FnMut(T) -> U + Send + 'static,
    ) -> Receiver<U> {
        let (sender, receiver) = channel::<U>(&self.0.executor);
        self.attach(move |value| sender.send(process(value)));
        let upstream = self.0;
        *receiver.0.upstream_ready.lock() =
            Some(Box::new(move || ChannelState::mark_ready(&upstream)));
        receiver
    }
}
