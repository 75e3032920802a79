/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Classifying inputs by key and fanning them out to matching routes.

use std::sync::Arc;

use conflux::ExecutorRef;
use dupe::Dupe;
use smallvec::SmallVec;

use crate::channel::channel;
use crate::channel::Receiver;
use crate::channel::Sender;

/// The building phase of a router: routes may still be added.
///
/// `ready` freezes the table and produces the dispatching [`Router`]; route
/// registration after that point is unrepresentable.
pub struct RouterBuilder<In, K> {
    executor: ExecutorRef,
    classify: Arc<dyn Fn(&In) -> Vec<K> + Send + Sync + 'static>,
    routes: Vec<(K, Sender<In>)>,
}

impl<In, K> RouterBuilder<In, K>
where
    In: Clone + Send + 'static,
    K: Ord + Send + Sync + 'static,
{
    /// A router that classifies on `executor` with `classify`. The classifier
    /// returns the keys an input belongs to, in any order; every key with a
    /// registered route receives the input exactly once.
    pub fn new(executor: &ExecutorRef, classify: impl Fn(&In) -> Vec<K> + Send + Sync + 'static) -> Self {
        RouterBuilder {
            executor: executor.dupe(),
            classify: Arc::new(classify),
            routes: Vec::new(),
        }
    }

    /// Registers a route under `key`; the returned receiver consumes on
    /// `executor`. Keys must be distinct.
    pub fn add_route(&mut self, key: K, executor: &ExecutorRef) -> Receiver<In> {
        let (sender, receiver) = channel(executor);
        self.routes.push((key, sender));
        receiver
    }

    /// Sorts the route table, marks every route channel ready and freezes
    /// the router for dispatch.
    pub fn ready(mut self) -> Router<In, K> {
        self.routes.sort_by(|a, b| a.0.cmp(&b.0));
        debug_assert!(
            self.routes.windows(2).all(|pair| pair[0].0 != pair[1].0),
            "route keys must be distinct"
        );
        for (_, sender) in &self.routes {
            sender.mark_ready();
        }
        Router {
            inner: Arc::new(RouterInner {
                executor: self.executor,
                classify: self.classify,
                routes: self.routes,
            }),
        }
    }
}

/// The ready phase: classifies inputs and forwards each to every matching
/// route. The table is immutable, so dispatch takes no lock.
pub struct Router<In, K> {
    inner: Arc<RouterInner<In, K>>,
}

struct RouterInner<In, K> {
    executor: ExecutorRef,
    classify: Arc<dyn Fn(&In) -> Vec<K> + Send + Sync + 'static>,
    routes: Vec<(K, Sender<In>)>,
}

impl<In, K> Router<In, K>
where
    In: Clone + Send + 'static,
    K: Ord + Send + Sync + 'static,
{
    /// Submits one classification task for `input` to the router's executor.
    /// A router dropped before the task runs turns it into a no-op.
    pub fn route(&self, input: In) {
        let router = Arc::downgrade(&self.inner);
        self.inner.executor.execute_fn(move || {
            if let Some(router) = router.upgrade() {
                router.dispatch(input);
            }
        });
    }
}

impl<In, K> RouterInner<In, K>
where
    In: Clone + Send + 'static,
    K: Ord + Send + Sync + 'static,
{
    fn dispatch(&self, input: In) {
        let keys = (self.classify)(&input);
        let mut matched: SmallVec<[usize; 4]> = SmallVec::new();
        for key in &keys {
            match self.routes.binary_search_by(|(k, _)| k.cmp(key)) {
                Ok(index) => matched.push(index),
                Err(_) => tracing::trace!("input classified under a key with no route"),
            }
        }
        matched.sort_unstable();
        matched.dedup();
        for index in matched {
            self.routes[index].1.send(input.clone());
        }
    }
}

impl<In, K> Clone for Router<In, K> {
    fn clone(&self) -> Self {
        Router {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<In, K> Dupe for Router<In, K> {}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    /// The classic four-route scenario: greetings sorted by their contents.
    fn greeting_router(
        executor: &ExecutorRef,
    ) -> (Router<String, &'static str>, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut builder = RouterBuilder::new(executor, |input: &String| {
            let mut keys = Vec::new();
            if input.contains("hello") {
                keys.push("contains hello");
                // A classifier may repeat a key; the route still receives
                // the input once.
                keys.push("contains hello");
            }
            if input.contains("world") {
                keys.push("contains world");
            }
            if input == "hello world" {
                keys.push("hello world");
            }
            if keys.is_empty() {
                keys.push("default");
            }
            keys
        });
        for key in ["contains hello", "contains world", "default", "hello world"] {
            let labelled = builder
                .add_route(key, executor)
                .pipe(move |value: String| format!("{key}: {value}"));
            let sink = Arc::clone(&seen);
            labelled.attach(move |line| sink.lock().push(line));
            labelled.set_ready();
        }
        (builder.ready(), seen)
    }

    #[test]
    fn inputs_reach_every_matching_route_exactly_once() {
        let executor = ExecutorRef::immediate();
        let (router, seen) = greeting_router(&executor);
        for input in ["bob", "hello", "world", "hello world"] {
            router.route(String::from(input));
        }
        let seen = seen.lock();
        assert_eq!(
            *seen,
            vec![
                "default: bob",
                "contains hello: hello",
                "contains world: world",
                "contains hello: hello world",
                "contains world: hello world",
                "hello world: hello world",
            ]
        );
    }

    #[test]
    fn unknown_keys_are_dropped_silently() {
        let executor = ExecutorRef::immediate();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut builder =
            RouterBuilder::new(&executor, |input: &i32| vec![input % 2, 7]);
        let receiver = builder.add_route(0, &executor);
        let sink = Arc::clone(&seen);
        receiver.attach(move |value| sink.lock().push(value));
        let router = builder.ready();
        router.route(4);
        router.route(5);
        assert_eq!(*seen.lock(), vec![4]);
    }

    #[test]
    fn classifier_output_need_not_be_sorted() {
        let executor = ExecutorRef::immediate();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut builder =
            RouterBuilder::new(&executor, |_: &u8| vec!["z", "a", "m"]);
        for key in ["a", "m", "z"] {
            let receiver = builder.add_route(key, &executor);
            let sink = Arc::clone(&seen);
            receiver.attach(move |_| sink.lock().push(key));
        }
        let router = builder.ready();
        router.route(0);
        assert_eq!(*seen.lock(), vec!["a", "m", "z"]);
    }

    #[test]
    fn a_dropped_router_turns_queued_dispatch_into_a_no_op() {
        let manual = conflux::ManualExecutor::new();
        let executor = ExecutorRef::new(manual.dupe());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut builder = RouterBuilder::new(&executor, |_: &i32| vec!["only"]);
        let receiver = builder.add_route("only", &executor);
        let sink = Arc::clone(&seen);
        receiver.attach(move |value| sink.lock().push(value));
        let router = builder.ready();
        router.route(1);
        drop(router);
        manual.run_all();
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn routes_dispatch_on_runtime_executors() {
        let executor = ExecutorRef::new(conflux::TokioExecutor::current());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut builder = RouterBuilder::new(&executor, |n: &u32| vec![n % 2]);
        for key in [0u32, 1] {
            let receiver = builder.add_route(key, &executor);
            let tx = tx.clone();
            receiver.attach(move |value| {
                tx.send((key, value)).unwrap();
            });
        }
        let router = builder.ready();
        for n in 0..4u32 {
            router.route(n);
        }
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(rx.recv().await.unwrap());
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![(0, 0), (0, 2), (1, 1), (1, 3)]);
    }

    #[test]
    fn classification_and_consumption_use_their_own_executors() {
        let classify = conflux::ManualExecutor::new();
        let consume = conflux::ManualExecutor::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut builder = RouterBuilder::new(
            &ExecutorRef::new(classify.dupe()),
            |_: &i32| vec!["only"],
        );
        let receiver = builder.add_route("only", &ExecutorRef::new(consume.dupe()));
        let sink = Arc::clone(&seen);
        receiver.attach(move |value| sink.lock().push(value));
        let router = builder.ready();
        router.route(9);
        assert!(seen.lock().is_empty());
        classify.run_all();
        assert!(seen.lock().is_empty());
        consume.run_all();
        assert_eq!(*seen.lock(), vec![9]);
    }
}
