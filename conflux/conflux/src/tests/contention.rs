/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Behaviour under real thread interleavings: registration racing
//! resolution, many producers, many observers.

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Barrier;
use std::thread;

use dupe::Dupe;

use crate::executor::ExecutorRef;
use crate::package;
use crate::tests::support::CountingExecutor;
use crate::when_all;

#[test]
fn continuations_racing_the_producer_run_exactly_once_each() {
    const OBSERVERS: usize = 8;

    let counting = CountingExecutor::default();
    let continuation_executor = ExecutorRef::new(counting.dupe());
    let executor = ExecutorRef::immediate();
    let (task, future) = package(&executor, |()| 17);
    let ran = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(OBSERVERS + 1));

    let mut observers = Vec::new();
    for _ in 0..OBSERVERS {
        let future = future.clone();
        let continuation_executor = continuation_executor.dupe();
        let ran = Arc::clone(&ran);
        let barrier = Arc::clone(&barrier);
        observers.push(thread::spawn(move || {
            barrier.wait();
            future
                .map_on(&continuation_executor, move |n| {
                    assert_eq!(n, 17);
                    ran.fetch_add(1, Ordering::SeqCst);
                })
                .detach();
        }));
    }
    let producer = thread::spawn(move || {
        barrier.wait();
        task.run(());
    });

    for observer in observers {
        observer.join().unwrap();
    }
    producer.join().unwrap();

    assert_eq!(ran.load(Ordering::SeqCst), OBSERVERS);
    assert_eq!(counting.submissions(), OBSERVERS);
}

#[test]
fn a_join_fed_from_many_threads_loses_nothing() {
    const PRODUCERS: usize = 16;

    let executor = ExecutorRef::immediate();
    let mut tasks = Vec::new();
    let mut inputs = Vec::new();
    for n in 0..PRODUCERS {
        let (task, future) = package(&executor, move |()| n);
        tasks.push(task);
        inputs.push(future);
    }
    let joined = when_all(&executor, |values| values.into_iter().sum::<usize>(), inputs);

    let barrier = Arc::new(Barrier::new(PRODUCERS));
    let producers: Vec<_> = tasks
        .into_iter()
        .map(|task| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                task.run(());
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    assert_eq!(joined.try_get().unwrap(), Some((0..PRODUCERS).sum()));
}

#[test]
fn every_observer_of_a_shared_value_reads_the_same_value() {
    const OBSERVERS: usize = 8;

    let executor = ExecutorRef::immediate();
    let (task, future) = package(&executor, |()| vec![1, 2, 3]);
    let barrier = Arc::new(Barrier::new(OBSERVERS + 1));

    let observers: Vec<_> = (0..OBSERVERS)
        .map(|_| {
            let future = future.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                loop {
                    match future.try_get().unwrap() {
                        Some(value) => break value,
                        None => thread::yield_now(),
                    }
                }
            })
        })
        .collect();
    let producer = thread::spawn(move || {
        barrier.wait();
        task.run(());
    });

    for observer in observers {
        assert_eq!(observer.join().unwrap(), vec![1, 2, 3]);
    }
    producer.join().unwrap();
}

#[test]
fn abandonment_races_are_either_a_value_or_a_clean_elision() {
    // The observer may drop its handle at any point around resolution; the
    // producing side must treat both outcomes cleanly, never panic.
    for _ in 0..64 {
        let executor = ExecutorRef::immediate();
        let (task, future) = package(&executor, |()| 5);
        let barrier = Arc::new(Barrier::new(2));
        let drop_barrier = Arc::clone(&barrier);
        let dropper = thread::spawn(move || {
            drop_barrier.wait();
            drop(future);
        });
        barrier.wait();
        task.run(());
        dropper.join().unwrap();
    }
}
