/*!
 * MPSC Stack Tests
 * Many producers, one consumer: every pushed value comes out exactly once
 */

use hazard_sync::mpsc_stack;
use hazard_sync::MpscStack;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::HashSet;
use std::thread;

#[test]
fn test_eight_producers_single_consumer() {
    let (producer, mut consumer) = mpsc_stack::channel::<u64>();

    let handles: Vec<_> = (0..8u64)
        .map(|t| {
            let producer = producer.clone();
            thread::spawn(move || {
                for i in 0..1000 {
                    producer.push((t << 32) | i);
                }
            })
        })
        .collect();
    drop(producer);

    let mut seen = HashSet::new();
    while seen.len() < 8000 {
        match consumer.pop() {
            Some(value) => assert!(seen.insert(value), "duplicate value {value:#x}"),
            None => std::hint::spin_loop(),
        }
    }

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(consumer.pop().is_none());
    assert_eq!(seen.len(), 8000);

    for t in 0..8u64 {
        for i in 0..1000 {
            assert!(seen.contains(&((t << 32) | i)));
        }
    }
}

#[test]
fn test_consumer_on_other_thread() {
    let (producer, mut consumer) = mpsc_stack::channel::<usize>();

    let collector = thread::spawn(move || {
        let mut total = 0;
        let mut count = 0;
        while count < 4000 {
            consumer.dequeue_all(|v| {
                total += v;
                count += 1;
            });
        }
        total
    });

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let producer = producer.clone();
            thread::spawn(move || {
                for i in 0..1000 {
                    producer.push(i);
                }
            })
        })
        .collect();

    for writer in writers {
        writer.join().unwrap();
    }
    assert_eq!(collector.join().unwrap(), 4 * (999 * 1000 / 2));
}

#[test]
fn test_single_thread_is_lifo() {
    let mut stack = MpscStack::new();
    for i in 0..5 {
        stack.push(i);
    }
    let popped: Vec<_> = std::iter::from_fn(|| stack.pop_mut()).collect();
    assert_eq!(popped, vec![4, 3, 2, 1, 0]);
}

proptest! {
    #[test]
    fn prop_drain_returns_pushed_multiset(values in prop::collection::vec(any::<u16>(), 0..200)) {
        let (producer, mut consumer) = mpsc_stack::channel();
        for v in &values {
            producer.push(*v);
        }

        let mut drained: Vec<u16> = consumer.drain().collect();
        let mut expected = values.clone();
        drained.sort_unstable();
        expected.sort_unstable();
        prop_assert_eq!(drained, expected);
        prop_assert!(consumer.is_empty());
    }
}
