//! End-to-end behavior of chains, consumers and hubs.

use std::sync::Arc;
use std::time::Duration;

use contseq::prelude::*;
use contseq::{OperatorKind, PoolConfig, WorkerPool};
use parking_lot::Mutex;

type Log<T> = Arc<Mutex<Vec<Option<T>>>>;

fn log<T>() -> Log<T> {
    Arc::new(Mutex::new(Vec::new()))
}

fn into<T: Send + 'static>(log: &Log<T>) -> impl Fn(Option<T>) + Send + Sync + 'static {
    let log = Arc::clone(log);
    move |value| log.lock().push(value)
}

#[test]
fn deep_chain_runs_in_constant_stack() {
    let mut chain: Sequence<u64, u64> = source::<u64>();
    for _ in 0..10_000 {
        chain = chain.map(|x| x + 1);
    }
    assert_eq!(chain.len(), 10_000);

    let seen: Log<u64> = log();
    let consumer = chain.for_each(into(&seen));
    for x in 0..100 {
        consumer.push(x).unwrap();
    }
    consumer.finish().unwrap();

    let seen = seen.lock();
    assert_eq!(seen.len(), 101);
    assert_eq!(seen[0], Some(10_000));
    assert_eq!(seen[99], Some(10_099));
    assert_eq!(seen[100], None);
}

#[test]
#[ignore = "drives 10^9 stage calls; run with --ignored"]
fn deep_chain_over_long_input() {
    let mut chain: Sequence<u64, u64> = source::<u64>();
    for _ in 0..10_000 {
        chain = chain.map(|x| x + 1);
    }

    let last = Arc::new(Mutex::new(None));
    let count = Arc::new(Mutex::new(0_u64));
    let consumer = {
        let last = Arc::clone(&last);
        let count = Arc::clone(&count);
        chain.for_each(move |value| {
            if value.is_some() {
                *count.lock() += 1;
                *last.lock() = value;
            }
        })
    };
    for x in 0..100_000 {
        consumer.push(x).unwrap();
    }
    consumer.finish().unwrap();

    assert_eq!(*count.lock(), 100_000);
    assert_eq!(*last.lock(), Some(99_999 + 10_000));
}

#[test]
fn long_input_through_mixed_chain() {
    let sum = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&sum);
    let consumer = source::<u64>()
        .map(|x| x * 2)
        .filter(|x| x % 3 == 0)
        .reduce(0_u64, |acc, x| *acc += x)
        .for_each(move |total| {
            if total.is_some() {
                *sink.lock() = total;
            }
        });

    for x in 0..100_000 {
        consumer.push(x).unwrap();
    }
    consumer.finish().unwrap();

    let expected: u64 = (0..100_000_u64).map(|x| x * 2).filter(|x| x % 3 == 0).sum();
    assert_eq!(*sum.lock(), Some(expected));
}

#[test]
fn completed_consumer_rejects_input() {
    let plain = source::<u8>().for_each(|_| {});
    plain.finish().unwrap();
    assert_eq!(plain.push(1), Err(StreamError::AlreadyComplete));
    assert_eq!(plain.finish(), Err(StreamError::AlreadyComplete));

    let stopping = source::<u8>().consume(|_| Ok(Termination::Terminate));
    assert_eq!(stopping.push(1), Ok(Termination::Terminate));
    assert_eq!(stopping.push(2), Err(StreamError::AlreadyComplete));

    let batched = source::<u8>()
        .collect(Vec::new(), |acc: &mut Vec<u8>, x| acc.push(x), |acc| acc.len() == 4)
        .for_each(|_| {});
    batched.push(1).unwrap();
    batched.finish().unwrap();
    assert!(batched.is_complete());
    assert_eq!(batched.push(2), Err(StreamError::AlreadyComplete));
}

#[test]
fn failed_map_resumes_with_substitute() {
    let seen: Log<i32> = log();
    let sink = into(&seen);
    let substitute = handler(|ctx| {
        assert_eq!(ctx.op(), OperatorKind::Map);
        assert_eq!(ctx.value::<i32>(), Some(&5));
        ctx.resume(0_i32).unwrap_or_else(ErrorContext::skip)
    });
    let consumer = source::<i32>()
        .try_map(|x| if *x == 5 { Err("cannot map five") } else { Ok(*x) })
        .consume_with(substitute, move |value| {
            sink(*value);
            Ok(Termination::CanContinue)
        });

    consumer.push(5).unwrap();
    consumer.finish().unwrap();
    assert_eq!(*seen.lock(), vec![Some(0), None]);
}

#[test]
fn handler_ending_the_stream_completes_the_consumer() {
    let seen: Log<i32> = log();
    let sink = into(&seen);
    let consumer = source::<i32>()
        .try_map(|x| if *x < 0 { Err("negative") } else { Ok(*x) })
        .consume_with(handler(ErrorContext::end), move |value| {
            sink(*value);
            Ok(Termination::CanContinue)
        });

    assert_eq!(consumer.push(-1), Ok(Termination::CanContinue));
    assert!(consumer.is_complete());
    assert_eq!(consumer.push(7), Err(StreamError::AlreadyComplete));
    assert_eq!(consumer.finish(), Err(StreamError::AlreadyComplete));
    assert_eq!(*seen.lock(), vec![None]);
}

#[test]
fn unhandled_failure_drops_only_that_value() {
    let seen: Log<i32> = log();
    let consumer = source::<i32>()
        .try_map(|x| if *x == 5 { Err("cannot map five") } else { Ok(*x * 10) })
        .for_each(into(&seen));

    for x in 4..=6 {
        consumer.push(x).unwrap();
    }
    consumer.finish().unwrap();
    assert_eq!(*seen.lock(), vec![Some(40), Some(60), None]);
}

#[test]
fn failing_subscriber_is_isolated() {
    let hub = Observable::<i32>::new();
    let first: Log<i32> = log();
    let second: Log<i32> = log();

    let sink = into(&first);
    let failing = hub.listener().listen(move |value| {
        if *value == Some(3) {
            return Err("three".into());
        }
        sink(*value);
        Ok(Termination::CanContinue)
    });
    let healthy = hub.listener().for_each(into(&second));

    for x in 1..=4 {
        hub.produce(x).unwrap();
    }
    assert!(!failing.is_active());
    assert!(healthy.is_active());
    hub.finish().unwrap();

    assert_eq!(*first.lock(), vec![Some(1), Some(2)]);
    assert_eq!(
        *second.lock(),
        vec![Some(1), Some(2), Some(3), Some(4), None]
    );
}

#[test]
fn zip_emits_min_of_both_lengths() {
    let a = Observable::<u32>::new();
    let b = Observable::<u32>::new();
    let seen: Log<(u32, u32)> = log();
    zip(&a.listener(), &b.listener()).for_each(into(&seen));

    for x in 0..5 {
        a.produce(x).unwrap();
    }
    for x in 100..103 {
        b.produce(x).unwrap();
    }
    a.finish().unwrap();

    assert_eq!(
        *seen.lock(),
        vec![Some((0, 100)), Some((1, 101)), Some((2, 102)), None]
    );
    // The other source was detached when the join ended.
    assert_eq!(b.produce(103), Err(StreamError::NoSubscribers));
}

#[test]
fn combine_uses_latest_values() {
    let a = Observable::<&'static str>::new();
    let b = Observable::<u8>::new();
    let seen: Log<(&'static str, u8)> = log();
    combine(&a.listener(), &b.listener()).for_each(into(&seen));

    a.produce("first").unwrap();
    a.produce("second").unwrap();
    b.produce(1).unwrap();
    b.produce(2).unwrap();
    a.produce("third").unwrap();

    assert_eq!(
        *seen.lock(),
        vec![Some(("second", 1)), Some(("second", 2)), Some(("third", 2))]
    );
}

#[test]
fn select_merges_without_buffering() {
    let a = Observable::<u8>::new();
    let b = Observable::<u8>::new();
    let seen: Log<(Option<u8>, Option<u8>)> = log();
    select(&a.listener(), &b.listener()).for_each(into(&seen));

    b.produce(1).unwrap();
    a.produce(2).unwrap();
    a.finish().unwrap();
    b.finish().unwrap();

    assert_eq!(
        *seen.lock(),
        vec![Some((None, Some(1))), Some((Some(2), None)), None]
    );
}

#[test]
fn dispatch_to_worker_pool_delivers_everything() {
    let pool = WorkerPool::new(PoolConfig::default().with_workers(1)).expect("spawn worker");
    let (tx, rx) = crossbeam_channel::unbounded();
    let consumer = source::<u32>()
        .dispatch(pool)
        .map(|x| x + 1)
        .for_each(move |value| {
            let _ = tx.send(value);
        });

    for x in 0..10 {
        consumer.push(x).unwrap();
    }
    consumer.finish().unwrap();

    let received: Vec<Option<u32>> = (0..11)
        .map(|_| rx.recv_timeout(Duration::from_secs(5)).expect("delivered by worker"))
        .collect();
    let expected: Vec<Option<u32>> = (1..=10).map(Some).chain([None]).collect();
    assert_eq!(received, expected);
}

#[test]
fn listener_chain_operators_apply_per_subscriber() {
    let hub = Observable::<u32>::new();
    let evens: Log<u32> = log();
    let batches: Log<Vec<u32>> = log();
    hub.listener().filter(|x| x % 2 == 0).for_each(into(&evens));
    hub.listener()
        .collect(Vec::new(), |acc: &mut Vec<u32>, x| acc.push(x), |acc| acc.len() == 2)
        .for_each(into(&batches));

    for x in 1..=5 {
        hub.produce(x).unwrap();
    }
    hub.finish().unwrap();

    assert_eq!(*evens.lock(), vec![Some(2), Some(4), None]);
    assert_eq!(
        *batches.lock(),
        vec![Some(vec![1, 2]), Some(vec![3, 4]), Some(vec![5]), None]
    );
}
