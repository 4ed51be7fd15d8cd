//! Stress tests for the worker pool

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use veda_pool::prelude::*;

const LONG: Duration = Duration::from_secs(60);

#[test]
#[ignore] // Run with --ignored flag
fn stress_test_many_small_tasks() {
    let pool = WorkerPool::fixed(8).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..100_000 {
        let counter = counter.clone();
        pool.execute(move || {
            counter.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();
    }

    pool.shutdown();
    assert!(pool.await_termination(LONG));
    assert_eq!(counter.load(Ordering::Relaxed), 100_000);
}

#[test]
#[ignore]
fn stress_test_concurrent_submitters() {
    let pool = Arc::new(WorkerPool::fixed(4).unwrap());

    let submitters: Vec<_> = (0..8)
        .map(|s| {
            let pool = pool.clone();
            thread::spawn(move || {
                let handles: Vec<_> = (0..1000)
                    .map(|i| pool.submit(move || s * 1000 + i).unwrap())
                    .collect();
                handles
                    .into_iter()
                    .map(|h| h.get().unwrap())
                    .sum::<usize>()
            })
        })
        .collect();

    let total: usize = submitters.into_iter().map(|t| t.join().unwrap()).sum();
    assert_eq!(total, (0..8000).sum::<usize>());
}

#[test]
#[ignore]
fn stress_test_panic_recovery() {
    let pool = WorkerPool::fixed(4).unwrap();

    // Mix of panicking and non-panicking tasks
    let handles: Vec<_> = (0..1000)
        .map(|i| {
            pool.submit(move || {
                if i % 10 == 0 {
                    panic!("Intentional panic");
                }
                i
            })
            .unwrap()
        })
        .collect();

    let failed = handles.iter().filter(|h| h.get().is_err()).count();
    assert_eq!(failed, 100);

    // Pool should still work after panics
    assert_eq!(pool.submit(|| 4950).unwrap().get().unwrap(), 4950);
}

#[test]
#[ignore]
fn stress_test_high_contention() {
    let pool = WorkerPool::fixed(8).unwrap();
    let data = Arc::new(Mutex::new(vec![0i32; 100]));

    for _ in 0..1000 {
        let data = data.clone();
        pool.execute(move || {
            let mut guard = data.lock();
            for item in guard.iter_mut() {
                *item += 1;
            }
        })
        .unwrap();
    }

    pool.shutdown();
    assert!(pool.await_termination(LONG));
    assert!(data.lock().iter().all(|&x| x == 1000));
}

#[test]
#[ignore]
fn stress_test_shutdown_now_under_load() {
    for iteration in 0..50 {
        let pool = WorkerPool::fixed(4).unwrap();
        let handles: Vec<_> = (0..500)
            .map(|_| {
                pool.submit(|| thread::sleep(Duration::from_micros(50)))
                    .unwrap()
            })
            .collect();

        pool.shutdown_now();
        assert!(pool.await_termination(LONG), "iteration {}", iteration);

        // every handle reached a final state, none was lost
        assert!(handles.iter().all(|h| h.is_done()), "iteration {}", iteration);
    }
}
