use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use veda_pool::prelude::*;

const LONG: Duration = Duration::from_secs(10);

fn pool_with_sink(threads: usize) -> (WorkerPool, Arc<Mutex<Vec<TaskFailure>>>) {
    let failures = Arc::new(Mutex::new(Vec::new()));
    let config = Config::builder()
        .num_threads(threads)
        .on_failure({
            let failures = failures.clone();
            move |f: &TaskFailure| failures.lock().push(f.clone())
        })
        .build()
        .unwrap();

    (WorkerPool::new(config).unwrap(), failures)
}

#[test]
fn test_all_executed_tasks_run_exactly_once() {
    let pool = WorkerPool::fixed(4).unwrap();
    let runs: Arc<Vec<AtomicUsize>> = Arc::new((0..200).map(|_| AtomicUsize::new(0)).collect());

    for i in 0..200 {
        let runs = runs.clone();
        pool.execute(move || {
            runs[i].fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    pool.shutdown();
    assert!(pool.await_termination(LONG));
    assert!(runs.iter().all(|r| r.load(Ordering::SeqCst) == 1));
}

#[test]
fn test_failing_submit_yields_execution_failed() {
    let pool = WorkerPool::fixed(2).unwrap();

    let handle = pool
        .submit(|| {
            let value = 3;
            if value == 3 {
                panic!("deliberate failure");
            }
            value.to_string()
        })
        .unwrap();

    match handle.get() {
        Err(Error::ExecutionFailed(failure)) => {
            assert_eq!(failure.task, handle.id());
            assert!(failure.message.contains("deliberate failure"));
        }
        other => panic!("expected ExecutionFailed, got {:?}", other),
    }
    assert_eq!(handle.state(), TaskState::Failed);
}

#[test]
fn test_submit_fallible_error_surfaces() {
    let pool = WorkerPool::single_thread().unwrap();

    let handle = pool
        .submit_fallible(|| "not a number".parse::<i32>())
        .unwrap();

    assert!(matches!(handle.get(), Err(Error::ExecutionFailed(_))));
}

#[test]
fn test_single_worker_runs_in_submission_order() {
    let pool = WorkerPool::single_thread().unwrap();
    let (tx, rx) = crossbeam_channel::unbounded();

    for i in 0..10 {
        let tx = tx.clone();
        pool.execute(move || {
            let start = Instant::now();
            thread::sleep(Duration::from_millis(2));
            tx.send((i, start, Instant::now())).unwrap();
        })
        .unwrap();
    }
    drop(tx);

    pool.shutdown();
    assert!(pool.await_termination(LONG));

    let events: Vec<_> = rx.iter().collect();
    let order: Vec<i32> = events.iter().map(|(i, _, _)| *i).collect();
    assert_eq!(order, (0..10).collect::<Vec<_>>());

    for pair in events.windows(2) {
        let (_, _, prev_end) = pair[0];
        let (_, next_start, _) = pair[1];
        assert!(next_start >= prev_end);
    }
}

#[test]
fn test_await_termination_false_when_work_outlasts_timeout() {
    let pool = WorkerPool::single_thread().unwrap();
    pool.execute(|| thread::sleep(Duration::from_millis(300)))
        .unwrap();

    pool.shutdown();
    assert!(!pool.await_termination(Duration::from_millis(20)));
    assert_eq!(pool.lifecycle(), Lifecycle::ShuttingDown);

    assert!(pool.await_termination(LONG));
    assert_eq!(pool.lifecycle(), Lifecycle::Terminated);
}

#[test]
fn test_shutdown_is_idempotent() {
    let pool = WorkerPool::fixed(2).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        let counter = counter.clone();
        pool.execute(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    pool.shutdown();
    pool.shutdown();

    assert!(matches!(pool.execute(|| {}), Err(Error::RejectedExecution)));
    assert!(matches!(pool.submit(|| 0), Err(Error::RejectedExecution)));

    assert!(pool.await_termination(LONG));
    pool.shutdown();
    assert!(pool.is_terminated());
    assert_eq!(counter.load(Ordering::SeqCst), 5);
}

#[test]
fn test_two_workers_one_failing_value() {
    let (pool, failures) = pool_with_sink(2);
    let completed = Arc::new(Mutex::new(Vec::new()));

    for value in [1, 2, 3, 4, 5] {
        let completed = completed.clone();
        pool.execute(move || {
            if value == 3 {
                panic!("value {} rejected", value);
            }
            completed.lock().push(value);
        })
        .unwrap();
    }

    pool.shutdown();
    assert!(pool.await_termination(LONG));
    assert!(pool.is_terminated());

    let mut done = completed.lock().clone();
    done.sort();
    assert_eq!(done, vec![1, 2, 4, 5]);

    let failures = failures.lock();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].message, "value 3 rejected");

    let stats = pool.stats();
    assert_eq!(stats.completed, 4);
    assert_eq!(stats.failed, 1);
}

#[test]
fn test_shutdown_now_cancels_queued_handles() {
    let pool = WorkerPool::single_thread().unwrap();
    let (started_tx, started_rx) = crossbeam_channel::bounded(1);

    let running = pool
        .submit(move || {
            started_tx.send(()).unwrap();
            let deadline = Instant::now() + Duration::from_secs(5);
            while !is_interrupted() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(1));
            }
            is_interrupted()
        })
        .unwrap();

    started_rx.recv_timeout(LONG).unwrap();

    let queued_a = pool.submit(|| 1).unwrap();
    let queued_b = pool.submit(|| 2).unwrap();

    assert_eq!(pool.shutdown_now(), 2);

    assert!(matches!(queued_a.get(), Err(Error::Cancelled)));
    assert!(matches!(queued_b.get(), Err(Error::Cancelled)));

    assert!(pool.await_termination(LONG));
    assert!(pool.is_terminated());

    // the running task saw the interrupt and returned normally
    assert!(running.get().unwrap());
    assert_eq!(pool.stats().cancelled, 2);
}

#[test]
fn test_get_timeout_leaves_task_running() {
    let pool = WorkerPool::single_thread().unwrap();
    let handle = pool
        .submit(|| {
            thread::sleep(Duration::from_millis(100));
            "slow"
        })
        .unwrap();

    assert!(matches!(
        handle.get_timeout(Duration::from_millis(5)),
        Err(Error::Timeout(_))
    ));
    assert!(!handle.is_done());

    assert_eq!(handle.get_timeout(LONG).unwrap(), "slow");
    assert!(handle.is_done());
}

#[test]
fn test_cancel_pending_task_never_runs() {
    let pool = WorkerPool::single_thread().unwrap();
    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
    let ran = Arc::new(AtomicUsize::new(0));

    pool.execute(move || {
        let _ = release_rx.recv();
    })
    .unwrap();

    let handle = {
        let ran = ran.clone();
        pool.submit(move || ran.fetch_add(1, Ordering::SeqCst))
            .unwrap()
    };
    assert!(handle.cancel());
    release_tx.send(()).unwrap();

    pool.shutdown();
    assert!(pool.await_termination(LONG));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert!(handle.is_cancelled());
}

#[test]
fn test_bounded_queue_rejects_when_full() {
    let config = Config::builder()
        .num_threads(1)
        .queue_capacity(1)
        .full_policy(QueueFullPolicy::Reject)
        .build()
        .unwrap();
    let pool = WorkerPool::new(config).unwrap();

    let (started_tx, started_rx) = crossbeam_channel::bounded(1);
    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);

    pool.execute(move || {
        started_tx.send(()).unwrap();
        let _ = release_rx.recv();
    })
    .unwrap();
    started_rx.recv_timeout(LONG).unwrap();

    pool.execute(|| {}).unwrap();
    assert!(matches!(pool.execute(|| {}), Err(Error::QueueFull)));
    assert_eq!(pool.queued_count(), 1);
    assert_eq!(pool.active_count(), 1);

    release_tx.send(()).unwrap();
    pool.shutdown();
    assert!(pool.await_termination(LONG));
    assert_eq!(pool.stats().rejected, 1);
}

#[test]
fn test_invoke_all_returns_handles_in_order() {
    let pool = WorkerPool::fixed(3).unwrap();

    let tasks: Vec<_> = ["123", "2323", "3434"]
        .into_iter()
        .map(|s| move || s.len())
        .collect();

    let handles = pool.invoke_all(tasks).unwrap();
    assert!(handles.iter().all(TaskHandle::is_done));

    let lengths: Vec<usize> = handles.iter().map(|h| h.get().unwrap()).collect();
    assert_eq!(lengths, vec![3, 4, 4]);
}

#[test]
fn test_worker_survives_panics() {
    let pool = WorkerPool::single_thread().unwrap();

    for _ in 0..3 {
        pool.execute(|| panic!("boom")).unwrap();
    }
    let handle = pool.submit(|| "still alive").unwrap();

    assert_eq!(handle.get().unwrap(), "still alive");

    pool.shutdown();
    assert!(pool.await_termination(LONG));
    assert_eq!(pool.tasks_per_worker(), vec![4]);
}

#[test]
fn test_is_done_transitions() {
    let pool = WorkerPool::fixed(2).unwrap();

    for value in [1, 2, 4, 5] {
        let handle = pool.submit(move || value.to_string()).unwrap();
        assert_eq!(handle.get().unwrap(), value.to_string());
        assert!(handle.is_done());
    }
}

#[test]
fn test_join_returns_non_clone_value() {
    let pool = WorkerPool::fixed(2).unwrap();

    let handle = pool
        .submit(|| {
            let (tx, rx) = crossbeam_channel::unbounded();
            tx.send("from worker").unwrap();
            (rx, std::sync::Mutex::new(7))
        })
        .unwrap();
    let observer = handle.clone();

    let (rx, cell) = handle.join().unwrap();
    assert_eq!(rx.recv().unwrap(), "from worker");
    assert_eq!(*cell.lock().unwrap(), 7);

    assert!(observer.is_done());
    assert!(matches!(
        observer.join_timeout(LONG),
        Err(Error::ResultTaken)
    ));
}

#[test]
fn test_blocked_producer_rejected_on_shutdown() {
    let config = Config::builder()
        .num_threads(1)
        .queue_capacity(1)
        .full_policy(QueueFullPolicy::Block)
        .build()
        .unwrap();
    let pool = Arc::new(WorkerPool::new(config).unwrap());

    let (started_tx, started_rx) = crossbeam_channel::bounded(1);
    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);

    pool.execute(move || {
        started_tx.send(()).unwrap();
        let _ = release_rx.recv();
    })
    .unwrap();
    started_rx.recv_timeout(LONG).unwrap();

    // fills the queue
    pool.execute(|| {}).unwrap();
    assert_eq!(pool.queued_count(), 1);

    let producer = {
        let pool = pool.clone();
        thread::spawn(move || pool.execute(|| {}))
    };
    thread::sleep(Duration::from_millis(50));
    assert!(!producer.is_finished());

    pool.shutdown();
    assert!(matches!(
        producer.join().unwrap(),
        Err(Error::RejectedExecution)
    ));

    release_tx.send(()).unwrap();
    assert!(pool.await_termination(LONG));
    assert_eq!(pool.stats().rejected, 1);
    assert_eq!(pool.stats().completed, 2);
}

#[test]
fn test_pool_dropped_from_own_worker() {
    let pool = Arc::new(WorkerPool::single_thread().unwrap());
    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
    let (done_tx, done_rx) = crossbeam_channel::bounded(1);

    let last_ref = pool.clone();
    pool.execute(move || {
        let _ = release_rx.recv();
        // the only remaining reference; dropping it shuts the pool down here
        drop(last_ref);
        done_tx.send(thread::current().name().map(str::to_string)).unwrap();
    })
    .unwrap();

    drop(pool);
    release_tx.send(()).unwrap();

    let name = done_rx.recv_timeout(LONG).unwrap();
    assert_eq!(name.as_deref(), Some("veda-pool-worker-0"));
}
