//! Two-worker pool running fire-and-forget and value-producing tasks, one of
//! which fails on purpose.
//!
//! Run with `RUST_LOG=debug cargo run --example fixed_pool` to see the pool's
//! lifecycle events.

use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use veda_pool::prelude::*;

fn main() -> veda_pool::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .compact()
        .init();

    println!("=== execute ===\n");
    let pool = WorkerPool::fixed(2)?;
    for value in [1, 2, 3, 4, 5] {
        pool.execute(move || {
            if value == 3 {
                panic!("value {} is not allowed", value);
            }
            println!("task{} done", value);
        })?;
    }
    pool.shutdown();
    pool.await_termination(Duration::from_secs(5));

    println!("\n=== submit ===\n");
    let pool = WorkerPool::fixed(2)?;
    for value in [1, 2, 4, 5] {
        let handle = pool.submit(move || {
            let sum: u64 = (0..300_000u64).sum();
            format!("task{} -> {}", value, sum)
        })?;
        println!("isDone: {}", handle.is_done());
        println!("result: {}", handle.get()?);
        println!("isDone: {}", handle.is_done());
    }

    let slow = pool.submit(|| {
        thread::sleep(Duration::from_millis(500));
        "slow"
    })?;
    match slow.get_timeout(Duration::from_millis(200)) {
        Err(Error::Timeout(waited)) => println!("gave up after {:?}, task still running", waited),
        other => println!("unexpected: {:?}", other),
    }

    pool.shutdown();
    pool.await_termination(Duration::from_secs(5));

    let stats = pool.stats();
    println!(
        "\ncompleted={} failed={} p99={}ns",
        stats.completed, stats.failed, stats.p99_run_ns
    );

    println!("\n=== Example Complete ===");
    Ok(())
}
