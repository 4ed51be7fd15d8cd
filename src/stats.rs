//! Task counters and run-time distribution for a pool.

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

// One hour in nanoseconds
const MAX_TRACKED_NS: u64 = 3_600_000_000_000;

/// Pool statistics collector
#[derive(Debug)]
pub struct PoolStats {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    rejected: AtomicU64,

    busy_time_ns: AtomicU64,
    queue_wait_ns: AtomicU64,

    // None only if the histogram could not be allocated
    run_time: Option<Mutex<Histogram<u64>>>,

    start_time: Instant,
}

impl PoolStats {
    pub fn new() -> Self {
        let run_time = Histogram::new_with_max(MAX_TRACKED_NS, 3).ok().map(Mutex::new);

        Self {
            submitted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            busy_time_ns: AtomicU64::new(0),
            queue_wait_ns: AtomicU64::new(0),
            run_time,
            start_time: Instant::now(),
        }
    }

    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one task run and how long it sat in the queue first.
    pub fn record_run(&self, run: Duration, queue_wait: Duration) {
        let run_ns = saturating_nanos(run);
        self.busy_time_ns.fetch_add(run_ns, Ordering::Relaxed);
        self.queue_wait_ns
            .fetch_add(saturating_nanos(queue_wait), Ordering::Relaxed);

        if let Some(hist) = &self.run_time {
            hist.lock().saturating_record(run_ns);
        }
    }

    /// Get a snapshot of current stats
    pub fn snapshot(&self) -> StatsSnapshot {
        let (mean, p50, p99, max) = match &self.run_time {
            Some(hist) => {
                let hist = hist.lock();
                if hist.len() == 0 {
                    (0, 0, 0, 0)
                } else {
                    (
                        hist.mean() as u64,
                        hist.value_at_quantile(0.50),
                        hist.value_at_quantile(0.99),
                        hist.max(),
                    )
                }
            }
            None => (0, 0, 0, 0),
        };

        StatsSnapshot {
            uptime: self.start_time.elapsed(),
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            busy_time_ns: self.busy_time_ns.load(Ordering::Relaxed),
            queue_wait_ns: self.queue_wait_ns.load(Ordering::Relaxed),
            mean_run_ns: mean,
            p50_run_ns: p50,
            p99_run_ns: p99,
            max_run_ns: max,
        }
    }
}

impl Default for PoolStats {
    fn default() -> Self {
        Self::new()
    }
}

fn saturating_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Snapshot of pool stats at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub uptime: Duration,
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub rejected: u64,
    pub busy_time_ns: u64,
    pub queue_wait_ns: u64,
    pub mean_run_ns: u64,
    pub p50_run_ns: u64,
    pub p99_run_ns: u64,
    pub max_run_ns: u64,
}

impl StatsSnapshot {
    /// Tasks that reached a final state.
    pub fn finished(&self) -> u64 {
        self.completed + self.failed + self.cancelled
    }

    /// Finished tasks per second of uptime
    pub fn throughput(&self) -> f64 {
        let seconds = self.uptime.as_secs_f64();
        if seconds == 0.0 {
            return 0.0;
        }
        self.finished() as f64 / seconds
    }
}
