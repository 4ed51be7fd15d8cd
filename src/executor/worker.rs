// worker thread stuff
use super::interrupt::{self, Interrupt};
use super::pool::Inner;
use super::task::{Completion, Task, TaskId};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

pub type WorkerId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Idle,
    Running(TaskId),
    Terminated,
}

struct Slot {
    status: WorkerStatus,
    interrupt: Option<Interrupt>,
}

// per-worker status and stats
pub(crate) struct WorkerState {
    slot: Mutex<Slot>,
    pub tasks_executed: AtomicU64,
}

impl WorkerState {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                status: WorkerStatus::Idle,
                interrupt: None,
            }),
            tasks_executed: AtomicU64::new(0),
        }
    }

    pub(crate) fn status(&self) -> WorkerStatus {
        self.slot.lock().status
    }

    fn begin(&self, task: &Task) {
        let mut slot = self.slot.lock();
        slot.status = WorkerStatus::Running(task.id);
        slot.interrupt = Some(task.interrupt.clone());
    }

    fn end(&self) {
        let mut slot = self.slot.lock();
        slot.status = WorkerStatus::Idle;
        slot.interrupt = None;
    }

    fn terminate(&self) {
        let mut slot = self.slot.lock();
        slot.status = WorkerStatus::Terminated;
        slot.interrupt = None;
    }

    /// Ask the task running here, if any, to stop.
    pub(crate) fn interrupt_current(&self) {
        if let Some(interrupt) = &self.slot.lock().interrupt {
            interrupt.trigger();
        }
    }
}

pub(crate) struct Worker {
    pub id: WorkerId,
    inner: Arc<Inner>,
}

impl Worker {
    pub(crate) fn new(id: WorkerId, inner: Arc<Inner>) -> Self {
        Self { id, inner }
    }

    // main loop
    pub(crate) fn run(self) {
        debug!(worker = self.id, "worker started");

        while let Some(task) = self.inner.queue.dequeue() {
            self.execute_task(task);
        }

        if let Some(state) = self.inner.workers.get(self.id) {
            state.terminate();
        }
        debug!(worker = self.id, "worker exiting");
        self.inner.worker_exited();
    }

    fn execute_task(&self, task: Task) {
        let Some(state) = self.inner.workers.get(self.id) else {
            return;
        };

        state.begin(&task);
        if self.inner.stop_requested() {
            task.interrupt.trigger();
        }

        let tid = task.id;
        let queue_wait = task.enqueued_at.elapsed();
        let start = Instant::now();

        let completion = {
            let _current = interrupt::enter(task.interrupt.clone());
            task.execute()
        };

        let stats = &self.inner.stats;
        stats.record_run(start.elapsed(), queue_wait);

        match completion {
            Completion::Succeeded => stats.record_completed(),
            Completion::Captured => stats.record_failed(),
            Completion::Cancelled => stats.record_cancelled(),
            Completion::Unobserved(failure) => {
                stats.record_failed();
                let sink = &self.inner.sink;
                if catch_unwind(AssertUnwindSafe(|| sink.report(&failure))).is_err() {
                    error!(task = %tid, "failure sink panicked");
                }
            }
        }

        state.tasks_executed.fetch_add(1, Ordering::Relaxed);
        state.end();
    }
}
