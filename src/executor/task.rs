//! Task representation and execution.

use super::failure::{run_caught, BoxError, TaskFailure};
use super::handle::Shared;
use super::interrupt::Interrupt;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Global task ID counter
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a task run ended, as seen by the worker.
#[derive(Debug)]
pub(crate) enum Completion {
    Succeeded,
    /// Failure with no handle to hold it; goes to the failure sink.
    Unobserved(TaskFailure),
    /// Failure stored in the task's handle.
    Captured,
    /// Cancelled before it started, or while running.
    Cancelled,
}

pub(crate) trait Job: Send {
    fn run(self: Box<Self>, id: TaskId) -> Completion;

    /// Called instead of `run` when the task is discarded unstarted.
    fn abandon(self: Box<Self>);
}

/// Fire-and-forget body.
pub(crate) struct Detached<F> {
    pub(crate) f: F,
}

impl<F> Job for Detached<F>
where
    F: FnOnce() -> Result<(), BoxError> + Send,
{
    fn run(self: Box<Self>, id: TaskId) -> Completion {
        match run_caught(id, self.f) {
            Ok(()) => Completion::Succeeded,
            Err(failure) => Completion::Unobserved(failure),
        }
    }

    fn abandon(self: Box<Self>) {}
}

/// Value-producing body wired to a [`TaskHandle`](super::TaskHandle).
pub(crate) struct Tracked<F, T> {
    pub(crate) f: F,
    pub(crate) shared: Arc<Shared<T>>,
}

impl<F, T> Job for Tracked<F, T>
where
    F: FnOnce() -> Result<T, BoxError> + Send,
    T: Send,
{
    fn run(self: Box<Self>, id: TaskId) -> Completion {
        let Tracked { f, shared } = *self;

        if !shared.start() {
            return Completion::Cancelled;
        }

        let result = run_caught(id, f);
        let failed = result.is_err();

        if !shared.finish(result) {
            Completion::Cancelled
        } else if failed {
            Completion::Captured
        } else {
            Completion::Succeeded
        }
    }

    fn abandon(self: Box<Self>) {
        self.shared.cancel();
    }
}

/// Internal task representation
pub(crate) struct Task {
    pub(crate) id: TaskId,
    pub(crate) interrupt: Interrupt,
    pub(crate) enqueued_at: Instant,
    job: Box<dyn Job>,
}

impl Task {
    pub fn new(id: TaskId, interrupt: Interrupt, job: Box<dyn Job>) -> Self {
        Task {
            id,
            interrupt,
            enqueued_at: Instant::now(),
            job,
        }
    }

    /// Wrap a fire-and-forget body.
    pub fn detached<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<(), BoxError> + Send + 'static,
    {
        Self::new(TaskId::next(), Interrupt::new(), Box::new(Detached { f }))
    }

    /// Execute the task
    pub fn execute(self) -> Completion {
        self.job.run(self.id)
    }

    pub fn abandon(self) {
        self.job.abandon();
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("enqueued_at", &self.enqueued_at)
            .finish()
    }
}
