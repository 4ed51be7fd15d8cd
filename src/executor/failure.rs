//! Capturing task failures and routing the ones nobody can observe.

use super::task::TaskId;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Error type accepted from fallible task bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The task body panicked.
    Panicked,
    /// The task body returned an error.
    Errored,
}

/// Why a task did not produce its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task: TaskId,
    pub kind: FailureKind,
    pub message: String,
}

impl TaskFailure {
    pub(crate) fn from_panic(task: TaskId, payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        Self {
            task,
            kind: FailureKind::Panicked,
            message,
        }
    }

    pub(crate) fn from_error(task: TaskId, error: BoxError) -> Self {
        Self {
            task,
            kind: FailureKind::Errored,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FailureKind::Panicked => write!(f, "task {} panicked: {}", self.task, self.message),
            FailureKind::Errored => write!(f, "task {} failed: {}", self.task, self.message),
        }
    }
}

impl std::error::Error for TaskFailure {}

/// Run a task body, turning both panics and returned errors into a
/// [`TaskFailure`].
pub(crate) fn run_caught<T, F>(task: TaskId, f: F) -> Result<T, TaskFailure>
where
    F: FnOnce() -> Result<T, BoxError>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(TaskFailure::from_error(task, error)),
        Err(payload) => Err(TaskFailure::from_panic(task, payload)),
    }
}

/// Receives failures of fire-and-forget tasks.
///
/// Tasks started with `execute` have no handle, so their failures would be
/// lost without a sink. Every pool has one; the default is [`LogSink`].
pub trait FailureSink: Send + Sync {
    fn report(&self, failure: &TaskFailure);
}

impl<F> FailureSink for F
where
    F: Fn(&TaskFailure) + Send + Sync,
{
    fn report(&self, failure: &TaskFailure) {
        self(failure)
    }
}

/// Logs failures at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl FailureSink for LogSink {
    fn report(&self, failure: &TaskFailure) {
        tracing::error!(
            task = %failure.task,
            kind = ?failure.kind,
            "unobserved task failure: {}",
            failure.message
        );
    }
}
