//! Task execution infrastructure.
//!
//! This module provides the worker pool, its worker threads, the handles
//! returned for submitted tasks and the failure sink for tasks that have no
//! handle.

pub mod failure;
pub mod handle;
pub mod interrupt;
pub mod pool;
pub mod task;
pub mod worker;

pub use failure::{BoxError, FailureKind, FailureSink, LogSink, TaskFailure};
pub use handle::{TaskHandle, TaskState};
pub use interrupt::{is_interrupted, Interrupt};
pub use pool::{Lifecycle, WorkerPool};
pub use task::TaskId;
pub use worker::{WorkerId, WorkerStatus};
