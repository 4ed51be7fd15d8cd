//! VEDA pool - fixed-size worker pool executor
//!
//! A pool of worker threads pulling tasks from one FIFO queue, with handles
//! for task results and graceful or forced shutdown.
//!
//! # Quick Start
//!
//! ```no_run
//! use veda_pool::prelude::*;
//! use std::time::Duration;
//!
//! let pool = WorkerPool::fixed(2).unwrap();
//!
//! // Fire and forget
//! pool.execute(|| println!("hello from a worker")).unwrap();
//!
//! // Value-producing
//! let handle = pool.submit(|| 6 * 7).unwrap();
//! assert_eq!(handle.get().unwrap(), 42);
//!
//! pool.shutdown();
//! assert!(pool.await_termination(Duration::from_secs(5)));
//! ```
//!
//! # Features
//!
//! - **Fixed worker count**: set once at construction
//! - **Bounded or unbounded queue**: block or reject producers when full
//! - **Task handles**: blocking `get`, timed `get`, `is_done`, `cancel`, and
//!   `join` to move out results that are not `Clone`
//! - **Failure sink**: panics in fire-and-forget tasks are reported, never lost
//! - **Shutdown**: graceful `shutdown` or `shutdown_now` with cooperative
//!   interruption via [`is_interrupted`]

// Lint configuration
#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod queue;
pub mod stats;

// Re-export key types at crate root
pub use config::{Config, ConfigBuilder, QueueFullPolicy};
pub use error::{Error, Result};
pub use executor::{
    is_interrupted, FailureKind, FailureSink, Lifecycle, LogSink, TaskFailure, TaskHandle,
    TaskId, TaskState, WorkerPool, WorkerStatus,
};
pub use queue::TaskQueue;
pub use stats::StatsSnapshot;
