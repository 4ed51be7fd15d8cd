pub use crate::config::{Config, ConfigBuilder, QueueFullPolicy};
pub use crate::error::{Error, Result};
pub use crate::executor::{
    is_interrupted, FailureSink, Lifecycle, TaskFailure, TaskHandle, TaskState, WorkerPool,
};
pub use crate::stats::StatsSnapshot;
