use crate::executor::TaskFailure;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("task rejected: pool is not accepting work")]
    RejectedExecution,

    #[error("queue closed")]
    QueueClosed,

    #[error("queue full")]
    QueueFull,

    #[error("execution failed: {0}")]
    ExecutionFailed(TaskFailure),

    #[error("task cancelled")]
    Cancelled,

    #[error("task result already taken")]
    ResultTaken,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("config error: {0}")]
    Config(String),

    #[error("executor error: {0}")]
    Executor(String),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn executor<S: Into<String>>(msg: S) -> Self {
        Error::Executor(msg.into())
    }
}
