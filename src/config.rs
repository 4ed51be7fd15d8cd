use crate::error::{Error, Result};
use crate::executor::{FailureSink, LogSink, TaskFailure};
use std::fmt;
use std::sync::Arc;

/// What a bounded queue does when a producer finds it full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueFullPolicy {
    /// Block the producer until a worker frees a slot.
    #[default]
    Block,
    /// Fail the submission with [`Error::QueueFull`].
    Reject,
}

#[derive(Clone)]
pub struct Config {
    pub num_threads: Option<usize>,
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
    /// `None` means unbounded.
    pub queue_capacity: Option<usize>,
    pub full_policy: QueueFullPolicy,
    pub failure_sink: Arc<dyn FailureSink>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_threads: None,
            thread_name_prefix: "veda-pool-worker".to_string(),
            stack_size: Some(2 * 1024 * 1024),
            queue_capacity: None,
            full_policy: QueueFullPolicy::default(),
            failure_sink: Arc::new(LogSink),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("num_threads", &self.num_threads)
            .field("thread_name_prefix", &self.thread_name_prefix)
            .field("stack_size", &self.stack_size)
            .field("queue_capacity", &self.queue_capacity)
            .field("full_policy", &self.full_policy)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.num_threads {
            if n == 0 {
                return Err(Error::config("num_threads must be > 0"));
            }
            if n > 1024 {
                return Err(Error::config("num_threads too large (max 1024)"));
            }
        }

        if self.queue_capacity == Some(0) {
            return Err(Error::config("queue_capacity must be > 0"));
        }

        if self.thread_name_prefix.contains('\0') {
            return Err(Error::config("thread_name_prefix contains a NUL byte"));
        }

        Ok(())
    }

    pub fn worker_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get)
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn num_threads(mut self, n: usize) -> Self {
        self.config.num_threads = Some(n);
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = Some(capacity);
        self
    }

    pub fn full_policy(mut self, policy: QueueFullPolicy) -> Self {
        self.config.full_policy = policy;
        self
    }

    pub fn failure_sink<S: FailureSink + 'static>(mut self, sink: S) -> Self {
        self.config.failure_sink = Arc::new(sink);
        self
    }

    /// Shorthand for a closure sink.
    pub fn on_failure<F>(self, f: F) -> Self
    where
        F: Fn(&TaskFailure) + Send + Sync + 'static,
    {
        self.failure_sink(f)
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
