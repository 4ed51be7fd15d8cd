use super::failure::{BoxError, FailureSink};
use super::handle::{Shared, TaskHandle};
use super::interrupt::Interrupt;
use super::task::{Task, TaskId, Tracked};
use super::worker::{Worker, WorkerState, WorkerStatus};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::queue::TaskQueue;
use crate::stats::{PoolStats, StatsSnapshot};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Pool lifecycle. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Lifecycle {
    Running,
    ShuttingDown,
    Terminated,
}

struct Control {
    lifecycle: Lifecycle,
    live_workers: usize,
}

pub(crate) struct Inner {
    pub(crate) queue: TaskQueue<Task>,
    pub(crate) workers: Vec<WorkerState>,
    pub(crate) sink: Arc<dyn FailureSink>,
    pub(crate) stats: PoolStats,
    control: Mutex<Control>,
    terminated: Condvar,
    stop_requested: AtomicBool,
}

impl Inner {
    pub(crate) fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    fn lifecycle(&self) -> Lifecycle {
        self.control.lock().lifecycle
    }

    pub(crate) fn worker_exited(&self) {
        let mut control = self.control.lock();
        control.live_workers = control.live_workers.saturating_sub(1);
        self.try_terminate(&mut control);
    }

    fn try_terminate(&self, control: &mut Control) {
        if control.lifecycle == Lifecycle::ShuttingDown && control.live_workers == 0 {
            control.lifecycle = Lifecycle::Terminated;
            debug!("pool terminated");
            self.terminated.notify_all();
        }
    }
}

/// Fixed-size pool of worker threads sharing one FIFO queue.
///
/// The number of workers is set at construction and never changes. Dropping
/// the pool shuts it down and joins the workers, so queued work still runs.
pub struct WorkerPool {
    inner: Arc<Inner>,
    threads: Vec<JoinHandle<()>>,
    num_threads: usize,
}

impl WorkerPool {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let num_threads = config.worker_threads();
        if num_threads == 0 {
            return Err(Error::config("need at least 1 thread"));
        }

        let inner = Arc::new(Inner {
            queue: TaskQueue::with_capacity(config.queue_capacity, config.full_policy),
            workers: (0..num_threads).map(|_| WorkerState::new()).collect(),
            sink: config.failure_sink.clone(),
            stats: PoolStats::new(),
            control: Mutex::new(Control {
                lifecycle: Lifecycle::Running,
                live_workers: 0,
            }),
            terminated: Condvar::new(),
            stop_requested: AtomicBool::new(false),
        });

        let mut pool = Self {
            inner,
            threads: Vec::with_capacity(num_threads),
            num_threads,
        };

        for id in 0..num_threads {
            let name = format!("{}-{}", config.thread_name_prefix, id);
            let mut builder = thread::Builder::new().name(name);

            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            pool.inner.control.lock().live_workers += 1;

            let worker = Worker::new(id, pool.inner.clone());
            match builder.spawn(move || worker.run()) {
                Ok(thread) => pool.threads.push(thread),
                Err(e) => {
                    pool.inner.control.lock().live_workers -= 1;
                    // dropping the partial pool shuts it down and joins what started
                    drop(pool);
                    return Err(Error::executor(format!("spawn failed: {}", e)));
                }
            }
        }

        debug!(threads = num_threads, "pool started");
        Ok(pool)
    }

    /// Pool with `n` workers and default settings.
    pub fn fixed(n: usize) -> Result<Self> {
        Self::new(Config::builder().num_threads(n).build()?)
    }

    pub fn single_thread() -> Result<Self> {
        Self::fixed(1)
    }

    /// Queue a fire-and-forget task.
    ///
    /// A panic inside `f` goes to the pool's failure sink; the worker keeps
    /// running.
    pub fn execute<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.dispatch(Task::detached(move || {
            f();
            Ok(())
        }))
    }

    /// Like [`execute`](Self::execute) for bodies that return a `Result`; an
    /// `Err` is reported to the failure sink.
    pub fn execute_fallible<F, E>(&self, f: F) -> Result<()>
    where
        F: FnOnce() -> std::result::Result<(), E> + Send + 'static,
        E: Into<BoxError>,
    {
        self.dispatch(Task::detached(move || f().map_err(Into::into)))
    }

    /// Queue a value-producing task and return its handle.
    pub fn submit<F, T>(&self, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.submit_fallible(move || Ok::<T, BoxError>(f()))
    }

    /// Like [`submit`](Self::submit) for bodies that return a `Result`; an
    /// `Err` surfaces as [`Error::ExecutionFailed`] from the handle.
    pub fn submit_fallible<F, T, E>(&self, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<BoxError>,
    {
        let id = TaskId::next();
        let interrupt = Interrupt::new();
        let shared = Arc::new(Shared::new(id, interrupt.clone()));

        let job = Tracked {
            f: move || -> std::result::Result<T, BoxError> { f().map_err(Into::into) },
            shared: shared.clone(),
        };

        self.dispatch(Task::new(id, interrupt, Box::new(job)))?;
        Ok(TaskHandle::new(shared))
    }

    /// Submit every task, wait until all are done, and return the handles in
    /// submission order.
    ///
    /// If a submission is rejected, the tasks already submitted are cancelled
    /// and the rejection is returned. Calling this from a worker of the same
    /// pool can deadlock when every worker ends up waiting.
    pub fn invoke_all<I, F, T>(&self, tasks: I) -> Result<Vec<TaskHandle<T>>>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let mut handles = Vec::new();

        for f in tasks {
            match self.submit(f) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    for handle in &handles {
                        handle.cancel();
                    }
                    return Err(e);
                }
            }
        }

        for handle in &handles {
            handle.wait();
        }
        Ok(handles)
    }

    fn dispatch(&self, task: Task) -> Result<()> {
        if self.inner.lifecycle() != Lifecycle::Running {
            return Err(self.reject(Error::RejectedExecution));
        }

        match self.inner.queue.enqueue(task) {
            Ok(()) => {
                self.inner.stats.record_submitted();
                Ok(())
            }
            Err(Error::QueueClosed) => Err(self.reject(Error::RejectedExecution)),
            Err(e) => Err(self.reject(e)),
        }
    }

    fn reject(&self, error: Error) -> Error {
        self.inner.stats.record_rejected();
        warn!(error = %error, "task not queued");
        error
    }

    /// Stop accepting work. Queued and running tasks still complete.
    ///
    /// Returns immediately; use [`await_termination`](Self::await_termination)
    /// to wait. Calling it again has no further effect.
    pub fn shutdown(&self) {
        let mut control = self.inner.control.lock();
        if control.lifecycle == Lifecycle::Running {
            control.lifecycle = Lifecycle::ShuttingDown;
            debug!("pool shutting down");
        }
        self.inner.queue.seal();
        self.inner.try_terminate(&mut control);
    }

    /// Stop accepting work, discard queued tasks and ask running ones to
    /// stop.
    ///
    /// Handles of discarded tasks become cancelled. Running tasks only stop
    /// if they check [`is_interrupted`](crate::is_interrupted). Returns how
    /// many queued tasks were discarded.
    pub fn shutdown_now(&self) -> usize {
        self.inner.stop_requested.store(true, Ordering::SeqCst);
        self.shutdown();

        let discarded = self.inner.queue.drain();
        let count = discarded.len();
        for task in discarded {
            task.abandon();
            self.inner.stats.record_cancelled();
        }

        for worker in &self.inner.workers {
            worker.interrupt_current();
        }

        if count > 0 {
            debug!(discarded = count, "discarded queued tasks");
        }
        count
    }

    /// Block until the pool is terminated or `timeout` elapses. Returns
    /// whether termination was observed.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut control = self.inner.control.lock();

        while control.lifecycle != Lifecycle::Terminated {
            match deadline {
                Some(deadline) => {
                    if self.inner.terminated.wait_until(&mut control, deadline).timed_out() {
                        return control.lifecycle == Lifecycle::Terminated;
                    }
                }
                None => self.inner.terminated.wait(&mut control),
            }
        }
        true
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.lifecycle()
    }

    pub fn is_shutdown(&self) -> bool {
        self.lifecycle() != Lifecycle::Running
    }

    pub fn is_terminated(&self) -> bool {
        self.lifecycle() == Lifecycle::Terminated
    }

    /// Workers currently running a task.
    pub fn active_count(&self) -> usize {
        self.inner
            .workers
            .iter()
            .filter(|w| matches!(w.status(), WorkerStatus::Running(_)))
            .count()
    }

    /// Tasks waiting in the queue.
    pub fn queued_count(&self) -> usize {
        self.inner.queue.len()
    }

    pub fn worker_statuses(&self) -> Vec<WorkerStatus> {
        self.inner.workers.iter().map(WorkerState::status).collect()
    }

    /// Tasks each worker has run, indexed by worker id.
    pub fn tasks_per_worker(&self) -> Vec<u64> {
        self.inner
            .workers
            .iter()
            .map(|w| w.tasks_executed.load(Ordering::Relaxed))
            .collect()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("num_threads", &self.num_threads)
            .field("lifecycle", &self.lifecycle())
            .field("queued", &self.queued_count())
            .finish()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();

        let current = thread::current().id();
        for thread in self.threads.drain(..) {
            // a task may drop the last reference to its own pool
            if thread.thread().id() != current {
                let _ = thread.join();
            }
        }
    }
}
