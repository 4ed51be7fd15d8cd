//! Handles to the eventual outcome of submitted tasks.

use super::failure::TaskFailure;
use super::interrupt::Interrupt;
use super::task::TaskId;
use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_done(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }
}

enum Outcome<T> {
    Pending,
    Running,
    // None once a joiner has taken the value
    Completed(Option<T>),
    Failed(TaskFailure),
    Cancelled,
}

impl<T> Outcome<T> {
    fn state(&self) -> TaskState {
        match self {
            Outcome::Pending => TaskState::Pending,
            Outcome::Running => TaskState::Running,
            Outcome::Completed(_) => TaskState::Completed,
            Outcome::Failed(_) => TaskState::Failed,
            Outcome::Cancelled => TaskState::Cancelled,
        }
    }

    /// Final result with the value moved out, or `None` while unfinished.
    fn take_result(&mut self) -> Option<Result<T>> {
        match self {
            Outcome::Completed(value) => Some(value.take().ok_or(Error::ResultTaken)),
            other => other.failure(),
        }
    }

    fn failure<U>(&self) -> Option<Result<U>> {
        match self {
            Outcome::Pending | Outcome::Running => None,
            Outcome::Completed(_) => Some(Err(Error::ResultTaken)),
            Outcome::Failed(failure) => Some(Err(Error::ExecutionFailed(failure.clone()))),
            Outcome::Cancelled => Some(Err(Error::Cancelled)),
        }
    }
}

impl<T: Clone> Outcome<T> {
    fn clone_result(&mut self) -> Option<Result<T>> {
        match self {
            Outcome::Completed(Some(value)) => Some(Ok(value.clone())),
            other => other.failure(),
        }
    }
}

/// Outcome cell shared by the worker and every handle clone.
pub(crate) struct Shared<T> {
    id: TaskId,
    outcome: Mutex<Outcome<T>>,
    done: Condvar,
    interrupt: Interrupt,
}

impl<T> Shared<T> {
    pub(crate) fn new(id: TaskId, interrupt: Interrupt) -> Self {
        Self {
            id,
            outcome: Mutex::new(Outcome::Pending),
            done: Condvar::new(),
            interrupt,
        }
    }

    /// Pending -> Running. `false` if the task was cancelled first.
    pub(crate) fn start(&self) -> bool {
        let mut outcome = self.outcome.lock();
        match *outcome {
            Outcome::Pending => {
                *outcome = Outcome::Running;
                true
            }
            _ => false,
        }
    }

    /// Running -> Completed | Failed. `false` if cancelled meanwhile, in
    /// which case the result is dropped.
    pub(crate) fn finish(&self, result: std::result::Result<T, TaskFailure>) -> bool {
        let mut outcome = self.outcome.lock();
        if !matches!(*outcome, Outcome::Running) {
            return false;
        }

        *outcome = match result {
            Ok(value) => Outcome::Completed(Some(value)),
            Err(failure) => Outcome::Failed(failure),
        };
        drop(outcome);

        self.done.notify_all();
        true
    }

    pub(crate) fn cancel(&self) -> bool {
        let mut outcome = self.outcome.lock();
        let was_running = match *outcome {
            Outcome::Pending => false,
            Outcome::Running => true,
            _ => return false,
        };

        *outcome = Outcome::Cancelled;
        drop(outcome);

        if was_running {
            self.interrupt.trigger();
        }
        self.done.notify_all();
        true
    }
}

/// Future-like view of a submitted task.
///
/// Clones observe the same task. The outcome is written once, by the worker
/// that runs the task or by a cancellation, and never changes afterwards.
pub struct TaskHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(shared: Arc<Shared<T>>) -> Self {
        Self { shared }
    }

    pub fn id(&self) -> TaskId {
        self.shared.id
    }

    pub fn state(&self) -> TaskState {
        self.shared.outcome.lock().state()
    }

    /// Non-blocking; true once completed, failed or cancelled.
    pub fn is_done(&self) -> bool {
        self.state().is_done()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == TaskState::Cancelled
    }

    /// Cancel the task.
    ///
    /// A pending task will never run. A running task is marked cancelled at
    /// once and asked to stop through its interrupt flag; whatever it returns
    /// later is discarded. Returns `false` if the task was already done.
    pub fn cancel(&self) -> bool {
        self.shared.cancel()
    }

    /// Block until the task is done, without reading the value.
    pub fn wait(&self) {
        let mut outcome = self.shared.outcome.lock();
        while !outcome.state().is_done() {
            self.shared.done.wait(&mut outcome);
        }
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`. Returns whether
    /// the task is done.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return true;
        };

        let mut outcome = self.shared.outcome.lock();
        while !outcome.state().is_done() {
            if self.shared.done.wait_until(&mut outcome, deadline).timed_out() {
                return outcome.state().is_done();
            }
        }
        true
    }

    /// Block until the task is done and take its value.
    ///
    /// Works for any `T`. The value moves out of the shared cell, so once one
    /// clone has joined, [`get`](Self::get) and further joins on other clones
    /// fail with [`Error::ResultTaken`].
    pub fn join(self) -> Result<T> {
        self.resolve(None, Outcome::take_result)
    }

    /// Like [`join`](Self::join) but fails with [`Error::Timeout`] if the
    /// outcome is not available within `timeout`. The value stays in place on
    /// timeout, so the call can be repeated.
    pub fn join_timeout(&self, timeout: Duration) -> Result<T> {
        self.resolve(Some(timeout), Outcome::take_result)
    }

    fn resolve<F>(&self, timeout: Option<Duration>, mut read: F) -> Result<T>
    where
        F: FnMut(&mut Outcome<T>) -> Option<Result<T>>,
    {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));

        let mut outcome = self.shared.outcome.lock();
        loop {
            if let Some(result) = read(&mut *outcome) {
                return result;
            }
            match (deadline, timeout) {
                (Some(deadline), Some(timeout)) => {
                    if self.shared.done.wait_until(&mut outcome, deadline).timed_out() {
                        return read(&mut *outcome).unwrap_or(Err(Error::Timeout(timeout)));
                    }
                }
                _ => self.shared.done.wait(&mut outcome),
            }
        }
    }
}

impl<T: Clone> TaskHandle<T> {
    /// Block until the task is done and return a copy of its value.
    ///
    /// Fails with [`Error::ExecutionFailed`] if the task panicked or returned
    /// an error, and with [`Error::Cancelled`] if it was cancelled.
    pub fn get(&self) -> Result<T> {
        self.resolve(None, Outcome::clone_result)
    }

    /// Like [`get`](Self::get) but fails with [`Error::Timeout`] if the
    /// outcome is not available within `timeout`. The task keeps running.
    pub fn get_timeout(&self, timeout: Duration) -> Result<T> {
        self.resolve(Some(timeout), Outcome::clone_result)
    }
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}
