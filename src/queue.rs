//! Blocking FIFO shared by producers and worker threads.
//!
//! The queue can be *sealed*: once sealed it refuses new items but keeps
//! handing out what it already holds, and consumers get `None` only after the
//! last item is gone. That is the signal workers use to exit.

use crate::config::QueueFullPolicy;
use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;

struct State<T> {
    items: VecDeque<T>,
    sealed: bool,
}

/// Thread-safe FIFO queue, unbounded or bounded.
pub struct TaskQueue<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: Option<usize>,
    policy: QueueFullPolicy,
}

impl<T> TaskQueue<T> {
    /// Create a queue that never blocks producers.
    pub fn unbounded() -> Self {
        Self::with_capacity(None, QueueFullPolicy::Block)
    }

    /// Create a queue holding at most `capacity` items.
    ///
    /// A `capacity` of zero is raised to one so that a producer can always
    /// hand an item to a consumer. `Config::validate` rejects zero before a
    /// pool ever builds its queue.
    pub fn bounded(capacity: usize, policy: QueueFullPolicy) -> Self {
        Self::with_capacity(Some(capacity.max(1)), policy)
    }

    pub(crate) fn with_capacity(capacity: Option<usize>, policy: QueueFullPolicy) -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                sealed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            policy,
        }
    }

    /// Append `item` at the tail.
    ///
    /// Fails with [`Error::QueueClosed`] once the queue is sealed, including
    /// when the queue gets sealed while a producer is blocked on a full
    /// bounded queue. With [`QueueFullPolicy::Reject`] a full queue fails
    /// immediately with [`Error::QueueFull`].
    pub fn enqueue(&self, item: T) -> Result<()> {
        let mut state = self.state.lock();

        loop {
            if state.sealed {
                return Err(Error::QueueClosed);
            }

            match self.capacity {
                Some(cap) if state.items.len() >= cap => match self.policy {
                    QueueFullPolicy::Reject => return Err(Error::QueueFull),
                    QueueFullPolicy::Block => self.not_full.wait(&mut state),
                },
                _ => break,
            }
        }

        state.items.push_back(item);
        drop(state);

        self.not_empty.notify_one();
        Ok(())
    }

    /// Take the head item, blocking while the queue is empty and open.
    ///
    /// Returns `None` once the queue is sealed and drained.
    pub fn dequeue(&self) -> Option<T> {
        let mut state = self.state.lock();

        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                if self.capacity.is_some() {
                    self.not_full.notify_one();
                }
                return Some(item);
            }

            if state.sealed {
                return None;
            }

            self.not_empty.wait(&mut state);
        }
    }

    /// Non-blocking variant of [`dequeue`](Self::dequeue).
    pub fn try_dequeue(&self) -> Option<T> {
        let item = self.state.lock().items.pop_front();
        if item.is_some() && self.capacity.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Close the queue to new items. Returns `true` for the call that
    /// actually sealed it.
    pub fn seal(&self) -> bool {
        let first = {
            let mut state = self.state.lock();
            let first = !state.sealed;
            state.sealed = true;
            first
        };

        self.not_empty.notify_all();
        self.not_full.notify_all();
        first
    }

    /// Remove every queued item, oldest first.
    pub fn drain(&self) -> Vec<T> {
        let items: Vec<T> = self.state.lock().items.drain(..).collect();
        self.not_full.notify_all();
        items
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    pub fn is_sealed(&self) -> bool {
        self.state.lock().sealed
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<T> fmt::Debug for TaskQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TaskQueue")
            .field("len", &state.items.len())
            .field("sealed", &state.sealed)
            .field("capacity", &self.capacity)
            .field("policy", &self.policy)
            .finish()
    }
}
