//! Cooperative interruption.
//!
//! Nothing stops a running task by force. A task that wants to honor
//! `shutdown_now` or `TaskHandle::cancel` polls [`is_interrupted`].

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Stop request flag shared by a task, its handle and the pool.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Interrupt>> = const { RefCell::new(None) };
}

/// Restores the previous flag when dropped.
pub(crate) struct CurrentGuard {
    prev: Option<Interrupt>,
}

impl Drop for CurrentGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        CURRENT.with(|c| *c.borrow_mut() = prev);
    }
}

/// Install `interrupt` as the current thread's flag.
pub(crate) fn enter(interrupt: Interrupt) -> CurrentGuard {
    let prev = CURRENT.with(|c| c.borrow_mut().replace(interrupt));
    CurrentGuard { prev }
}

/// Whether the task running on this thread has been asked to stop.
///
/// Always `false` outside a pool worker.
pub fn is_interrupted() -> bool {
    CURRENT.with(|c| c.borrow().as_ref().map_or(false, Interrupt::is_set))
}
