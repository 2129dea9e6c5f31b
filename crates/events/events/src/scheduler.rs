//! Deferred task scheduling for reactive emissions.
//!
//! A deferred task runs after the code that scheduled it has returned, and
//! before anything deferred after it. Two schedulers are provided:
//!
//! - [`MicrotaskQueue`]: an explicit FIFO queue drained by the host, with a
//!   per-thread default reachable through [`MicrotaskQueue::current`].
//! - [`LocalScheduler`]: hands tasks to the current tokio `LocalSet`.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// A unit of deferred work.
pub type Deferred = Box<dyn FnOnce()>;

/// Something that can run a task later on the current thread.
pub trait Scheduler {
    /// Queues `task` behind everything already deferred.
    fn defer(&self, task: Deferred);
}

thread_local! {
    static CURRENT: Rc<MicrotaskQueue> = Rc::new(MicrotaskQueue::new());
}

/// FIFO queue of deferred tasks, drained explicitly between logical ticks.
#[derive(Default)]
pub struct MicrotaskQueue {
    tasks: RefCell<VecDeque<Deferred>>,
}

impl MicrotaskQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns this thread's default queue.
    pub fn current() -> Rc<MicrotaskQueue> {
        CURRENT.with(Rc::clone)
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Runs queued tasks until the queue is empty, including tasks queued by
    /// the tasks being run. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        // The borrow ends before the task runs so it can defer more work.
        while let Some(task) = self.pop() {
            task();
            ran += 1;
        }
        if ran > 0 {
            tracing::trace!(tasks = ran, "Microtask queue drained");
        }
        ran
    }

    fn pop(&self) -> Option<Deferred> {
        self.tasks.borrow_mut().pop_front()
    }
}

impl Scheduler for MicrotaskQueue {
    fn defer(&self, task: Deferred) {
        self.tasks.borrow_mut().push_back(task);
    }
}

impl fmt::Debug for MicrotaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MicrotaskQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Drains this thread's default queue. Returns how many tasks ran.
pub fn run_microtasks() -> usize {
    MicrotaskQueue::current().run_until_idle()
}

/// Defers tasks onto the tokio `LocalSet` the caller is running in.
///
/// # Panics
///
/// Deferring outside of a `LocalSet` panics, as `tokio::task::spawn_local` does.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalScheduler;

impl LocalScheduler {
    /// Creates a new local scheduler.
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for LocalScheduler {
    fn defer(&self, task: Deferred) {
        tokio::task::spawn_local(async move { task() });
    }
}
