//! Consumer execution contexts.
//!
//! Observer callbacks must run on a context the consumer owns, typically
//! a single thread pumping an event loop. `EventLoop` owns the task
//! queue; `ContextHandle` is the cloneable posting side handed to
//! delivery queues. Tearing a context down makes every handle inert:
//! later posts are dropped and tasks already queued are discarded, never
//! run into a dead context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};

/// A unit of work scheduled onto an execution context.
pub type Task = Box<dyn FnOnce() + Send>;

/// Cloneable posting handle for one execution context.
#[derive(Debug, Clone)]
pub struct ContextHandle {
    tx: Sender<Task>,
    alive: Arc<AtomicBool>,
}

impl ContextHandle {
    /// Returns true while the owning context accepts and runs tasks.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Schedules a task onto the owning context.
    ///
    /// Returns false if the context is torn down or gone; the task is
    /// dropped in that case.
    pub fn post(&self, task: Task) -> bool {
        if !self.is_alive() {
            return false;
        }
        self.tx.send(task).is_ok()
    }

    /// Marks the context as torn down.
    ///
    /// Idempotent. Tasks already queued will be discarded by the owning
    /// loop instead of executed.
    pub fn tear_down(&self) {
        self.alive.store(false, Ordering::Release);
    }
}

/// A single-threaded task loop owning one execution context.
///
/// The loop itself never spawns a thread; the owning thread decides when
/// to pump it via [`run_until_idle`](Self::run_until_idle) or
/// [`run_once`](Self::run_once), which is how UI threads and test
/// harnesses stay in control of callback timing.
#[derive(Debug)]
pub struct EventLoop {
    rx: Receiver<Task>,
    handle: ContextHandle,
}

impl EventLoop {
    /// Creates a live context and its task queue.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = unbounded::<Task>();
        Self {
            rx,
            handle: ContextHandle {
                tx,
                alive: Arc::new(AtomicBool::new(true)),
            },
        }
    }

    /// Returns a posting handle for this context.
    #[must_use]
    pub fn handle(&self) -> ContextHandle {
        self.handle.clone()
    }

    /// Returns true while this context accepts and runs tasks.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.handle.is_alive()
    }

    /// Runs every task queued at entry, returning how many ran.
    ///
    /// Tasks posted while this pass executes wait for the next pass, so
    /// concurrent posters cannot livelock the loop.
    pub fn run_until_idle(&self) -> usize {
        let pending = self.rx.len();
        let mut executed = 0;
        for _ in 0..pending {
            let Ok(task) = self.rx.try_recv() else {
                break;
            };
            if !self.handle.is_alive() {
                break;
            }
            task();
            executed += 1;
        }
        executed
    }

    /// Blocks for at most `timeout` waiting for one task, runs it, and
    /// returns true if a task ran.
    pub fn run_once(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(task) => {
                if self.handle.is_alive() {
                    task();
                    true
                } else {
                    false
                }
            }
            Err(_) => false,
        }
    }

    /// Tears the context down and discards every queued task.
    pub fn tear_down(&self) {
        self.handle.tear_down();
        while self.rx.try_recv().is_ok() {}
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.tear_down();
    }
}
