//! Schedulers that run chain steps.
//!
//! Every step of a dispatch walk is submitted as a [`Task`]; nothing in the chain runs on
//! the caller's stack. Two implementations ship:
//!
//! - [`CoroutineScheduler`] spawns each step as a `may` coroutine (used by the server).
//! - [`EventLoop`] queues steps on a single-threaded FIFO run queue that the owner drives
//!   turn by turn, which makes step ordering observable and deterministic.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{error, trace};

use crate::runtime_config::RuntimeConfig;

/// One unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Accepts tasks and runs each on a later turn than the one that submitted it.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, task: Task);
}

/// Runs every task in its own `may` coroutine.
#[derive(Debug, Clone, Copy)]
pub struct CoroutineScheduler {
    stack_size: usize,
}

impl Default for CoroutineScheduler {
    fn default() -> Self {
        Self::new(RuntimeConfig::from_env())
    }
}

impl CoroutineScheduler {
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            stack_size: config.stack_size,
        }
    }

    #[must_use]
    pub fn stack_size(&self) -> usize {
        self.stack_size
    }
}

impl Scheduler for CoroutineScheduler {
    fn schedule(&self, task: Task) {
        // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may runtime.
        // The task is Send + 'static and owns everything it touches, and it never uses
        // thread-local storage across yields.
        let spawned = unsafe {
            may::coroutine::Builder::new()
                .stack_size(self.stack_size)
                .spawn(task)
        };
        if let Err(e) = spawned {
            error!(
                error = %e,
                stack_size = self.stack_size,
                "Failed to spawn chain step coroutine"
            );
        }
    }
}

/// Single-threaded run queue.
///
/// Tasks run in submission order when the owner calls [`EventLoop::turn`] or
/// [`EventLoop::run_until_idle`]. A task scheduled while another runs waits for a later turn.
#[derive(Default)]
pub struct EventLoop {
    queue: Mutex<VecDeque<Task>>,
}

impl EventLoop {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<Task>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of tasks waiting to run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue().len()
    }

    /// Run the oldest queued task. Returns `false` when the queue was empty.
    pub fn turn(&self) -> bool {
        let task = self.queue().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run tasks until the queue is empty, returning how many turns ran.
    pub fn run_until_idle(&self) -> usize {
        let mut turns = 0;
        while self.turn() {
            turns += 1;
        }
        trace!(turns = turns, "Event loop idle");
        turns
    }
}

impl Scheduler for EventLoop {
    fn schedule(&self, task: Task) {
        self.queue().push_back(task);
    }
}
