use crate::driver::DriverHandle;
use crate::runtime::task::Runnable;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// FIFO run queue of the current-thread runtime.
///
/// Woken tasks are pushed to the back and executed from the front, so
/// continuations run in the order they became ready. Pushing unparks the
/// driver in case the runtime thread is blocked waiting for timers.
pub(crate) struct Scheduler {
    /// Tasks ready to be polled.
    queue: Mutex<VecDeque<Arc<dyn Runnable>>>,

    /// Used to interrupt a parked runtime thread.
    driver: DriverHandle,
}

impl Scheduler {
    pub(crate) fn new(driver: DriverHandle) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            driver,
        }
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<Arc<dyn Runnable>>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Schedules a task for execution.
    pub(crate) fn push(&self, task: Arc<dyn Runnable>) {
        self.queue().push_back(task);
        self.driver.unpark();
    }

    /// Runs up to `limit` ready tasks and returns how many ran.
    ///
    /// Tasks woken while the batch runs are picked up in the same batch
    /// as long as the limit allows.
    pub(crate) fn run_batch(&self, limit: usize) -> usize {
        for ran in 0..limit {
            // Pop in its own statement so the queue lock is released
            // before the task is polled.
            let next = self.queue().pop_front();

            match next {
                Some(task) => task.run(),
                None => return ran,
            }
        }

        limit
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue().is_empty()
    }

    /// Drops every queued task.
    pub(crate) fn clear(&self) {
        let drained: Vec<_> = self.queue().drain(..).collect();
        drop(drained);
    }
}
