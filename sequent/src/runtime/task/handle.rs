use super::core::Task;
use super::state::COMPLETED;

use std::panic;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::{Arc, PoisonError};
use std::task::{Context, Poll};

/// A handle to a spawned task.
///
/// A `JoinHandle` allows awaiting the output of a task spawned onto the
/// runtime. It implements [`Future`] and resolves once the task has
/// completed. If the task panicked, awaiting the handle resumes the panic.
///
/// Dropping the `JoinHandle` does **not** cancel the task; it only
/// discards the ability to observe its output. Use [`abort`](Self::abort)
/// to cancel it.
pub struct JoinHandle<T> {
    /// Shared reference to the underlying task.
    pub(crate) task: Arc<Task<T>>,
}

impl<T: Send + 'static> JoinHandle<T> {
    /// Cancels the task.
    ///
    /// A task that has not completed yet is never polled again and its
    /// future is dropped. Aborting a completed task does nothing.
    pub fn abort(self) {
        self.task.abort();
    }

    /// Returns `true` once the task has produced its output.
    pub fn is_finished(&self) -> bool {
        self.task.state.load(Ordering::Acquire) == COMPLETED
    }
}

impl<T> JoinHandle<T> {
    fn take_output(&self) -> Option<T> {
        if self.task.state.load(Ordering::Acquire) != COMPLETED {
            return None;
        }

        // Safety: the result is written before COMPLETED is published and
        // only this handle reads it.
        let result = unsafe { (*self.task.result.get()).take() };

        match result.expect("JoinHandle polled after completion") {
            Ok(value) => Some(value),
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}

impl<T> Future for JoinHandle<T> {
    /// The output of the spawned task.
    type Output = T;

    /// Polls the join handle.
    ///
    /// The waker is registered **before** re-checking the task state to
    /// avoid missed wake-ups.
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        if let Some(value) = self.take_output() {
            return Poll::Ready(value);
        }

        self.task
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(cx.waker().clone());

        match self.take_output() {
            Some(value) => Poll::Ready(value),
            None => Poll::Pending,
        }
    }
}
