use super::JoinHandle;
use super::state::{CANCELLED, COMPLETED, IDLE, NOTIFIED, QUEUED, RUNNING};
use crate::runtime::context;
use crate::runtime::scheduler::Scheduler;

use std::cell::UnsafeCell;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll, Wake, Waker};
use std::thread;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A runnable unit of work that can be executed by the scheduler.
///
/// The `Runnable` trait erases the output type of a task, allowing the
/// scheduler to queue heterogeneous tasks as `Arc<dyn Runnable>`.
pub(crate) trait Runnable: Send + Sync {
    /// Polls the task once.
    fn run(self: Arc<Self>);
}

/// A spawned asynchronous task managed by the runtime.
///
/// A `Task` owns its future until completion, then owns the produced
/// output until the join handle takes it.
pub(crate) struct Task<T> {
    /// The underlying future, dropped as soon as the task completes or is
    /// aborted.
    ///
    /// Accessed only by whoever moved the state out of `QUEUED`/`IDLE`,
    /// which makes the `UnsafeCell` access exclusive.
    future: UnsafeCell<Option<BoxFuture<T>>>,

    /// Output of the future, or the payload of its panic.
    pub(crate) result: UnsafeCell<Option<thread::Result<T>>>,

    /// The current lifecycle state of the task.
    pub(crate) state: AtomicUsize,

    /// Run queue the task re-enters when woken.
    scheduler: Arc<Scheduler>,

    /// Wakers of the join handle awaiting this task.
    pub(crate) waiters: Mutex<Vec<Waker>>,
}

unsafe impl<T> Send for Task<T> {}
unsafe impl<T> Sync for Task<T> {}

impl<T: Send + 'static> Task<T> {
    /// Creates a task in the `QUEUED` state.
    pub(crate) fn new<F>(future: F, scheduler: Arc<Scheduler>) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self {
            future: UnsafeCell::new(Some(Box::pin(future))),
            result: UnsafeCell::new(None),
            state: AtomicUsize::new(QUEUED),
            scheduler,
            waiters: Mutex::new(Vec::new()),
        }
    }

    /// Polls the task once.
    ///
    /// - `Poll::Pending`: back to `IDLE`, or re-queued if woken meanwhile.
    /// - `Poll::Ready` or a panic: the outcome is stored and waiters woken.
    fn poll_once(self: Arc<Self>) {
        if self
            .state
            .compare_exchange(QUEUED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // Cancelled or already completed.
            return;
        }

        let waker = Waker::from(self.clone());
        let mut cx = Context::from_waker(&waker);

        // Safety: the RUNNING state guarantees exclusive access.
        let future = unsafe { &mut *self.future.get() };
        let Some(fut) = future.as_mut() else {
            return;
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| fut.as_mut().poll(&mut cx)));

        let result = match outcome {
            Ok(Poll::Pending) => {
                let parked = self
                    .state
                    .compare_exchange(RUNNING, IDLE, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                    || self
                        .state
                        .compare_exchange(NOTIFIED, QUEUED, Ordering::AcqRel, Ordering::Acquire)
                        .map(|_| self.scheduler.push(self.clone()))
                        .is_ok();

                if !parked {
                    // Aborted from inside its own poll.
                    *future = None;
                }
                return;
            }
            Ok(Poll::Ready(value)) => Ok(value),
            Err(payload) => {
                tracing::error!(
                    panic = %crate::error::panic_message(payload.as_ref()),
                    "spawned task panicked"
                );
                Err(payload)
            }
        };

        *future = None;

        // Safety: the output is written before COMPLETED is published, and
        // the join handle only reads it after observing COMPLETED.
        unsafe {
            *self.result.get() = Some(result);
        }

        let completed = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                (state != CANCELLED).then_some(COMPLETED)
            })
            .is_ok();

        if completed {
            self.notify_waiters();
        } else {
            unsafe {
                (*self.result.get()).take();
            }
        }
    }

    fn notify_waiters(&self) {
        let waiters = std::mem::take(
            &mut *self
                .waiters
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        for waker in waiters {
            waker.wake();
        }
    }

    /// Reschedules the task.
    ///
    /// `IDLE` moves to `QUEUED` and is pushed onto the run queue; `RUNNING`
    /// moves to `NOTIFIED` so it is re-queued right after the current poll.
    fn schedule(self: Arc<Self>) {
        loop {
            match self.state.load(Ordering::Acquire) {
                IDLE => {
                    if self
                        .state
                        .compare_exchange(IDLE, QUEUED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        self.scheduler.push(self.clone());
                        return;
                    }
                }
                RUNNING => {
                    if self
                        .state
                        .compare_exchange(RUNNING, NOTIFIED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    /// Aborts the task.
    ///
    /// A task that is not currently running has its future dropped right
    /// away, which also cancels any timer it was sleeping on.
    pub(crate) fn abort(&self) {
        loop {
            let state = self.state.load(Ordering::Acquire);

            if state == COMPLETED || state == CANCELLED {
                return;
            }

            if self
                .state
                .compare_exchange(state, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                if state != RUNNING && state != NOTIFIED {
                    // Safety: nobody polls a task that left IDLE/QUEUED for
                    // CANCELLED.
                    let future = unsafe { (*self.future.get()).take() };
                    drop(future);
                }

                self.notify_waiters();
                return;
            }
        }
    }
}

impl<T: Send + 'static> Runnable for Task<T> {
    fn run(self: Arc<Self>) {
        self.poll_once()
    }
}

impl<T: Send + 'static> Wake for Task<T> {
    fn wake(self: Arc<Self>) {
        self.schedule();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.clone().schedule();
    }
}

/// Spawns a future as a task onto the current runtime.
///
/// The task is appended to the run queue and first polled once the
/// current continuation yields back to the runtime loop.
///
/// # Panics
///
/// Panics if called outside the context of a running runtime.
pub fn spawn<F, T>(future: F) -> JoinHandle<T>
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
{
    let handle = context::current().expect("spawn must be called within the context of a runtime");

    spawn_on(&handle.scheduler, future)
}

/// Spawns a future onto a specific scheduler.
pub(crate) fn spawn_on<F, T>(scheduler: &Arc<Scheduler>, future: F) -> JoinHandle<T>
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
{
    let task = Arc::new(Task::new(future, scheduler.clone()));
    scheduler.push(task.clone());

    JoinHandle { task }
}
