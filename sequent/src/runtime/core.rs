use super::context::{self, Handle};
use super::scheduler::Scheduler;
use super::task::{JoinHandle, core::spawn_on};
use crate::driver::{Driver, DriverHandle};

use std::cell::RefCell;
use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, Wake, Waker};
use std::time::Instant;

/// The main runtime handle.
///
/// `Runtime` is responsible for:
/// - spawning asynchronous tasks,
/// - driving task execution on the calling thread,
/// - firing timers through its driver,
/// - providing a synchronous entry point via [`block_on`](Self::block_on).
///
/// Dropping the runtime drops every task and timer still pending.
pub struct Runtime {
    /// Handles installed as the thread context while the runtime runs.
    handle: Handle,

    /// Timer driver, borrowed mutably for the duration of `block_on`.
    driver: RefCell<Driver>,

    /// Maximum number of tasks run between two timer checks.
    event_interval: usize,
}

/// Waker of the future passed to `block_on`.
struct RootWaker {
    notified: AtomicBool,
    driver: DriverHandle,
}

impl Wake for RootWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.notified.store(true, Ordering::Release);
        self.driver.unpark();
    }
}

impl Runtime {
    pub(crate) fn new(event_interval: usize) -> Self {
        let driver = Driver::new();
        let driver_handle = driver.handle();
        let scheduler = Arc::new(Scheduler::new(driver_handle.clone()));

        Self {
            handle: Handle {
                scheduler,
                driver: driver_handle,
            },
            driver: RefCell::new(driver),
            event_interval,
        }
    }

    /// Spawns a future onto the runtime.
    ///
    /// The task starts running the next time the runtime is driven by
    /// [`block_on`](Self::block_on).
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let handle = runtime.spawn(async { 21 * 2 });
    /// assert_eq!(runtime.block_on(handle), 42);
    /// ```
    pub fn spawn<F, T>(&self, future: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        spawn_on(&self.handle.scheduler, future)
    }

    /// Runs a future to completion on the current thread.
    ///
    /// While `future` is pending, the runtime runs spawned tasks and fires
    /// timers. It parks the thread when nothing is ready. Tasks still
    /// pending when `future` completes stay queued for the next call.
    ///
    /// # Panics
    ///
    /// Panics if called from within another `block_on` of the same
    /// runtime.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let result = runtime.block_on(async { 42 });
    /// assert_eq!(result, 42);
    /// ```
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        let mut driver = self
            .driver
            .try_borrow_mut()
            .expect("block_on cannot be nested on the same runtime");

        let _enter = context::enter(self.handle.clone());

        let root = Arc::new(RootWaker {
            notified: AtomicBool::new(true),
            driver: self.handle.driver.clone(),
        });
        let waker = Waker::from(root.clone());
        let mut cx = Context::from_waker(&waker);
        let mut future = pin!(future);

        loop {
            if root.notified.swap(false, Ordering::AcqRel) {
                if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
                    return output;
                }
            }

            let ran = self.handle.scheduler.run_batch(self.event_interval);
            let fired = driver.fire_due(Instant::now());

            let idle = ran == 0
                && fired == 0
                && !root.notified.load(Ordering::Acquire)
                && self.handle.scheduler.is_empty();

            if idle {
                if let Err(err) = driver.park() {
                    tracing::error!(%err, "driver failed to park");
                }
            }
        }
    }
}

impl Drop for Runtime {
    /// Releases pending tasks and timers.
    ///
    /// Queued tasks and timer wakers hold references back to the
    /// scheduler, so both are cleared explicitly.
    fn drop(&mut self) {
        self.handle.scheduler.clear();
        self.driver.get_mut().clear();
    }
}
