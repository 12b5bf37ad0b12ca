use crate::driver::DriverHandle;
use crate::runtime::scheduler::Scheduler;

use std::cell::RefCell;
use std::sync::Arc;

/// Handles a running runtime exposes to the code it executes.
#[derive(Clone)]
pub(crate) struct Handle {
    /// Run queue that `spawn` pushes onto.
    pub(crate) scheduler: Arc<Scheduler>,

    /// Timer driver that `sleep` registers with.
    pub(crate) driver: DriverHandle,
}

thread_local! {
    /// Thread-local handle to the runtime currently driving this thread.
    ///
    /// Set for the duration of `Runtime::block_on`, so deeply nested
    /// components (spawn, timers, the lock watchdog) can reach the
    /// runtime without explicit parameter passing.
    static CURRENT: RefCell<Option<Handle>> = const { RefCell::new(None) };
}

/// Restores the previous context when dropped, even on unwind.
pub(crate) struct EnterGuard {
    previous: Option<Handle>,
}

impl Drop for EnterGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|cell| *cell.borrow_mut() = previous);
    }
}

/// Installs `handle` as the current runtime context for this thread.
pub(crate) fn enter(handle: Handle) -> EnterGuard {
    let previous = CURRENT.with(|cell| cell.borrow_mut().replace(handle));
    EnterGuard { previous }
}

/// Returns the current runtime context, if any.
pub(crate) fn current() -> Option<Handle> {
    CURRENT.with(|cell| cell.borrow().clone())
}
