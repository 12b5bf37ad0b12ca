//! Portable poller built on a mutex and condition variable.

use std::io;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Cross-thread handle that interrupts a blocked [`CondvarPoller::park`].
pub(crate) struct Unparker {
    /// Set when an unpark arrived and has not been consumed yet.
    notified: Mutex<bool>,

    condvar: Condvar,
}

impl Unparker {
    pub(crate) fn unpark(&self) {
        *self.notified.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.condvar.notify_one();
    }
}

/// Condition-variable poller used on targets without `epoll`.
pub(crate) struct CondvarPoller {
    unparker: Arc<Unparker>,
}

impl CondvarPoller {
    pub(crate) fn new() -> Self {
        Self {
            unparker: Arc::new(Unparker {
                notified: Mutex::new(false),
                condvar: Condvar::new(),
            }),
        }
    }

    pub(crate) fn unparker(&self) -> Arc<Unparker> {
        self.unparker.clone()
    }

    /// Blocks until unparked or until `timeout` elapses.
    pub(crate) fn park(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        let unparker = &self.unparker;
        let notified = unparker
            .notified
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut notified = match timeout {
            Some(timeout) => {
                unparker
                    .condvar
                    .wait_timeout_while(notified, timeout, |notified| !*notified)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            }
            None => unparker
                .condvar
                .wait_while(notified, |notified| !*notified)
                .unwrap_or_else(PoisonError::into_inner),
        };

        *notified = false;
        Ok(())
    }
}
