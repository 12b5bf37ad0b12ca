//! Platform-specific parking for the driver.
//!
//! The driver blocks here whenever no task is runnable, until either the
//! next timer deadline passes or another thread unparks it (a task woken
//! from outside the runtime thread, a timer registered from elsewhere).
//!
//! On Linux the poller is an `epoll` instance watching an internal
//! `eventfd`; other targets fall back to a mutex and condition variable.

#[cfg(target_os = "linux")]
mod epoll;

#[cfg(not(target_os = "linux"))]
mod condvar;

#[cfg(target_os = "linux")]
pub(crate) use epoll::{EpollPoller as Poller, Unparker};

#[cfg(not(target_os = "linux"))]
pub(crate) use condvar::{CondvarPoller as Poller, Unparker};
