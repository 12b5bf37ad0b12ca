//! Linux `epoll`-based poller.
//!
//! The poller owns an `epoll` instance with a single registered source: a
//! non-blocking `eventfd` used as the unpark signal. Blocking in
//! `epoll_wait` with a timeout gives the driver a precise sleep that any
//! thread can interrupt by writing to the eventfd.

use libc::{
    EFD_CLOEXEC, EFD_NONBLOCK, EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLLIN, epoll_create1, epoll_ctl,
    epoll_event, epoll_wait, eventfd,
};
use std::io;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::time::Duration;

/// Token of the unpark eventfd inside the epoll set.
const UNPARK_TOKEN: u64 = u64::MAX;

/// Cross-thread handle that interrupts a blocked [`EpollPoller::park`].
pub(crate) struct Unparker(RawFd);

impl Unparker {
    /// Wakes the poller.
    ///
    /// Writes to the eventfd, causing a pending or future `epoll_wait`
    /// to return immediately.
    pub(crate) fn unpark(&self) {
        let buf: u64 = 1;
        unsafe {
            libc::write(self.0, &buf as *const u64 as *const libc::c_void, 8);
        }
    }

    /// Consumes pending unpark signals.
    fn drain(&self) {
        let mut buf: u64 = 0;
        unsafe {
            libc::read(self.0, &mut buf as *mut u64 as *mut libc::c_void, 8);
        }
    }
}

impl Drop for Unparker {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.0);
        }
    }
}

/// Linux `epoll` poller used by the driver to park the runtime thread.
pub(crate) struct EpollPoller {
    /// Epoll file descriptor.
    epoll: RawFd,

    /// Reusable buffer for epoll events.
    events: Vec<epoll_event>,

    /// Unparker wrapping the registered eventfd.
    unparker: Arc<Unparker>,
}

impl EpollPoller {
    /// Creates the epoll instance and registers the unpark eventfd.
    ///
    /// # Panics
    ///
    /// Panics if the kernel refuses to create either descriptor.
    pub(crate) fn new() -> Self {
        let epoll = unsafe { epoll_create1(EPOLL_CLOEXEC) };
        assert!(epoll >= 0, "epoll_create1 failed");

        let fd = unsafe { eventfd(0, EFD_NONBLOCK | EFD_CLOEXEC) };
        assert!(fd >= 0, "eventfd failed");

        let mut event = epoll_event {
            events: EPOLLIN as u32,
            u64: UNPARK_TOKEN,
        };

        let rc = unsafe { epoll_ctl(epoll, EPOLL_CTL_ADD, fd, &mut event) };
        assert!(rc == 0, "failed to register unpark eventfd");

        Self {
            epoll,
            events: Vec::with_capacity(4),
            unparker: Arc::new(Unparker(fd)),
        }
    }

    /// Returns a handle able to interrupt [`park`](Self::park).
    pub(crate) fn unparker(&self) -> Arc<Unparker> {
        self.unparker.clone()
    }

    /// Blocks until unparked or until `timeout` elapses.
    ///
    /// `None` blocks indefinitely. Interrupted waits return `Ok(())`.
    pub(crate) fn park(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        let timeout_ms = timeout.map(timeout_millis).unwrap_or(-1);

        self.events.clear();

        let n = unsafe {
            epoll_wait(
                self.epoll,
                self.events.as_mut_ptr(),
                self.events.capacity() as i32,
                timeout_ms,
            )
        };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(err);
        }

        unsafe {
            self.events.set_len(n as usize);
        }

        if self.events.iter().any(|event| event.u64 == UNPARK_TOKEN) {
            self.unparker.drain();
        }

        Ok(())
    }
}

impl Drop for EpollPoller {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.epoll);
        }
    }
}

/// Converts a timeout to whole milliseconds, rounding up.
///
/// Rounding down would wake the driver just before a sub-millisecond
/// deadline and make it spin until the deadline passes.
fn timeout_millis(timeout: Duration) -> i32 {
    timeout.as_nanos().div_ceil(1_000_000).min(i32::MAX as u128) as i32
}
