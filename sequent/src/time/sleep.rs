use crate::driver::DriverHandle;
use crate::runtime::context;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

/// Creates a future that completes after the given duration.
///
/// The deadline is fixed when `sleep` is called, not when the future is
/// first polled.
///
/// # Panics
///
/// The returned future panics if polled outside of a running runtime.
///
/// # Examples
///
/// ```rust,ignore
/// use std::time::Duration;
///
/// sleep(Duration::from_millis(10)).await;
/// ```
pub fn sleep(duration: Duration) -> Sleep {
    Sleep::new(duration)
}

/// A future that completes once a specific deadline is reached.
///
/// `Sleep` registers a timer with the runtime driver on first poll.
/// Dropping it before completion cancels the timer.
pub struct Sleep {
    /// Absolute point in time when the sleep completes.
    deadline: Instant,

    /// Driver the timer is registered with, until it completes.
    driver: Option<DriverHandle>,

    /// Cancellation flag shared with the driver.
    cancelled: Arc<AtomicBool>,
}

impl Sleep {
    pub(crate) fn new(duration: Duration) -> Self {
        Self {
            deadline: Instant::now() + duration,
            driver: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The instant at which this sleep completes.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Returns `true` once the deadline has passed.
    pub fn is_elapsed(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.is_elapsed() {
            // The entry is due (or already fired); the driver pops it on
            // its next pass.
            this.driver = None;
            this.cancelled.store(true, Ordering::Release);
            return Poll::Ready(());
        }

        if this.driver.is_none() {
            let handle = context::current().expect("Sleep polled outside of runtime");
            handle
                .driver
                .set_timer(this.deadline, cx.waker().clone(), this.cancelled.clone());
            this.driver = Some(handle.driver);
        }

        Poll::Pending
    }
}

impl Drop for Sleep {
    /// Cancels the timer so the driver skips it and drops its entry.
    fn drop(&mut self) {
        match self.driver.take() {
            Some(driver) => driver.cancel_timer(&self.cancelled),
            None => self.cancelled.store(true, Ordering::Release),
        }
    }
}
