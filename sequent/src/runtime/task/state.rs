/// Task is idle and not scheduled.
///
/// The task exists but is waiting on a waker.
pub(crate) const IDLE: usize = 0;

/// Task is queued for execution.
pub(crate) const QUEUED: usize = 1;

/// Task is currently being polled.
///
/// Only the runtime loop observes this state, and only once at a time.
pub(crate) const RUNNING: usize = 2;

/// Task has completed; its output (or panic) is stored.
pub(crate) const COMPLETED: usize = 3;

/// Task has been woken while running.
///
/// It is re-queued as soon as the current poll returns.
pub(crate) const NOTIFIED: usize = 4;

/// Task was aborted through its join handle and will never be polled again.
pub(crate) const CANCELLED: usize = 5;
