//! Timer driver.
//!
//! The driver owns the timer heap and the OS-level parker. The runtime
//! loop calls into it whenever it runs out of ready tasks:
//! - [`Driver::fire_due`] wakes every timer whose deadline has passed,
//! - [`Driver::park`] blocks the thread until the next deadline or until
//!   some thread unparks it.
//!
//! Timers are registered through a cloneable [`DriverHandle`], which is
//! what the `sleep` future reaches through the runtime context.

mod poller;
mod timer;

use poller::{Poller, Unparker};
use timer::TimerEntry;

use std::collections::BinaryHeap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::Waker;
use std::time::Instant;

/// State shared between the driver and its handles.
struct Shared {
    /// Pending timers, earliest deadline on top.
    timers: Mutex<BinaryHeap<TimerEntry>>,

    /// Source of registration sequence numbers.
    sequence: AtomicU64,

    /// Timers cancelled since the heap was last compacted.
    cancelled: AtomicUsize,

    /// Interrupts a blocked [`Driver::park`].
    unparker: Arc<Unparker>,
}

impl Shared {
    fn timers(&self) -> MutexGuard<'_, BinaryHeap<TimerEntry>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloneable handle used to register timers and unpark the driver.
#[derive(Clone)]
pub(crate) struct DriverHandle {
    shared: Arc<Shared>,
}

impl DriverHandle {
    /// Schedules `waker` to be woken once `deadline` has passed.
    ///
    /// The timer is skipped if `cancelled` is set before it fires.
    pub(crate) fn set_timer(&self, deadline: Instant, waker: Waker, cancelled: Arc<AtomicBool>) {
        let sequence = self.shared.sequence.fetch_add(1, Ordering::Relaxed);

        self.shared.timers().push(TimerEntry {
            deadline,
            sequence,
            waker,
            cancelled,
        });

        self.unpark();
    }

    /// Marks a registered timer as cancelled so the driver skips it and
    /// eventually drops its entry.
    pub(crate) fn cancel_timer(&self, cancelled: &AtomicBool) {
        if !cancelled.swap(true, Ordering::AcqRel) {
            self.shared.cancelled.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Interrupts the driver if it is parked.
    pub(crate) fn unpark(&self) {
        self.shared.unparker.unpark();
    }
}

/// The timer driver owned by a runtime.
pub(crate) struct Driver {
    poller: Poller,
    handle: DriverHandle,
}

impl Driver {
    pub(crate) fn new() -> Self {
        let poller = Poller::new();
        let shared = Arc::new(Shared {
            timers: Mutex::new(BinaryHeap::new()),
            sequence: AtomicU64::new(0),
            cancelled: AtomicUsize::new(0),
            unparker: poller.unparker(),
        });

        Self {
            poller,
            handle: DriverHandle { shared },
        }
    }

    pub(crate) fn handle(&self) -> DriverHandle {
        self.handle.clone()
    }

    /// Wakes every non-cancelled timer whose deadline is at or before `now`.
    ///
    /// Wakers run after the heap lock is released, in deadline order.
    /// Returns the number of wakers notified.
    pub(crate) fn fire_due(&self, now: Instant) -> usize {
        let mut due = Vec::new();

        {
            let mut timers = self.handle.shared.timers();
            self.prune(&mut timers);

            while timers.peek().is_some_and(|timer| timer.deadline <= now) {
                if let Some(timer) = timers.pop() {
                    if !timer.cancelled.load(Ordering::Acquire) {
                        due.push(timer.waker);
                    }
                }
            }
        }

        let fired = due.len();
        for waker in due {
            waker.wake();
        }

        fired
    }

    /// Parks the thread until the earliest timer is due or an unpark
    /// arrives. Blocks indefinitely when no timer is pending.
    pub(crate) fn park(&mut self) -> io::Result<()> {
        let timeout = {
            let mut timers = self.handle.shared.timers();
            self.prune(&mut timers);

            timers
                .peek()
                .map(|timer| timer.deadline.saturating_duration_since(Instant::now()))
        };

        self.poller.park(timeout)
    }

    /// Drops cancelled entries.
    ///
    /// Cancelled timers on top of the heap are popped so parking never
    /// waits on them. The whole heap is compacted once at least half of it
    /// may be cancelled, which bounds how many dead wakers it retains.
    fn prune(&self, timers: &mut BinaryHeap<TimerEntry>) {
        let cancelled = self.handle.shared.cancelled.load(Ordering::Relaxed);

        if cancelled > 0 && cancelled * 2 >= timers.len() {
            timers.retain(|timer| !timer.cancelled.load(Ordering::Acquire));
            self.handle.shared.cancelled.store(0, Ordering::Relaxed);
        }

        while timers
            .peek()
            .is_some_and(|timer| timer.cancelled.load(Ordering::Acquire))
        {
            timers.pop();
        }
    }

    /// Drops every pending timer along with the wakers it holds.
    pub(crate) fn clear(&self) {
        let drained: Vec<TimerEntry> = self.handle.shared.timers().drain().collect();
        drop(drained);
    }
}
