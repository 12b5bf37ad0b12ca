//! Synchronization primitives for Sequent.
//!
//! The centerpiece is [`SerializingLock`], which serializes callback-style
//! asynchronous work against one shared target:
//!
//! - work submitted while the lock is free starts immediately,
//! - work submitted while it is held waits in a FIFO queue,
//! - each holder is evicted after a bounded time if it never finishes,
//! - a panicking completion callback is reported, never propagated.
//!
//! [`oneshot`] is the single-value channel the lock's async adapter is
//! built on; it is exported for callers bridging other callback APIs.
//!
//! ## Design notes
//!
//! - Lock state sits behind one mutex that is never held while user code
//!   (work, completion callbacks, the exception handler) runs.
//! - Every grant advances a generation counter. Completion signals and
//!   watchdogs carry the generation they were issued for, so a late or
//!   repeated signal can never release a later holder.

mod lock;

pub mod oneshot;

pub use lock::{DEFAULT_TIMEOUT, Finish, LockOptions, SerializingLock};
