//! Asynchronous task primitives.
//!
//! This module defines how the runtime represents, schedules and runs
//! spawned futures:
//! - task state management,
//! - waker integration through [`std::task::Wake`],
//! - join handles for awaiting or aborting a task.
//!
//! Most users only need [`spawn`] and [`JoinHandle`].

pub(crate) mod core;
pub(crate) mod handle;
pub(crate) mod state;

pub(crate) use core::Runnable;

pub use core::spawn;
pub use handle::JoinHandle;
