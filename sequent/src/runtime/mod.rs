//! Current-thread runtime.
//!
//! This module contains the executor the serializing lock schedules its
//! watchdogs and callers schedule their critical sections on.
//!
//! It is responsible for:
//! - polling the root future passed to [`Runtime::block_on`](core::Runtime::block_on),
//! - running spawned tasks in FIFO order,
//! - handing control to the timer driver between batches of tasks,
//! - exposing the thread-local context that `spawn` and `sleep` rely on.
//!
//! Everything runs on the thread that called `block_on`; continuations
//! are interleaved, never parallel.

pub(crate) mod builder;
pub(crate) mod context;
pub(crate) mod core;
pub(crate) mod scheduler;

pub mod task;
