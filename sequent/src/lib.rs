//! # Sequent
//!
//! **Sequent** serializes callback-style asynchronous work against a shared
//! object. It is the ordering layer of the **Nebula** ecosystem: whenever
//! several independently scheduled tasks read-then-write the same value,
//! wrap the value in a [`SerializingLock`](sync::SerializingLock) and submit
//! every critical section through it.
//!
//! The lock guarantees that:
//!
//! - only one critical section runs at a time,
//! - queued critical sections run in submission order,
//! - a critical section that never reports completion is evicted after a
//!   bounded time, so the queue always keeps draining,
//! - a panicking completion callback never stalls the queue.
//!
//! The crate ships the small current-thread runtime the lock schedules its
//! watchdogs on: a task executor, a timer driver, `sleep` and `timeout`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sequent::sync::SerializingLock;
//! use sequent::task;
//! use sequent::time::sleep;
//! use std::sync::Mutex;
//! use std::time::Duration;
//!
//! #[sequent::main]
//! async fn main() {
//!     let lock = SerializingLock::new(Mutex::new(Vec::new()));
//!
//!     lock.acquire(
//!         |list, finish| {
//!             task::spawn(async move {
//!                 sleep(Duration::from_millis(10)).await;
//!                 list.lock().unwrap().push("first");
//!                 finish.done();
//!             });
//!             Ok(())
//!         },
//!         |result| println!("first finished: {result:?}"),
//!     );
//!
//!     // Runs only once the first critical section has finished.
//!     let result = lock
//!         .run(|list| async move {
//!             list.lock().unwrap().push("second");
//!             Ok(())
//!         })
//!         .await;
//!
//!     assert!(result.is_ok());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`sync`]: The serializing lock and a oneshot channel
//! - [`task`]: Spawning tasks onto the runtime
//! - [`time`]: Sleep and timeout
//! - [`error`]: Error types surfaced to completion callbacks
//!
//! ## Getting Started
//!
//! ```toml
//! [dependencies]
//! sequent = { git = "https://github.com/Nebula-ecosystem/Sequent", package = "sequent" }
//! ```

mod driver;
mod runtime;

pub mod error;
pub mod sync;
pub mod time;

pub use runtime::builder::RuntimeBuilder;
pub use runtime::core::Runtime;
pub use runtime::task;

pub use sequent_macros::*;
