//! Time utilities.
//!
//! This module provides timer-based futures driven by the runtime:
//! - [`sleep`] for suspending a task until a deadline,
//! - [`timeout`] for bounding how long a future may run.

mod sleep;
mod timeout;

#[doc(inline)]
pub use sleep::{Sleep, sleep};

#[doc(inline)]
pub use timeout::{Elapsed, Timeout, timeout};
