//! Error types surfaced by the serializing lock.
//!
//! A critical section can end in three ways that a caller observes through
//! its completion callback:
//!
//! - the work reported an application error ([`LockError::Work`]),
//! - the work panicked before reporting anything ([`LockError::Panicked`]),
//! - the watchdog evicted the holder ([`LockError::Timeout`]).
//!
//! Failures of the completion callback itself never reach the queue; they
//! are wrapped in a [`CallbackFailure`] and handed to the lock's exception
//! handler.

use crate::sync::oneshot::RecvError;

use std::any::Any;
use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;

/// Boxed application error reported by a critical section.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Outcome delivered to a completion callback when a critical section did
/// not finish cleanly.
#[derive(Error, Debug)]
pub enum LockError {
    /// The work returned an error or called [`Finish::fail`].
    ///
    /// The message is the application error's message, verbatim.
    ///
    /// [`Finish::fail`]: crate::sync::Finish::fail
    #[error("{0}")]
    Work(BoxError),

    /// The work panicked synchronously while being started.
    #[error("critical section panicked: {0}")]
    Panicked(String),

    /// The holder did not finish within the lock timeout and was evicted.
    #[error("lock timed out after {0:?}")]
    Timeout(Duration),

    /// The completion was dropped without ever being invoked.
    #[error(transparent)]
    Abandoned(#[from] RecvError),
}

impl LockError {
    /// Returns `true` if the holder was evicted by the watchdog.
    pub fn is_timeout(&self) -> bool {
        matches!(self, LockError::Timeout(_))
    }

    /// Returns the application error, if this is a work failure.
    pub fn work_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            LockError::Work(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// A completion callback panicked while receiving its result.
///
/// Handed to the handler registered with
/// [`SerializingLock::on_exception`](crate::sync::SerializingLock::on_exception).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("completion callback panicked: {message}")]
pub struct CallbackFailure {
    message: String,
}

impl CallbackFailure {
    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        Self {
            message: panic_message(payload),
        }
    }

    /// The panic message, or a placeholder for non-string payloads.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Extracts the message of a caught panic.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
