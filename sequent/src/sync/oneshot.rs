//! Single-use channel for handing one value to one awaiting task.
//!
//! ```rust,ignore
//! let (sender, receiver) = oneshot::channel();
//!
//! task::spawn(async move {
//!     let _ = sender.send(42);
//! });
//!
//! assert_eq!(receiver.await, Ok(42));
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};
use thiserror::Error;

/// The sender was dropped without sending a value.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("oneshot sender dropped without sending a value")]
pub struct RecvError;

struct State<T> {
    /// The value, once sent and until received.
    value: Option<T>,

    /// Waker of the receiver awaiting the value.
    waker: Option<Waker>,

    /// The sender is gone, either after sending or by being dropped.
    sender_gone: bool,

    receiver_gone: bool,
}

struct Inner<T> {
    state: Mutex<State<T>>,
}

impl<T> Inner<T> {
    fn state(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Sending half of a oneshot channel.
pub struct Sender<T> {
    inner: Arc<Inner<T>>,
}

/// Receiving half of a oneshot channel; a future resolving to the value.
pub struct Receiver<T> {
    inner: Arc<Inner<T>>,
}

/// Creates a connected sender/receiver pair.
pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let inner = Arc::new(Inner {
        state: Mutex::new(State {
            value: None,
            waker: None,
            sender_gone: false,
            receiver_gone: false,
        }),
    });

    (
        Sender {
            inner: inner.clone(),
        },
        Receiver { inner },
    )
}

impl<T> Sender<T> {
    /// Sends `value` to the receiver.
    ///
    /// Returns the value back if the receiver has already been dropped.
    pub fn send(self, value: T) -> Result<(), T> {
        let waker = {
            let mut state = self.inner.state();

            if state.receiver_gone {
                return Err(value);
            }

            state.value = Some(value);
            state.sender_gone = true;
            state.waker.take()
        };

        if let Some(waker) = waker {
            waker.wake();
        }

        Ok(())
    }

    /// Returns `true` if the receiver has been dropped.
    pub fn is_closed(&self) -> bool {
        self.inner.state().receiver_gone
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        let waker = {
            let mut state = self.inner.state();

            if state.sender_gone {
                return;
            }

            state.sender_gone = true;
            state.waker.take()
        };

        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<T> Future for Receiver<T> {
    type Output = Result<T, RecvError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.inner.state();

        if let Some(value) = state.value.take() {
            return Poll::Ready(Ok(value));
        }

        if state.sender_gone {
            return Poll::Ready(Err(RecvError));
        }

        state.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        let mut state = self.inner.state();
        state.receiver_gone = true;
        state.value = None;
    }
}
