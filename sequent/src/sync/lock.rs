use crate::error::{BoxError, CallbackFailure, LockError, panic_message};
use crate::runtime::task::{self, JoinHandle};
use crate::sync::oneshot;
use crate::time::sleep;

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

/// Holder timeout used when none (or a zero duration) is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

type Work<T> = Box<dyn FnOnce(Arc<T>, Finish<T>) -> Result<(), BoxError> + Send>;
type Completion = Box<dyn FnOnce(Result<(), LockError>) + Send>;
type ExceptionHandler = Arc<dyn Fn(CallbackFailure) + Send + Sync>;

/// Construction options for a [`SerializingLock`].
///
/// # Examples
///
/// ```rust,ignore
/// let options = LockOptions::new()
///     .timeout(Duration::from_millis(20))
///     .name("inventory");
///
/// let lock = SerializingLock::with_options(Mutex::new(Vec::new()), options);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LockOptions {
    timeout: Option<Duration>,
    name: Option<String>,
}

impl LockOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum time a task may hold the lock before it is evicted.
    ///
    /// A zero duration means "unset" and falls back to [`DEFAULT_TIMEOUT`].
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Label attached to every log event emitted by the lock.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn resolved_timeout(&self) -> Duration {
        self.timeout
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or(DEFAULT_TIMEOUT)
    }
}

/// A unit of work waiting for the lock.
struct QueuedTask<T> {
    work: Work<T>,
    completion: Completion,
}

/// The task currently allowed to run its critical section.
struct Holder {
    /// Generation the holder was granted under.
    generation: u64,

    /// When the lock was granted.
    since: Instant,

    completion: Completion,

    /// Timeout check scheduled for this holder.
    watchdog: Option<JoinHandle<()>>,
}

struct State<T> {
    holder: Option<Holder>,
    pending: VecDeque<QueuedTask<T>>,

    /// Advanced on every grant; completion signals and watchdogs compare
    /// against it to detect that their holder is gone.
    generation: u64,

    /// A `drain` loop is granting queued tasks further up the stack.
    draining: bool,

    exception_handler: Option<ExceptionHandler>,
}

struct Shared<T> {
    target: Arc<T>,
    timeout: Duration,
    name: Option<String>,
    state: Mutex<State<T>>,
}

/// Serializes asynchronous critical sections against one shared target.
///
/// Work submitted through [`acquire`](Self::acquire) runs one at a time,
/// in submission order. Each unit of work receives the target and a
/// [`Finish`] signal, suspends as long as it needs, and calls the signal
/// to hand the lock to the next queued task. A holder that does not finish
/// within the configured timeout is evicted and its completion receives
/// [`LockError::Timeout`].
///
/// `SerializingLock` is a cheap handle: clones share the same target,
/// queue and holder.
///
/// The lock orders access, it does not guard memory: the target is handed
/// out as `Arc<T>`, so `T` carries its own interior mutability (for
/// example `Mutex<Vec<_>>`).
pub struct SerializingLock<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for SerializingLock<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

/// One-shot completion signal handed to a unit of work.
///
/// Calling it releases the lock, delivers the result to the task's
/// completion callback and grants the lock to the next queued task.
///
/// Only the first call for a given holder has any effect. Later calls
/// (from a clone, or after the watchdog evicted the holder) are ignored
/// and return `false`.
pub struct Finish<T> {
    shared: Arc<Shared<T>>,
    generation: u64,
}

impl<T> Clone for Finish<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            generation: self.generation,
        }
    }
}

impl<T: Send + Sync + 'static> Finish<T> {
    /// Reports success.
    pub fn done(self) -> bool {
        self.finish(Ok(()))
    }

    /// Reports an application error, delivered as [`LockError::Work`].
    pub fn fail(self, err: impl Into<BoxError>) -> bool {
        self.finish(Err(err.into()))
    }

    /// Reports the outcome of the critical section.
    ///
    /// Returns `true` if this call released the lock, `false` if the
    /// holder had already finished or been evicted.
    pub fn finish(self, result: Result<(), BoxError>) -> bool {
        self.shared
            .complete(self.generation, result.map_err(LockError::Work))
    }
}

impl<T> fmt::Debug for Finish<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Finish")
            .field("generation", &self.generation)
            .finish()
    }
}

impl<T: Send + Sync + 'static> SerializingLock<T> {
    /// Wraps `target` with the default timeout of one second.
    pub fn new(target: T) -> Self {
        Self::with_options(target, LockOptions::default())
    }

    /// Wraps `target` with explicit options.
    pub fn with_options(target: T, options: LockOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                target: Arc::new(target),
                timeout: options.resolved_timeout(),
                name: options.name,
                state: Mutex::new(State {
                    holder: None,
                    pending: VecDeque::new(),
                    generation: 0,
                    draining: false,
                    exception_handler: None,
                }),
            }),
        }
    }

    /// Submits a critical section.
    ///
    /// If the lock is free, `work` starts **synchronously**, before this
    /// call returns. Otherwise the task is appended to the queue and starts
    /// once every task queued before it has finished or been evicted.
    ///
    /// A holder that has overrun the timeout is evicted first. Its release
    /// hands the lock to the head of the queue, so with tasks already
    /// queued this call still waits its turn behind them.
    ///
    /// `work` receives the target and a [`Finish`] signal it must call once
    /// the critical section is over. Returning `Err`, or panicking, from
    /// `work` itself counts as finishing with that error.
    ///
    /// `completion` is called exactly once with the outcome: `Ok(())`, the
    /// work's error, or [`LockError::Timeout`].
    ///
    /// # Panics
    ///
    /// Panics if the lock is free and this is called outside of a running
    /// runtime, since the holder's watchdog cannot be scheduled.
    pub fn acquire<W, C>(&self, work: W, completion: C)
    where
        W: FnOnce(Arc<T>, Finish<T>) -> Result<(), BoxError> + Send + 'static,
        C: FnOnce(Result<(), LockError>) + Send + 'static,
    {
        self.shared.acquire(QueuedTask {
            work: Box::new(work),
            completion: Box::new(completion),
        });
    }

    /// Runs an async critical section and waits for its outcome.
    ///
    /// Once the lock is granted, the future returned by `work` is spawned
    /// onto the runtime and the holder finishes with its result. The
    /// returned future resolves with what a completion callback would have
    /// received, so a timed-out `work` yields [`LockError::Timeout`] while
    /// its spawned future keeps running.
    pub async fn run<F, Fut>(&self, work: F) -> Result<(), LockError>
    where
        F: FnOnce(Arc<T>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();

        self.acquire(
            move |target, finish| {
                task::spawn(async move {
                    finish.finish(work(target).await);
                });
                Ok(())
            },
            move |result| {
                let _ = sender.send(result);
            },
        );

        receiver.await?
    }

    /// Registers the handler for panicking completion callbacks.
    ///
    /// Only one handler is kept; the last registration wins. Without a
    /// handler, failures are logged with `tracing::error!` and dropped.
    pub fn on_exception<H>(&self, handler: H)
    where
        H: Fn(CallbackFailure) + Send + Sync + 'static,
    {
        self.shared.state().exception_handler = Some(Arc::new(handler));
    }

    /// The protected target.
    pub fn target(&self) -> &Arc<T> {
        &self.shared.target
    }

    /// Maximum time a task may hold the lock.
    pub fn timeout(&self) -> Duration {
        self.shared.timeout
    }

    /// Returns `true` if a task holds the lock and has not overrun the
    /// timeout.
    pub fn is_locked(&self) -> bool {
        let timeout = self.shared.timeout;
        self.shared
            .state()
            .holder
            .as_ref()
            .is_some_and(|holder| holder.since.elapsed() < timeout)
    }

    /// Number of tasks waiting for the lock.
    pub fn queued(&self) -> usize {
        self.shared.state().pending.len()
    }
}

impl<T> fmt::Debug for SerializingLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state();

        f.debug_struct("SerializingLock")
            .field("name", &self.shared.name)
            .field("timeout", &self.shared.timeout)
            .field("held", &state.holder.is_some())
            .field("queued", &state.pending.len())
            .finish()
    }
}

impl<T> Shared<T> {
    fn state(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("anonymous")
    }
}

impl<T: Send + Sync + 'static> Shared<T> {
    fn acquire(self: &Arc<Self>, task: QueuedTask<T>) {
        self.evict_lapsed();

        let (generation, work) = {
            let mut state = self.state();

            if state.holder.is_some() {
                state.pending.push_back(task);
                tracing::debug!(
                    lock = self.label(),
                    queued = state.pending.len(),
                    "lock busy, task queued"
                );
                return;
            }

            let QueuedTask { work, completion } = task;
            (self.grant(&mut state, completion), work)
        };

        self.start(generation, work);
    }

    /// Makes `completion`'s task the holder and arms its watchdog.
    ///
    /// Called with the state locked; the work itself is started by the
    /// caller once the lock is released.
    fn grant(self: &Arc<Self>, state: &mut State<T>, completion: Completion) -> u64 {
        state.generation = state.generation.wrapping_add(1);
        let generation = state.generation;

        state.holder = Some(Holder {
            generation,
            since: Instant::now(),
            completion,
            watchdog: Some(self.arm_watchdog(generation, self.timeout)),
        });

        tracing::debug!(lock = self.label(), generation, "lock granted");
        generation
    }

    /// Runs the holder's work, turning a synchronous failure into a
    /// completion of the same generation.
    fn start(self: &Arc<Self>, generation: u64, work: Work<T>) {
        let finish = Finish {
            shared: self.clone(),
            generation,
        };
        let target = self.target.clone();

        let error = match panic::catch_unwind(AssertUnwindSafe(|| work(target, finish))) {
            Ok(Ok(())) => return,
            Ok(Err(err)) => LockError::Work(err),
            Err(payload) => LockError::Panicked(panic_message(payload.as_ref())),
        };

        self.complete(generation, Err(error));
    }

    fn arm_watchdog(self: &Arc<Self>, generation: u64, delay: Duration) -> JoinHandle<()> {
        let shared: Weak<Self> = Arc::downgrade(self);

        task::spawn(async move {
            sleep(delay).await;

            if let Some(shared) = shared.upgrade() {
                shared.expire(generation);
            }
        })
    }

    /// Ends the holder cycle of `generation` with `result`.
    fn complete(self: &Arc<Self>, generation: u64, result: Result<(), LockError>) -> bool {
        let holder = {
            let mut state = self.state();

            if !state
                .holder
                .as_ref()
                .is_some_and(|holder| holder.generation == generation)
            {
                tracing::debug!(lock = self.label(), generation, "stale finish ignored");
                return false;
            }

            state.holder.take()
        };

        let Some(mut holder) = holder else {
            return false;
        };

        if let Some(watchdog) = holder.watchdog.take() {
            watchdog.abort();
        }

        self.release(holder, result);
        true
    }

    /// Watchdog entry point: evicts the holder of `generation` if it is
    /// still there and has overrun the timeout.
    fn expire(self: &Arc<Self>, generation: u64) {
        let holder = {
            let mut state = self.state();

            let Some(holder) = state
                .holder
                .as_ref()
                .filter(|holder| holder.generation == generation)
            else {
                return;
            };

            let elapsed = holder.since.elapsed();
            if elapsed < self.timeout {
                let watchdog = self.arm_watchdog(generation, self.timeout - elapsed);
                if let Some(holder) = state.holder.as_mut() {
                    holder.watchdog = Some(watchdog);
                }
                return;
            }

            state.holder.take()
        };

        if let Some(holder) = holder {
            self.evict(holder);
        }
    }

    /// Evicts a holder that overran the timeout without its watchdog
    /// having fired yet, so the next task does not wait on the timer.
    fn evict_lapsed(self: &Arc<Self>) {
        let holder = {
            let mut state = self.state();

            if !state
                .holder
                .as_ref()
                .is_some_and(|holder| holder.since.elapsed() >= self.timeout)
            {
                return;
            }

            state.holder.take()
        };

        if let Some(mut holder) = holder {
            if let Some(watchdog) = holder.watchdog.take() {
                watchdog.abort();
            }
            self.evict(holder);
        }
    }

    fn evict(self: &Arc<Self>, holder: Holder) {
        tracing::warn!(
            lock = self.label(),
            generation = holder.generation,
            timeout = ?self.timeout,
            "holder timed out, evicting"
        );

        self.release(holder, Err(LockError::Timeout(self.timeout)));
    }

    /// Delivers the outcome of a finished holder and hands the lock on.
    fn release(self: &Arc<Self>, holder: Holder, result: Result<(), LockError>) {
        tracing::debug!(
            lock = self.label(),
            generation = holder.generation,
            held_for = ?holder.since.elapsed(),
            ok = result.is_ok(),
            "lock released"
        );

        self.dispatch(holder.completion, result);
        self.drain();
    }

    /// Runs a completion callback, containing any panic it raises.
    fn dispatch(&self, completion: Completion, result: Result<(), LockError>) {
        let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| completion(result))) else {
            return;
        };

        let failure = CallbackFailure::from_panic(payload.as_ref());
        let handler = self.state().exception_handler.clone();

        match handler {
            Some(handler) => {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(failure))) {
                    tracing::error!(
                        lock = self.label(),
                        panic = %panic_message(payload.as_ref()),
                        "exception handler panicked"
                    );
                }
            }
            None => {
                tracing::error!(lock = self.label(), error = %failure, "unhandled completion failure");
            }
        }
    }

    /// Grants the lock to queued tasks for as long as it is free.
    ///
    /// Work that finishes synchronously releases the lock from inside
    /// `start`. That nested release only dispatches its completion and
    /// leaves the next grant to the loop already running below it, so the
    /// stack depth stays constant however long the queue is.
    ///
    /// A completion callback may have re-acquired the lock while it ran;
    /// the queue is then left as is and drains when that holder finishes.
    fn drain(self: &Arc<Self>) {
        {
            let mut state = self.state();
            if state.draining {
                return;
            }
            state.draining = true;
        }

        loop {
            let (generation, work) = {
                let mut state = self.state();

                let next = if state.holder.is_none() {
                    state.pending.pop_front()
                } else {
                    None
                };

                let Some(QueuedTask { work, completion }) = next else {
                    state.draining = false;
                    return;
                };

                (self.grant(&mut state, completion), work)
            };

            self.start(generation, work);
        }
    }
}
