use super::core::Runtime;

/// Number of tasks polled between two timer checks by default.
const DEFAULT_EVENT_INTERVAL: usize = 61;

/// Builder for configuring and creating a runtime.
///
/// # Examples
///
/// ```rust,ignore
/// let runtime = RuntimeBuilder::new()
///     .event_interval(32)
///     .build();
/// ```
pub struct RuntimeBuilder {
    /// Maximum number of tasks run before the driver fires due timers.
    event_interval: usize,
}

impl RuntimeBuilder {
    /// Creates a new `RuntimeBuilder` with default configuration.
    pub fn new() -> Self {
        Self {
            event_interval: DEFAULT_EVENT_INTERVAL,
        }
    }

    /// Sets how many tasks run back to back before timers are checked.
    ///
    /// Lower values make timers fire closer to their deadline under a
    /// busy run queue, at the cost of more driver round trips.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn event_interval(mut self, n: usize) -> Self {
        assert!(n > 0, "event_interval must be > 0");

        self.event_interval = n;
        self
    }

    /// Builds the runtime with the configured options.
    pub fn build(self) -> Runtime {
        Runtime::new(self.event_interval)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
