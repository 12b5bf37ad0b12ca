//! Shared fixtures: an ordered list of letters and delayed mutations on it.

#![allow(dead_code)]

use sequent::error::LockError;
use sequent::task;
use sequent::time::{sleep, timeout};

use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ORIGINAL: [char; 7] = ['a', 'b', 'c', 'd', 'e', 'f', 'g'];

pub type List = Mutex<Vec<char>>;

pub fn list() -> List {
    Mutex::new(ORIGINAL.to_vec())
}

pub fn snapshot(list: &List) -> Vec<char> {
    list.lock().unwrap().clone()
}

/// Appends `item` after `delay_ms`, then calls `done`.
pub fn add(list: Arc<List>, item: char, delay_ms: u64, done: impl FnOnce() + Send + 'static) {
    task::spawn(async move {
        sleep(Duration::from_millis(delay_ms)).await;
        list.lock().unwrap().push(item);
        done();
    });
}

/// Removes the first `item` after `delay_ms`, then calls `done`.
pub fn remove(list: Arc<List>, item: char, delay_ms: u64, done: impl FnOnce() + Send + 'static) {
    task::spawn(async move {
        sleep(Duration::from_millis(delay_ms)).await;
        {
            let mut list = list.lock().unwrap();
            if let Some(pos) = list.iter().position(|&c| c == item) {
                list.remove(pos);
            }
        }
        done();
    });
}

/// Records the outcome of every completion callback it hands out.
#[derive(Clone, Default)]
pub struct Completions {
    results: Arc<Mutex<Vec<Result<(), LockError>>>>,
}

impl Completions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> impl FnOnce(Result<(), LockError>) + Send + 'static {
        let results = self.results.clone();
        move |result| results.lock().unwrap().push(result)
    }

    pub fn count(&self) -> usize {
        self.results.lock().unwrap().len()
    }

    /// Error messages in completion order, `None` for successes.
    pub fn messages(&self) -> Vec<Option<String>> {
        self.results
            .lock()
            .unwrap()
            .iter()
            .map(|result| result.as_ref().err().map(|err| err.to_string()))
            .collect()
    }

    pub fn timeouts(&self) -> usize {
        self.results
            .lock()
            .unwrap()
            .iter()
            .filter(|result| result.as_ref().is_err_and(LockError::is_timeout))
            .count()
    }

    /// Waits until `n` completions have been recorded.
    pub async fn wait_for(&self, n: usize) {
        let waited = timeout(Duration::from_secs(5), async {
            while self.count() < n {
                sleep(Duration::from_millis(1)).await;
            }
        })
        .await;

        assert!(waited.is_ok(), "only {} of {} completions arrived", self.count(), n);
    }
}
