mod common;

use common::{Completions, List, add, remove, snapshot};
use sequent::error::{CallbackFailure, LockError};
use sequent::sync::SerializingLock;
use sequent::task;
use sequent::time::sleep;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn add_task(lock: &SerializingLock<List>, item: char, delay: u64, completions: &Completions) {
    lock.acquire(
        move |list, finish| {
            add(list, item, delay, move || {
                finish.done();
            });
            Ok(())
        },
        completions.callback(),
    );
}

fn remove_task(lock: &SerializingLock<List>, item: char, delay: u64, completions: &Completions) {
    lock.acquire(
        move |list, finish| {
            remove(list, item, delay, move || {
                finish.done();
            });
            Ok(())
        },
        completions.callback(),
    );
}

#[sequent::test]
async fn synchronous_error_reaches_completion_and_queue_continues() {
    let lock = SerializingLock::new(common::list());
    let completions = Completions::new();

    remove_task(&lock, 'a', 10, &completions);
    add_task(&lock, 'a', 12, &completions);
    lock.acquire(|_, _| Err("Oops".into()), completions.callback());
    add_task(&lock, 'b', 5, &completions);

    completions.wait_for(4).await;

    assert_eq!(
        completions.messages(),
        vec![None, None, Some("Oops".to_string()), None]
    );
    assert_eq!(
        snapshot(lock.target()),
        vec!['b', 'c', 'd', 'e', 'f', 'g', 'a', 'b']
    );
}

#[sequent::test]
async fn completion_can_retry_failed_work() {
    let lock = SerializingLock::new(common::list());
    let completions = Completions::new();
    let retried = Arc::new(Mutex::new(None));

    remove_task(&lock, 'a', 10, &completions);

    let retry_lock = lock.clone();
    let retry_completions = completions.clone();
    let seen = retried.clone();
    lock.acquire(
        |_, _| Err("Wow...".into()),
        move |result| {
            *seen.lock().unwrap() = result.err().map(|err| err.to_string());
            add_task(&retry_lock, 'a', 12, &retry_completions);
        },
    );

    remove_task(&lock, 'b', 15, &completions);
    add_task(&lock, 'b', 5, &completions);

    completions.wait_for(4).await;

    assert_eq!(retried.lock().unwrap().as_deref(), Some("Wow..."));
    assert_eq!(
        snapshot(lock.target()),
        vec!['c', 'd', 'e', 'f', 'g', 'a', 'b']
    );
}

#[sequent::test]
async fn panicking_work_is_reported_as_failure() {
    let lock = SerializingLock::new(AtomicUsize::new(0));
    let completions = Completions::new();

    lock.acquire(|_, _| panic!("kaboom"), completions.callback());
    lock.acquire(
        |counter, finish| {
            counter.fetch_add(1, Ordering::SeqCst);
            finish.done();
            Ok(())
        },
        completions.callback(),
    );

    completions.wait_for(2).await;

    assert_eq!(
        completions.messages(),
        vec![Some("critical section panicked: kaboom".to_string()), None]
    );
    assert_eq!(lock.target().load(Ordering::SeqCst), 1);
}

#[sequent::test]
async fn asynchronous_failure_is_delivered_verbatim() {
    let lock = SerializingLock::new(());
    let outcome = Arc::new(Mutex::new(None));

    let seen = outcome.clone();
    lock.acquire(
        |_, finish| {
            task::spawn(async move {
                sleep(Duration::from_millis(2)).await;
                finish.fail("disk full");
            });
            Ok(())
        },
        move |result| *seen.lock().unwrap() = Some(result),
    );

    while outcome.lock().unwrap().is_none() {
        sleep(Duration::from_millis(1)).await;
    }

    let result = outcome.lock().unwrap().take().unwrap();
    let err = result.unwrap_err();
    assert!(matches!(err, LockError::Work(_)));
    assert!(!err.is_timeout());
    assert_eq!(err.to_string(), "disk full");
}

#[sequent::test]
async fn panicking_completion_reaches_exception_handler_once() {
    let lock = SerializingLock::new(());
    let completions = Completions::new();
    let failures = Arc::new(Mutex::new(Vec::<CallbackFailure>::new()));

    let recorded = failures.clone();
    lock.on_exception(move |failure| recorded.lock().unwrap().push(failure));

    lock.acquire(
        |_, finish| {
            task::spawn(async move {
                sleep(Duration::from_millis(2)).await;
                finish.done();
            });
            Ok(())
        },
        |_| panic!("boom"),
    );
    lock.acquire(
        |_, finish| {
            finish.done();
            Ok(())
        },
        completions.callback(),
    );

    completions.wait_for(1).await;

    let failures = failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].message(), "boom");
    assert_eq!(completions.messages(), vec![None]);
}

#[sequent::test]
async fn panicking_completion_without_handler_is_contained() {
    let lock = SerializingLock::new(());
    let completions = Completions::new();

    lock.acquire(
        |_, finish| {
            finish.done();
            Ok(())
        },
        |_| panic!("nobody listens"),
    );

    assert!(!lock.is_locked());

    lock.acquire(|_, _| Err("second".into()), completions.callback());

    completions.wait_for(1).await;
    assert_eq!(completions.messages(), vec![Some("second".to_string())]);
}

#[sequent::test]
async fn last_registered_exception_handler_wins() {
    let lock = SerializingLock::new(());
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    let counter = first.clone();
    lock.on_exception(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let counter = second.clone();
    lock.on_exception(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    for _ in 0..2 {
        lock.acquire(
            |_, finish| {
                finish.done();
                Ok(())
            },
            |_| panic!("again"),
        );
    }

    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 2);
}

#[sequent::test]
async fn panicking_exception_handler_does_not_stall_queue() {
    let lock = SerializingLock::new(());
    let completions = Completions::new();

    lock.on_exception(|_| panic!("handler is broken too"));

    lock.acquire(
        |_, finish| {
            task::spawn(async move {
                sleep(Duration::from_millis(1)).await;
                finish.done();
            });
            Ok(())
        },
        |_| panic!("callback"),
    );
    lock.acquire(
        |_, finish| {
            finish.done();
            Ok(())
        },
        completions.callback(),
    );

    completions.wait_for(1).await;
    assert_eq!(completions.messages(), vec![None]);
}
