use sequent::RuntimeBuilder;
use sequent::task;
use sequent::time::{Elapsed, sleep, timeout};

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[test]
fn block_on_returns_the_output() {
    let runtime = RuntimeBuilder::new().build();
    assert_eq!(runtime.block_on(async { 21 * 2 }), 42);
}

#[test]
fn spawn_from_outside_the_context() {
    let runtime = RuntimeBuilder::new().build();

    let handle = runtime.spawn(async {
        sleep(Duration::from_millis(2)).await;
        "spawned"
    });

    assert_eq!(runtime.block_on(handle), "spawned");
}

#[sequent::test]
async fn spawned_tasks_can_be_joined() {
    let handles: Vec<_> = (0..10u32).map(|i| task::spawn(async move { i * i })).collect();

    let mut total = 0;
    for handle in handles {
        total += handle.await;
    }

    assert_eq!(total, 285);
}

#[sequent::test]
async fn sleep_waits_at_least_the_duration() {
    let start = Instant::now();
    sleep(Duration::from_millis(15)).await;
    assert!(start.elapsed() >= Duration::from_millis(15));
}

#[sequent::test]
async fn zero_sleep_completes_immediately() {
    let start = Instant::now();
    sleep(Duration::ZERO).await;
    assert!(start.elapsed() < Duration::from_millis(50));
}

#[sequent::test]
async fn timeout_resolves_with_the_output() {
    let result = timeout(Duration::from_millis(50), async {
        sleep(Duration::from_millis(1)).await;
        7
    })
    .await;

    assert_eq!(result, Ok(7));
}

#[sequent::test]
async fn timeout_elapses_on_slow_futures() {
    let result = timeout(
        Duration::from_millis(5),
        sleep(Duration::from_millis(200)),
    )
    .await;

    assert_eq!(result, Err(Elapsed(Duration::from_millis(5))));
}

#[sequent::test]
async fn aborted_task_never_runs() {
    let ran = Arc::new(AtomicBool::new(false));

    let flag = ran.clone();
    let handle = task::spawn(async move {
        flag.store(true, Ordering::SeqCst);
    });
    handle.abort();

    sleep(Duration::from_millis(5)).await;
    assert!(!ran.load(Ordering::SeqCst));
}

#[sequent::test]
async fn aborting_a_sleeping_task_stops_it() {
    let steps = Arc::new(AtomicUsize::new(0));

    let counter = steps.clone();
    let handle = task::spawn(async move {
        counter.fetch_add(1, Ordering::SeqCst);
        sleep(Duration::from_millis(10)).await;
        counter.fetch_add(1, Ordering::SeqCst);
    });

    sleep(Duration::from_millis(2)).await;
    assert!(!handle.is_finished());
    handle.abort();

    sleep(Duration::from_millis(20)).await;
    assert_eq!(steps.load(Ordering::SeqCst), 1);
}

#[sequent::test]
async fn equal_deadlines_fire_in_registration_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let deadline = Duration::from_millis(5);

    let handles: Vec<_> = (0..5)
        .map(|i| {
            let order = order.clone();
            let sleep = sleep(deadline);
            task::spawn(async move {
                sleep.await;
                order.lock().unwrap().push(i);
            })
        })
        .collect();

    for handle in handles {
        handle.await;
    }

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

#[sequent::test(event_interval = 4)]
async fn small_event_interval_still_drains_everything() {
    let done = Arc::new(AtomicUsize::new(0));

    for _ in 0..32 {
        let done = done.clone();
        task::spawn(async move {
            sleep(Duration::from_millis(1)).await;
            done.fetch_add(1, Ordering::SeqCst);
        });
    }

    while done.load(Ordering::SeqCst) < 32 {
        sleep(Duration::from_millis(1)).await;
    }
}

#[sequent::test]
async fn finished_task_reports_it() {
    let handle = task::spawn(async {});
    sleep(Duration::from_millis(1)).await;
    assert!(handle.is_finished());
}

#[test]
#[should_panic(expected = "task failed")]
fn join_resumes_task_panic() {
    let runtime = RuntimeBuilder::new().build();

    runtime.block_on(async {
        task::spawn(async {
            panic!("task failed");
        })
        .await
    });
}

#[test]
#[should_panic(expected = "must be called within the context of a runtime")]
fn spawn_outside_runtime_panics() {
    let _ = task::spawn(async {});
}
