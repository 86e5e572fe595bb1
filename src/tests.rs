//! Integration tests that need crate internals: fiber accounting across
//! shutdown, and waiting-list bookkeeping while fibers are parked.

use crate::{SchedulerConfig, Task, TaskScheduler};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

fn test_config(workers: usize, pool: usize) -> SchedulerConfig {
    SchedulerConfig {
        worker_threads: Some(workers),
        fiber_pool_size: pool,
        pin_workers: false,
        ..SchedulerConfig::default()
    }
}

#[test]
fn test_quit_releases_every_fiber() {
    let scheduler = TaskScheduler::new(test_config(2, 8)).expect("init failed");
    let ledger = Arc::clone(&scheduler.shared().live_fibers);
    assert_eq!(ledger.load(Ordering::SeqCst), 8);

    let ran = Arc::new(AtomicUsize::new(0));
    let tasks = (0..16)
        .map(|_| {
            let ran = ran.clone();
            Task::from_closure(move |_ctx| {
                ran.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();
    let counter = scheduler.submit_group(tasks);
    scheduler.wait_for_counter(&counter, 0);
    assert_eq!(ran.load(Ordering::SeqCst), 16);

    scheduler.quit();
    assert_eq!(ledger.load(Ordering::SeqCst), 0);
}

#[test]
fn test_quit_releases_fibers_after_parked_waits() {
    let scheduler = TaskScheduler::new(test_config(2, 8)).expect("init failed");
    let ledger = Arc::clone(&scheduler.shared().live_fibers);

    // Tasks that park mid-body exercise the waiting list before quit.
    let tasks = (0..4)
        .map(|_| {
            Task::from_closure(move |ctx| {
                let inner = ctx.submit_group(vec![
                    Task::from_closure(|_ctx| {}),
                    Task::from_closure(|_ctx| {}),
                ]);
                ctx.wait_for_counter(&inner, 0);
            })
        })
        .collect();
    let counter = scheduler.submit_group(tasks);
    scheduler.wait_for_counter(&counter, 0);

    scheduler.quit();
    assert_eq!(ledger.load(Ordering::SeqCst), 0);
}

#[test]
fn test_parked_waiter_revived_after_counter_reaches_target() {
    let scheduler = TaskScheduler::new(test_config(2, 8)).expect("init failed");

    let gate = Arc::new(AtomicBool::new(false));
    let resumed = Arc::new(AtomicBool::new(false));

    let gate_in_task = gate.clone();
    let slow = scheduler.submit_group(vec![Task::from_closure(move |_ctx| {
        while !gate_in_task.load(Ordering::SeqCst) {
            std::thread::yield_now();
        }
    })]);

    let resumed_in_task = resumed.clone();
    let slow_in_task = slow.clone();
    let waiter = scheduler.submit_one(Task::from_closure(move |ctx| {
        ctx.wait_for_counter(&slow_in_task, 0);
        resumed_in_task.store(true, Ordering::SeqCst);
    }));

    // The waiter must end up parked on the waiting list, not completed.
    let deadline = Instant::now() + Duration::from_secs(2);
    while scheduler.shared().wait_list.len() == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(scheduler.shared().wait_list.len(), 1);
    assert!(!resumed.load(Ordering::SeqCst));

    gate.store(true, Ordering::SeqCst);
    scheduler.wait_for_counter(&waiter, 0);
    assert!(resumed.load(Ordering::SeqCst));
    assert_eq!(scheduler.shared().wait_list.len(), 0);

    scheduler.quit();
}

#[test]
fn test_fibers_return_to_pool_when_idle() {
    let scheduler = TaskScheduler::new(test_config(2, 8)).expect("init failed");

    let counter = scheduler.submit_group(
        (0..32)
            .map(|_| Task::from_closure(|_ctx| {}))
            .collect(),
    );
    scheduler.wait_for_counter(&counter, 0);

    // Each worker holds one fiber while idling; the rest must be pooled.
    let deadline = Instant::now() + Duration::from_secs(2);
    while scheduler.shared().fiber_pool.idle_count() < 6 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert!(scheduler.shared().fiber_pool.idle_count() >= 6);

    scheduler.quit();
}
