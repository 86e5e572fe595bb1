//! End-to-end scheduling tests: submission, execution, counter completion.

use fibertask::{SchedulerConfig, Task, TaskArg, TaskContext, TaskScheduler};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

fn config(workers: usize) -> SchedulerConfig {
    SchedulerConfig {
        worker_threads: Some(workers),
        pin_workers: false,
        ..SchedulerConfig::default()
    }
}

#[test]
fn test_single_task_sets_flag() {
    let scheduler = TaskScheduler::new(config(2)).expect("init failed");
    let flag = Arc::new(AtomicBool::new(false));
    let flag_in_task = flag.clone();

    let counter = scheduler.submit_one(Task::from_closure(move |_ctx| {
        flag_in_task.store(true, Ordering::SeqCst);
    }));
    scheduler.wait_for_counter(&counter, 0);

    assert!(flag.load(Ordering::SeqCst));
    assert_eq!(counter.load(), 0);
    scheduler.quit();
}

#[test]
fn test_group_of_100_increments() {
    let scheduler = TaskScheduler::new(config(4)).expect("init failed");
    let x = Arc::new(AtomicUsize::new(0));

    let tasks = (0..100)
        .map(|_| {
            let x = x.clone();
            Task::from_closure(move |_ctx| {
                x.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();
    let counter = scheduler.submit_group(tasks);
    scheduler.wait_for_counter(&counter, 0);

    assert_eq!(x.load(Ordering::SeqCst), 100);
    assert_eq!(counter.load(), 0);
    scheduler.quit();
}

#[test]
fn test_each_task_runs_exactly_once() {
    let scheduler = TaskScheduler::new(config(4)).expect("init failed");
    let slots: Arc<Vec<AtomicUsize>> =
        Arc::new((0..100).map(|_| AtomicUsize::new(0)).collect());

    let tasks = (0..100)
        .map(|i| {
            let slots = slots.clone();
            Task::from_closure(move |_ctx| {
                slots[i].fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();
    let counter = scheduler.submit_group(tasks);
    scheduler.wait_for_counter(&counter, 0);

    for (i, slot) in slots.iter().enumerate() {
        assert_eq!(slot.load(Ordering::SeqCst), 1, "task {i} run count");
    }
    scheduler.quit();
}

#[test]
fn test_many_more_tasks_than_workers() {
    let scheduler = TaskScheduler::new(config(4)).expect("init failed");
    let ran = Arc::new(AtomicUsize::new(0));

    let num_tasks = 10_000;
    let tasks = (0..num_tasks)
        .map(|_| {
            let ran = ran.clone();
            Task::from_closure(move |_ctx| {
                ran.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();
    let counter = scheduler.submit_group(tasks);
    scheduler.wait_for_counter(&counter, 0);

    assert_eq!(ran.load(Ordering::SeqCst), num_tasks);
    assert_eq!(counter.load(), 0);
    scheduler.quit();
}

fn store_answer(ctx: &TaskContext) {
    let slot = unsafe { &*ctx.arg().cast::<AtomicUsize>() };
    slot.store(42, Ordering::SeqCst);
}

#[test]
fn test_entry_point_task_with_arg() {
    let scheduler = TaskScheduler::new(config(2)).expect("init failed");
    let slot: &'static AtomicUsize = Box::leak(Box::new(AtomicUsize::new(0)));

    let counter = scheduler.submit_one(Task::new(
        store_answer,
        TaskArg::new(slot as *const AtomicUsize as *mut AtomicUsize),
    ));
    scheduler.wait_for_counter(&counter, 0);

    assert_eq!(slot.load(Ordering::SeqCst), 42);
    scheduler.quit();
}

struct Services {
    touched: AtomicUsize,
}

#[test]
fn test_services_reach_every_task() {
    let services = Arc::new(Services {
        touched: AtomicUsize::new(0),
    });
    let scheduler =
        TaskScheduler::with_services(config(2), services.clone()).expect("init failed");

    let tasks = (0..10)
        .map(|_| {
            Task::from_closure(|ctx| {
                if let Some(services) = ctx.services::<Services>() {
                    services.touched.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    let counter = scheduler.submit_group(tasks);
    scheduler.wait_for_counter(&counter, 0);

    assert_eq!(services.touched.load(Ordering::SeqCst), 10);
    scheduler.quit();
}
