use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use fibertask::{SchedulerConfig, Task, TaskArg, TaskContext, TaskScheduler};

/// Stand-in for the engine-side service handles (heap, frame allocator)
/// threaded through every task.
struct DemoServices {
    inner_runs: AtomicUsize,
}

/// Synthetic load.
fn spin(iterations: u32) {
    let mut k = 0u32;
    for _ in 0..iterations {
        k = std::hint::black_box(k + 1);
    }
}

fn second_level(ctx: &TaskContext) {
    spin(100_000);
    if let Some(services) = ctx.services::<DemoServices>() {
        services.inner_runs.fetch_add(1, Ordering::SeqCst);
    }
}

fn first_level(ctx: &TaskContext) {
    spin(1_000_000);

    let tasks: Vec<Task> = (0..10)
        .map(|_| Task::new(second_level, TaskArg::null()))
        .collect();
    let counter = ctx.submit_group(tasks);
    ctx.wait_for_counter(&counter, 0);
}

fn main() {
    let services = Arc::new(DemoServices {
        inner_runs: AtomicUsize::new(0),
    });
    let scheduler = TaskScheduler::with_services(SchedulerConfig::default(), services.clone())
        .expect("failed to initialize scheduler");

    println!(
        "fibertask demo: {} workers, 10 frames of nested task groups\n",
        scheduler.num_workers()
    );

    for frame in 0..10 {
        let start = Instant::now();

        let tasks: Vec<Task> = (0..10)
            .map(|_| Task::new(first_level, TaskArg::null()))
            .collect();
        let counter = scheduler.submit_group(tasks);
        scheduler.wait_for_counter(&counter, 0);

        println!("frame {frame}: {:?}", start.elapsed());
    }

    scheduler.quit();
    println!(
        "\nran {} inner tasks",
        services.inner_runs.load(Ordering::SeqCst)
    );
}
