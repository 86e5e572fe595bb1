//! The task scheduler: public API, shared state, and the fiber entry loop.
//!
//! `TaskScheduler::new` builds everything up front: the ready queue, the
//! waiting list, a fixed-size pool of fibers, and one pinned worker thread
//! per logical core. Submitters push `(task, counter)` bundles onto the
//! ready queue; pool fibers drain it, executing each task to completion and
//! decrementing its counter. A task that waits on a counter parks its fiber
//! on the waiting list instead of blocking the worker, and every fiber
//! re-checks the waiting list before dequeuing fresh work.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam::deque::{Injector, Steal};
use crossbeam::utils::Backoff;

use crate::counter::Counter;
use crate::error::SchedulerError;
use crate::fiber::{Fiber, SwitchDirective};
use crate::fiber_pool::FiberPool;
use crate::task::{ReadyTask, SendPtr, Task, TaskBundle};
use crate::wait_list::WaitList;
use crate::worker::Worker;

/// Default number of fibers in the pool. A tunable, not a constant of
/// correctness: it bounds how many tasks can be suspended mid-wait at once.
pub const DEFAULT_FIBER_POOL_SIZE: usize = 25;

const MAX_POLL_BACKOFF_US: u64 = 1000;

/// Construction-time configuration.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Worker thread count. `None` means one per detected logical CPU.
    pub worker_threads: Option<usize>,
    /// Number of fibers constructed at startup. The pool never grows.
    pub fiber_pool_size: usize,
    /// Stack size per fiber, in bytes.
    pub fiber_stack_size: usize,
    /// Pin worker `i` to logical core `i`. Pin failures are logged and the
    /// worker continues unpinned.
    pub pin_workers: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            worker_threads: None,
            fiber_pool_size: DEFAULT_FIBER_POOL_SIZE,
            fiber_stack_size: 512 * 1024,
            pin_workers: true,
        }
    }
}

/// State shared between the API, the workers, and every fiber.
pub(crate) struct Shared {
    pub(crate) ready: Injector<ReadyTask>,
    pub(crate) fiber_pool: FiberPool,
    pub(crate) wait_list: WaitList,
    pub(crate) quit: AtomicBool,
    pub(crate) services: Arc<dyn Any + Send + Sync>,
    pub(crate) live_fibers: Arc<AtomicUsize>,
}

impl Shared {
    pub(crate) fn submit_one(&self, task: Task) -> Counter {
        assert!(
            !self.quit.load(Ordering::SeqCst),
            "task submitted after quit"
        );
        let counter = Counter::new(1);
        self.ready.push(ReadyTask::Run(TaskBundle {
            task,
            counter: counter.clone(),
        }));
        counter
    }

    pub(crate) fn submit_group(&self, tasks: Vec<Task>) -> Counter {
        assert!(
            !self.quit.load(Ordering::SeqCst),
            "task group submitted after quit"
        );
        let counter = Counter::new(tasks.len() as u32);
        for task in tasks {
            self.ready.push(ReadyTask::Run(TaskBundle {
                task,
                counter: counter.clone(),
            }));
        }
        counter
    }

    pub(crate) fn wait_for_counter(&self, counter: &Counter, target: u32) {
        if counter.load() == target {
            return;
        }

        if Fiber::current().is_some() {
            // On a worker fiber: hand ourselves to the wait-park dispatch.
            // The caller's stack keeps `counter` alive across the park, so
            // the list entry's back-reference stays valid. We are resumed
            // only once a scan has observed the counter at the target.
            Fiber::switch_current(SwitchDirective::ParkOnCounter {
                counter: counter.raw(),
                target,
            });
        } else {
            // External thread (e.g. the driver): poll with backoff.
            let mut backoff_us = 1;
            while counter.load() != target {
                thread::sleep(Duration::from_micros(backoff_us));
                backoff_us = (backoff_us * 2).min(MAX_POLL_BACKOFF_US);
            }
        }
    }

    /// Non-blocking pop from the ready queue.
    pub(crate) fn try_pop(&self) -> Option<ReadyTask> {
        loop {
            match self.ready.steal() {
                Steal::Success(item) => return Some(item),
                Steal::Empty => return None,
                Steal::Retry => {}
            }
        }
    }
}

/// Body of every pool fiber.
///
/// Revived waiters take priority over fresh tasks, so parked work cannot be
/// starved by continuous submission. Switching away (to a revived fiber, or
/// into a park) always goes through [`Fiber::switch_current`]; the worker
/// performs the placement after this fiber's stack is vacated.
fn fiber_entry(shared: SendPtr<Shared>) {
    // SAFETY: the scheduler keeps the shared state alive until every worker
    // has been joined, and fibers only run on worker threads.
    let shared = unsafe { &*(shared.0 as *const Shared) };
    let backoff = Backoff::new();

    loop {
        if shared.quit.load(Ordering::SeqCst) {
            // Return to the worker's thread context; the worker exits.
            return;
        }

        if let Some(revived) = shared.wait_list.scan_and_revive(&shared.ready) {
            Fiber::switch_current(SwitchDirective::ReturnToPool { next: revived });
            backoff.reset();
            continue;
        }

        match shared.try_pop() {
            Some(ReadyTask::Resume(fiber)) => {
                Fiber::switch_current(SwitchDirective::ReturnToPool { next: fiber });
                backoff.reset();
            }
            Some(ReadyTask::Run(bundle)) => {
                bundle.execute(shared);
                backoff.reset();
            }
            None => backoff.snooze(),
        }
    }
}

/// The fiber-based task scheduler.
///
/// All resources (fibers, workers, queues) are owned by this value from
/// construction to [`quit`](TaskScheduler::quit); dropping the scheduler
/// without calling `quit` performs the same shutdown.
pub struct TaskScheduler {
    shared: Arc<Shared>,
    workers: Vec<Worker>,
}

impl TaskScheduler {
    /// Creates a scheduler with no services bundle.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        Self::with_services(config, Arc::new(()))
    }

    /// Creates a scheduler, threading `services` (heap handles, allocator
    /// handles, anything the tasks need) through every task context.
    pub fn with_services(
        config: SchedulerConfig,
        services: Arc<dyn Any + Send + Sync>,
    ) -> Result<Self, SchedulerError> {
        if config.fiber_pool_size == 0 {
            return Err(SchedulerError::InvalidConfig(
                "fiber_pool_size must be nonzero",
            ));
        }
        if config.fiber_stack_size == 0 {
            return Err(SchedulerError::InvalidConfig(
                "fiber_stack_size must be nonzero",
            ));
        }

        let core_ids = core_affinity::get_core_ids().unwrap_or_default();
        let worker_count = config.worker_threads.unwrap_or_else(|| {
            if core_ids.is_empty() {
                thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
            } else {
                core_ids.len()
            }
        });
        if worker_count == 0 {
            return Err(SchedulerError::InvalidConfig(
                "worker_threads must be nonzero",
            ));
        }

        let shared = Arc::new(Shared {
            ready: Injector::new(),
            fiber_pool: FiberPool::with_capacity(config.fiber_pool_size),
            wait_list: WaitList::new(),
            quit: AtomicBool::new(false),
            services,
            live_fibers: Arc::new(AtomicUsize::new(0)),
        });

        // Construct and release every pool fiber before any worker starts.
        let shared_ptr = SendPtr(Arc::as_ptr(&shared) as *mut Shared);
        for id in 0..config.fiber_pool_size {
            let fiber = Fiber::new(
                id,
                config.fiber_stack_size,
                Arc::clone(&shared.live_fibers),
                move || fiber_entry(shared_ptr),
            )
            .map_err(SchedulerError::StackAllocation)?;
            shared.fiber_pool.release(fiber);
        }

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let core_id = if config.pin_workers {
                core_ids.get(index).copied()
            } else {
                None
            };
            match Worker::spawn(index, core_id, Arc::clone(&shared)) {
                Ok(worker) => workers.push(worker),
                Err(err) => {
                    // Quiesce the workers that did start before reporting.
                    shared.quit.store(true, Ordering::SeqCst);
                    for worker in workers {
                        worker.join();
                    }
                    return Err(SchedulerError::ThreadSpawn(err));
                }
            }
        }

        Ok(TaskScheduler { shared, workers })
    }

    /// Queues a single task. The returned counter starts at 1 and is
    /// decremented when the task completes.
    pub fn submit_one(&self, task: Task) -> Counter {
        self.shared.submit_one(task)
    }

    /// Queues a group of tasks sharing one counter, initially the group
    /// size. The counter is returned after every bundle is enqueued.
    pub fn submit_group(&self, tasks: Vec<Task>) -> Counter {
        self.shared.submit_group(tasks)
    }

    /// Waits until `counter` reaches `target`.
    ///
    /// From inside a task this parks the calling fiber; from any other
    /// thread it polls with exponential backoff.
    pub fn wait_for_counter(&self, counter: &Counter, target: u32) {
        self.shared.wait_for_counter(counter, target);
    }

    /// Number of worker threads.
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Signals every worker to quit and joins them.
    ///
    /// In-flight tasks run to completion first; queued tasks that no worker
    /// has started may be discarded. All fibers are destroyed when the
    /// scheduler is dropped.
    pub fn quit(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.shared.quit.store(true, Ordering::SeqCst);
        for worker in self.workers.drain(..) {
            worker.join();
        }
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
