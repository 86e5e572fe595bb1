//! # fibertask - Fiber-Based Task Scheduler
//!
//! A task scheduler for CPU-bound parallel workloads where tasks frequently
//! wait on each other but must never block an OS thread. Worker threads
//! pinned to individual cores execute short tasks on user-space stacks
//! (fibers); a task that waits on a counter parks its fiber and frees the
//! thread to pick up other ready work.
//!
//! ## Architecture
//!
//! - **Counters**: atomic completion counters, one per submitted task group
//! - **Ready queue**: lock-free MPMC bag of `(task, counter)` bundles
//! - **Fiber pool**: fixed-size blocking queue of idle fibers
//! - **Waiting list**: mutex-guarded list of fibers parked on counters,
//!   re-checked by every fiber before it dequeues fresh work
//! - **Workers**: one pinned OS thread per logical core, hosting one fiber
//!   at a time and performing fiber placement only after the departing
//!   fiber has switched off its own stack
//!
//! ## Example
//!
//! ```no_run
//! use fibertask::{SchedulerConfig, Task, TaskScheduler};
//!
//! let scheduler = TaskScheduler::new(SchedulerConfig::default()).unwrap();
//!
//! let counter = scheduler.submit_one(Task::from_closure(|_ctx| {
//!     println!("hello from a fiber");
//! }));
//! scheduler.wait_for_counter(&counter, 0);
//!
//! scheduler.quit();
//! ```

pub mod context;
pub mod counter;
pub mod error;
pub mod scheduler;
pub mod task;

mod fiber;
mod fiber_pool;
mod wait_list;
mod worker;

pub use context::TaskContext;
pub use counter::Counter;
pub use error::SchedulerError;
pub use scheduler::{DEFAULT_FIBER_POOL_SIZE, SchedulerConfig, TaskScheduler};
pub use task::{Task, TaskArg, TaskFn};

#[cfg(test)]
mod tests;
