//! Error type for scheduler construction.

use std::io;

/// Errors surfaced by [`TaskScheduler::new`](crate::TaskScheduler::new).
///
/// Startup is the only fallible phase: once the scheduler is running, task
/// submission and waiting cannot fail (misuse panics, task panics abort).
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("invalid scheduler configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("failed to allocate a fiber stack")]
    StackAllocation(#[source] io::Error),
    #[error("failed to spawn a worker thread")]
    ThreadSpawn(#[source] io::Error),
}
