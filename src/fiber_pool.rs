//! Pool of idle fibers available for reuse.
//!
//! The pool is a blocking MPMC queue with a size fixed at scheduler
//! creation: every fiber is constructed and released up front, and the pool
//! never grows or shrinks. A worker with no pool fiber available blocks on
//! `acquire` until one frees up or the quit flag is raised; exhaustion is
//! fatal-by-blocking, so debug builds run a watchdog that reports prolonged
//! blocking at debug level.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};

use crate::fiber::Fiber;

const ACQUIRE_TICK: Duration = Duration::from_millis(10);
const WATCHDOG_PERIOD: Duration = Duration::from_millis(500);

pub(crate) struct FiberPool {
    tx: Sender<Box<Fiber>>,
    rx: Receiver<Box<Fiber>>,
    capacity: usize,
}

impl FiberPool {
    /// Creates an empty pool with room for `capacity` fibers. The scheduler
    /// seeds it with exactly `capacity` fibers before any worker starts.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = channel::bounded(capacity);
        FiberPool { tx, rx, capacity }
    }

    /// Takes an idle fiber, blocking until one is available.
    ///
    /// Returns `None` once `quit` is observed set, which is the point at
    /// which a worker with no fiber stops waiting and exits.
    pub(crate) fn acquire(&self, quit: &AtomicBool) -> Option<Box<Fiber>> {
        let mut blocked = Duration::ZERO;
        let mut next_report = WATCHDOG_PERIOD;
        loop {
            match self.rx.recv_timeout(ACQUIRE_TICK) {
                Ok(fiber) => return Some(fiber),
                Err(channel::RecvTimeoutError::Timeout) => {
                    if quit.load(Ordering::SeqCst) {
                        return None;
                    }
                    blocked += ACQUIRE_TICK;
                    if cfg!(debug_assertions) && blocked >= next_report {
                        log::debug!(
                            "fiber pool empty for {:?}: all {} fibers running or \
                             parked; pool may be undersized for the number of \
                             simultaneous waiters",
                            blocked,
                            self.capacity
                        );
                        next_report += WATCHDOG_PERIOD;
                    }
                }
                Err(channel::RecvTimeoutError::Disconnected) => {
                    unreachable!("fiber pool holds both channel ends")
                }
            }
        }
    }

    /// Returns a fiber to the pool.
    ///
    /// Never blocks: at most `capacity` fibers exist, so the channel always
    /// has room. Callers must only release fibers that have fully vacated
    /// their stacks.
    pub(crate) fn release(&self, fiber: Box<Fiber>) {
        self.tx
            .send(fiber)
            .expect("fiber pool holds both channel ends");
    }

    #[cfg(test)]
    pub(crate) fn idle_count(&self) -> usize {
        self.rx.len()
    }
}
