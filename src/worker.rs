//! Worker threads: one per logical core, each hosting one fiber at a time.
//!
//! A worker's native thread stack is its scheduling context. It resumes a
//! fiber, and when the fiber suspends it performs the requested placement
//! before switching to the next fiber. The two dispatch arms (pool-return
//! and wait-park) run per-thread by construction, and only after `resume`
//! has returned, i.e. after the departing fiber has fully vacated its own
//! stack. Publishing the fiber any earlier would let another worker resume
//! it while its stack is still live.

use std::any::Any;
use std::io;
use std::panic;
use std::process;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use core_affinity::CoreId;

use crate::fiber::{Fiber, FiberState, SwitchDirective};
use crate::scheduler::Shared;
use crate::wait_list::WaitingTask;

/// An OS thread executing fibers, pinned to one logical core.
pub(crate) struct Worker {
    index: usize,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawns a worker thread bound to `core_id` (best effort).
    pub(crate) fn spawn(
        index: usize,
        core_id: Option<CoreId>,
        shared: Arc<Shared>,
    ) -> io::Result<Worker> {
        let handle = thread::Builder::new()
            .name(format!("fibertask-worker-{index}"))
            .spawn(move || {
                if let Some(core_id) = core_id {
                    if !core_affinity::set_for_current(core_id) {
                        log::warn!(
                            "worker {index}: failed to pin to core {}; running unpinned",
                            core_id.id
                        );
                    }
                }
                Worker::run(index, &shared);
            })?;

        Ok(Worker {
            index,
            handle: Some(handle),
        })
    }

    /// Main loop: cycle through pool fibers until the quit flag is
    /// observed, either inside a fiber's entry loop or at a pool
    /// acquisition.
    fn run(index: usize, shared: &Shared) {
        let Some(mut current) = shared.fiber_pool.acquire(&shared.quit) else {
            return;
        };
        loop {
            let state = panic::catch_unwind(panic::AssertUnwindSafe(|| current.resume()));
            match state {
                Err(payload) => {
                    // Tasks are required to be total; a panicking body is not
                    // recoverable by the scheduler.
                    log::error!(
                        "worker {index}: task panicked: {}",
                        panic_message(payload.as_ref())
                    );
                    process::abort();
                }
                Ok(FiberState::Finished) => break,
                Ok(FiberState::Switched(directive)) => {
                    match Self::dispatch(directive, current, shared) {
                        Some(next) => current = next,
                        None => return,
                    }
                }
            }
        }
        // Quit: the completed fiber is dropped here; the rest are destroyed
        // with the scheduler once every worker has been joined.
    }

    /// Performs the placement the departing fiber requested and returns the
    /// fiber to run next. `departing` has vacated its stack by the time this
    /// runs, so no other worker can race us to resume it mid-switch.
    fn dispatch(
        directive: SwitchDirective,
        departing: Box<Fiber>,
        shared: &Shared,
    ) -> Option<Box<Fiber>> {
        match directive {
            SwitchDirective::ReturnToPool { next } => {
                shared.fiber_pool.release(departing);
                Some(next)
            }
            SwitchDirective::ParkOnCounter { counter, target } => {
                shared.wait_list.park(WaitingTask {
                    fiber: departing,
                    counter,
                    target,
                });
                shared.fiber_pool.acquire(&shared.quit)
            }
        }
    }

    /// Waits for the worker thread to finish.
    pub(crate) fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("worker {} terminated with a panic", self.index);
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
