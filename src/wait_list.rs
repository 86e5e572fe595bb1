//! Waiting list of fibers parked on counters.
//!
//! A single mutex guards the list; it is held only for pushes and for the
//! scan-and-remove pass. Task execution never holds it, and suspended
//! fibers are handed off or queued only after the lock is released.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use crossbeam::deque::Injector;

use crate::fiber::Fiber;
use crate::task::{ReadyTask, SendPtr};

/// A parked fiber conditioned on a counter reaching a target value.
///
/// The counter pointer is a non-owning back-reference: the waiter holds a
/// live `Counter` clone on its suspended stack for the duration of the
/// park, so the pointee outlives the entry.
pub(crate) struct WaitingTask {
    pub(crate) fiber: Box<Fiber>,
    pub(crate) counter: SendPtr<AtomicU32>,
    pub(crate) target: u32,
}

pub(crate) struct WaitList {
    entries: Mutex<Vec<WaitingTask>>,
}

impl WaitList {
    pub(crate) fn new() -> Self {
        WaitList {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Enlists a parked fiber. Called only from a worker's wait-park
    /// dispatch, after the fiber has switched off its stack.
    pub(crate) fn park(&self, entry: WaitingTask) {
        self.entries.lock().unwrap().push(entry);
    }

    /// Removes every entry whose counter has reached its target, in list
    /// order. The first revived fiber is returned to the caller for a
    /// direct handoff; any further ones are pushed onto the ready queue.
    pub(crate) fn scan_and_revive(&self, ready: &Injector<ReadyTask>) -> Option<Box<Fiber>> {
        let mut revived = Vec::new();
        {
            let mut entries = self.entries.lock().unwrap();
            let mut i = 0;
            while i < entries.len() {
                // SAFETY: the parked fiber's stack keeps a counter clone
                // alive, so the back-reference is valid while the entry
                // exists.
                let value = unsafe { (*entries[i].counter.0).load(Ordering::SeqCst) };
                if value == entries[i].target {
                    revived.push(entries.remove(i).fiber);
                } else {
                    i += 1;
                }
            }
        }

        let mut revived = revived.into_iter();
        let first = revived.next();
        for fiber in revived {
            ready.push(ReadyTask::Resume(fiber));
        }
        first
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}
