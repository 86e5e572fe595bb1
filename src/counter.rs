//! Counter-based synchronization for task completion tracking.
//!
//! A counter is created per submitted task group, starting at the group size.
//! Every completing task decrements it once; a fiber that waits on a counter
//! parks until the counter reaches the requested target value.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::task::SendPtr;

/// A shared atomic counter tracking the outstanding tasks of one group.
///
/// Cloning produces another handle to the same counter. All operations are
/// sequentially consistent. The scheduler decrements the counter exactly once
/// per completed task; matching decrements to the initial value is the
/// submitter's responsibility, and driving the counter below zero is
/// undefined by contract.
#[derive(Clone)]
pub struct Counter {
    inner: Arc<AtomicU32>,
}

impl Counter {
    /// Creates a new counter with the specified initial value.
    pub fn new(initial: u32) -> Self {
        Counter {
            inner: Arc::new(AtomicU32::new(initial)),
        }
    }

    /// Decrements the counter by one.
    pub fn decrement(&self) {
        self.inner.fetch_sub(1, Ordering::SeqCst);
    }

    /// Returns the current value of the counter.
    pub fn load(&self) -> u32 {
        self.inner.load(Ordering::SeqCst)
    }

    /// Non-owning pointer to the underlying atomic, for waiting-list entries.
    /// Valid for as long as any clone of this counter is alive.
    pub(crate) fn raw(&self) -> SendPtr<AtomicU32> {
        SendPtr(Arc::as_ptr(&self.inner) as *mut AtomicU32)
    }
}
