//! Fiber management: user-space execution contexts with their own stacks.
//!
//! Built on `corosensei` stackful coroutines. A worker thread resumes a
//! fiber; the fiber runs until it either observes the quit flag (and
//! returns) or suspends carrying a [`SwitchDirective`] that tells the worker
//! what to do with it. The directive mechanism is what keeps fiber
//! publication safe: a fiber never pushes itself onto a shared structure
//! while still running on its own stack. The worker performs the placement
//! after `resume` has returned, at which point the fiber's stack is
//! guaranteed vacated.

use std::cell::Cell;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use corosensei::stack::DefaultStack;
use corosensei::{Coroutine, CoroutineResult, Yielder};

use crate::task::SendPtr;

/// Copyable handle to a fiber, usable as a thread-local marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct FiberHandle(pub(crate) *mut Fiber);

unsafe impl Send for FiberHandle {}
unsafe impl Sync for FiberHandle {}

/// Request a suspending fiber hands to its worker.
///
/// Both variants correspond to a placement of the departing fiber that must
/// happen off its stack: returning it to the pool, or parking it on the
/// waiting list.
pub(crate) enum SwitchDirective {
    /// Release the departing fiber to the pool, then resume `next`.
    ReturnToPool { next: Box<Fiber> },
    /// Park the departing fiber on the waiting list until the counter
    /// reaches `target`, then resume a fresh pool fiber.
    ParkOnCounter {
        counter: SendPtr<AtomicU32>,
        target: u32,
    },
}

/// Outcome of resuming a fiber.
pub(crate) enum FiberState {
    /// The fiber suspended with a request for its worker.
    Switched(SwitchDirective),
    /// The fiber's entry loop returned (it observed the quit flag).
    Finished,
}

type FiberYielder = Yielder<(), SwitchDirective>;

thread_local! {
    static CURRENT_FIBER: Cell<Option<FiberHandle>> = const { Cell::new(None) };
}

/// A lightweight stackful execution context.
///
/// Fibers are allocated once at scheduler startup, cycle between the pool,
/// a worker, and the waiting list, and are destroyed at quit. The `ledger`
/// tracks live fibers so shutdown tests can prove nothing leaked.
pub(crate) struct Fiber {
    id: usize,
    coroutine: Coroutine<(), SwitchDirective, ()>,
    /// Published by the fiber itself on first entry. Only dereferenced from
    /// code running on this fiber's stack, while the coroutine is live.
    yielder: Cell<*const FiberYielder>,
    ledger: Arc<AtomicUsize>,
}

unsafe impl Send for Fiber {}

impl Fiber {
    /// Creates a fiber with its own stack, running `body` once started.
    pub(crate) fn new<F>(
        id: usize,
        stack_size: usize,
        ledger: Arc<AtomicUsize>,
        body: F,
    ) -> io::Result<Box<Fiber>>
    where
        F: FnOnce() + Send + 'static,
    {
        let stack = DefaultStack::new(stack_size)?;
        let coroutine = Coroutine::with_stack(stack, move |yielder, ()| {
            // Publish the yielder so nested code (wait_for_counter) can
            // suspend this fiber from arbitrarily deep in a task body.
            let handle =
                Fiber::current().expect("fiber entered without a current handle");
            unsafe {
                (*handle.0).yielder.set(yielder);
            }
            body();
        });

        ledger.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(Fiber {
            id,
            coroutine,
            yielder: Cell::new(std::ptr::null()),
            ledger,
        }))
    }

    pub(crate) fn id(&self) -> usize {
        self.id
    }

    /// Resumes the fiber on the calling thread until it suspends or returns.
    pub(crate) fn resume(&mut self) -> FiberState {
        let handle = FiberHandle(self as *mut Fiber);
        CURRENT_FIBER.set(Some(handle));
        let result = self.coroutine.resume(());
        CURRENT_FIBER.set(None);

        match result {
            CoroutineResult::Yield(directive) => FiberState::Switched(directive),
            CoroutineResult::Return(()) => FiberState::Finished,
        }
    }

    /// Suspends the currently running fiber, handing `directive` to its
    /// worker. Returns when some worker resumes the fiber again.
    ///
    /// Must be called from code running on a fiber.
    pub(crate) fn switch_current(directive: SwitchDirective) {
        let handle = CURRENT_FIBER
            .get()
            .expect("switch_current called outside a fiber");
        // SAFETY: the handle marks the fiber executing on this thread, and
        // the yielder was published when that fiber was first entered.
        unsafe {
            let yielder = (*handle.0).yielder.get();
            (*yielder).suspend(directive);
        }
    }

    /// Handle of the fiber running on the current thread, if any.
    pub(crate) fn current() -> Option<FiberHandle> {
        CURRENT_FIBER.get()
    }
}

impl Drop for Fiber {
    fn drop(&mut self) {
        self.ledger.fetch_sub(1, Ordering::SeqCst);
    }
}
