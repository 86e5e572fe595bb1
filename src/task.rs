//! Task definitions and the bundles that travel through the ready queue.
//!
//! A task is an opaque unit of work executed to completion on a fiber. The
//! scheduler never inspects a task's payload; it only pairs it with the
//! counter of its group and decrements that counter when the body returns.

use crate::context::TaskContext;
use crate::counter::Counter;
use crate::fiber::Fiber;

/// Raw pointer wrapper that asserts thread safety for scheduler plumbing.
///
/// Used for the shared-state pointer threaded into fibers and for the
/// non-owning counter back-references on the waiting list.
pub(crate) struct SendPtr<T>(pub(crate) *mut T);

impl<T> Clone for SendPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SendPtr<T> {}

unsafe impl<T> Send for SendPtr<T> {}
unsafe impl<T> Sync for SendPtr<T> {}

/// Entry-point signature for function-pointer tasks.
///
/// The context bundle is the only channel a task receives: scheduler handle,
/// services handle, and the submitter's argument pointer.
pub type TaskFn = fn(&TaskContext);

/// Opaque argument pointer carried alongside a function-pointer task.
///
/// The scheduler copies the pointer around but never dereferences it.
/// Ownership and lifetime of the pointee stay with the submitter, who also
/// asserts that it is safe to hand across threads.
#[derive(Clone, Copy, Debug)]
pub struct TaskArg(*mut ());

impl TaskArg {
    /// An argument carrying no data.
    pub const fn null() -> Self {
        TaskArg(std::ptr::null_mut())
    }

    /// Wraps a raw pointer for a task argument.
    pub fn new<T>(ptr: *mut T) -> Self {
        TaskArg(ptr.cast())
    }

    /// Recovers the pointer at the submitter's chosen type.
    pub fn cast<T>(self) -> *mut T {
        self.0.cast()
    }

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

unsafe impl Send for TaskArg {}
unsafe impl Sync for TaskArg {}

/// A unit of work to be executed once on a fiber.
pub struct Task {
    kind: TaskKind,
}

enum TaskKind {
    /// C-style entry point: function pointer plus opaque argument.
    /// Value-copied on submission.
    Entry { function: TaskFn, arg: TaskArg },
    /// Boxed closure receiving the context bundle.
    Closure(Box<dyn FnOnce(&TaskContext) + Send + 'static>),
}

impl Task {
    /// Creates a task from an entry-point function and an opaque argument.
    pub fn new(function: TaskFn, arg: TaskArg) -> Self {
        Task {
            kind: TaskKind::Entry { function, arg },
        }
    }

    /// Creates a task from a closure.
    pub fn from_closure<F>(f: F) -> Self
    where
        F: FnOnce(&TaskContext) + Send + 'static,
    {
        Task {
            kind: TaskKind::Closure(Box::new(f)),
        }
    }

    /// The argument exposed through the context bundle while this task runs.
    pub(crate) fn arg(&self) -> TaskArg {
        match &self.kind {
            TaskKind::Entry { arg, .. } => *arg,
            TaskKind::Closure(_) => TaskArg::null(),
        }
    }

    pub(crate) fn invoke(self, ctx: &TaskContext) {
        match self.kind {
            TaskKind::Entry { function, .. } => function(ctx),
            TaskKind::Closure(f) => f(ctx),
        }
    }
}

/// A task paired with the counter of its group.
///
/// Created at submission, destroyed after the body has returned and the
/// counter has been decremented. The decrement is performed by the fiber
/// that ran the task, never by a waiter.
pub(crate) struct TaskBundle {
    pub(crate) task: Task,
    pub(crate) counter: Counter,
}

impl TaskBundle {
    pub(crate) fn execute(self, shared: &crate::scheduler::Shared) {
        let ctx = TaskContext::new(shared, self.task.arg());
        self.task.invoke(&ctx);
        self.counter.decrement();
    }
}

/// Item shape of the ready queue: either a fresh bundle or a parked fiber
/// revived by a waiting-list scan.
pub(crate) enum ReadyTask {
    Run(TaskBundle),
    Resume(Box<Fiber>),
}
