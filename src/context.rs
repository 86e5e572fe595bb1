//! Context bundle threaded through every task invocation.
//!
//! The context is the only channel a task receives: scheduler access for
//! submitting and waiting, the opaque services handle supplied at
//! initialization (heap and allocator handles live there), and the
//! submitter's argument pointer. There are no process globals.

use std::any::Any;

use crate::counter::Counter;
use crate::fiber::Fiber;
use crate::scheduler::Shared;
use crate::task::{Task, TaskArg};

/// Per-invocation view handed to a running task.
///
/// The layout is stable across all task invocations in one scheduler
/// lifetime; only the argument differs per task.
pub struct TaskContext<'s> {
    shared: &'s Shared,
    arg: TaskArg,
}

impl<'s> TaskContext<'s> {
    pub(crate) fn new(shared: &'s Shared, arg: TaskArg) -> Self {
        TaskContext { shared, arg }
    }

    /// Queues a single task. The returned counter starts at 1.
    pub fn submit_one(&self, task: Task) -> Counter {
        self.shared.submit_one(task)
    }

    /// Queues a group of tasks sharing one counter, initially the group
    /// size. The counter is returned after every bundle is enqueued, so the
    /// caller may immediately wait on it.
    pub fn submit_group(&self, tasks: Vec<Task>) -> Counter {
        self.shared.submit_group(tasks)
    }

    /// Parks the current fiber until `counter` reaches `target`.
    ///
    /// Returns immediately if the counter is already there. Otherwise the
    /// fiber leaves its worker, which picks up other ready work; the call
    /// returns once a waiting-list scan has observed the target value and
    /// some worker has resumed the fiber.
    pub fn wait_for_counter(&self, counter: &Counter, target: u32) {
        self.shared.wait_for_counter(counter, target);
    }

    /// The services bundle supplied at scheduler construction, downcast to
    /// the submitter's concrete type.
    pub fn services<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.shared.services.downcast_ref::<T>()
    }

    /// The opaque argument submitted with this task. Null for closure tasks.
    pub fn arg(&self) -> TaskArg {
        self.arg
    }

    /// Identifier of the fiber executing this task.
    pub fn fiber_id(&self) -> Option<usize> {
        Fiber::current().map(|handle| unsafe { (*handle.0).id() })
    }
}
