//! Priority-preemptive real-time kernel core.
//!
//! The kernel owns every task and every synchronization primitive in one
//! [`Kernel`](scheduler::Kernel) value. Tasks are step functions
//! ([`TaskBody`](task::TaskBody)) that are dispatched by the scheduler; blocking
//! calls park the calling task on the wait queue of a primitive and hand the CPU
//! back to the scheduler.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[macro_use]
mod log_wrapper;

pub mod port;
pub mod queue;
pub mod queue_set;
pub mod scheduler;
pub mod semaphore;
pub mod task;
mod timer;
mod wait_queue;

pub use portable_atomic;

pub use port::{Event, Port};
pub use queue::QueueId;
pub use queue_set::{QueueSetId, QueueSetMember};
pub use scheduler::{Kernel, KernelConfig, RuntimeStats};
pub use semaphore::SemaphoreId;
pub use task::{Completion, TaskBody, TaskConfig, TaskContext, TaskId, TaskInfo, TaskState, Timeout};

/// Maximum number of live tasks.
pub const MAX_TASKS: usize = 16;
/// Highest usable priority. Valid priorities are `0..=MAX_PRIORITY`.
pub const MAX_PRIORITY: usize = 15;
pub const MAX_SEMAPHORES: usize = 16;
pub const MAX_QUEUES: usize = 16;
/// Upper bound on the capacity of a single queue.
pub const MAX_QUEUE_LEN: usize = 32;
pub const MAX_QUEUE_SETS: usize = 4;
pub const MAX_SET_MEMBERS: usize = 8;
/// Upper bound on the notification capacity of a single queue set.
pub const MAX_SET_CAPACITY: usize = 64;
/// Task names longer than this are truncated.
pub const MAX_NAME_LEN: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// The deadline of a blocking call passed before its condition was met.
    TimedOut,
    /// Giving a semaphore that is already at its maximum, or a non-blocking send to a full queue.
    Overflow,
    /// No free slot or buffer capacity at creation time.
    ResourceExhausted,
    /// The primitive is already registered in a queue set.
    AlreadyMember,
    /// The queue set has no room left for the member.
    AlreadyFull,
    InvalidPriority,
    NotFound,
    /// Mutex released by a task that does not hold it.
    NotOwner,
    /// Queue set member removed while still holding data.
    NotEmpty,
    /// A task-only operation was called with a task that is not the running one.
    NotInTask,
    StackOverflow,
}

/// Unwraps the result of a blocking call, or returns [`Completion::Pending`]
/// from the enclosing task body when the call parked the task.
///
/// ```ignore
/// let Ok(msg) = wait!(cx.receive(queue, Timeout::Forever)) else {
///     return Completion::Continue;
/// };
/// ```
#[macro_export]
macro_rules! wait {
    ($call:expr) => {
        match $call {
            ::core::task::Poll::Ready(result) => result,
            ::core::task::Poll::Pending => return $crate::task::Completion::Pending,
        }
    };
}
