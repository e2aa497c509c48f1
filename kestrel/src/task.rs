//! Task descriptors, task bodies and the per-dispatch task context.

use core::task::Poll;

use heapless::String;

use crate::{
    Error, MAX_NAME_LEN,
    queue::QueueId,
    queue_set::{QueueSetId, QueueSetMember},
    scheduler::Kernel,
    semaphore::SemaphoreId,
};

/// Identifier of a task.
///
/// The slot index is reused after a task is deleted, the generation is not,
/// so an old id never refers to a newer task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskId {
    pub(crate) index: usize,
    pub(crate) generation: u32,
}

impl TaskId {
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Lifecycle state of a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    Ready,
    Running,
    Blocked,
    Suspended,
    Deleted,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Ready => "Ready",
            TaskState::Running => "Running",
            TaskState::Blocked => "Blocked",
            TaskState::Suspended => "Suspended",
            TaskState::Deleted => "Deleted",
        }
    }
}

#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct TaskConfig {
    pub(crate) name: String<MAX_NAME_LEN>,
    pub(crate) priority: usize,
    pub(crate) stack_size: usize,
}

impl TaskConfig {
    /// Sets the task name shown by [`Kernel::list_tasks`]. Truncated to [`MAX_NAME_LEN`] bytes.
    pub fn with_name(self, name: &str) -> Self {
        let mut truncated = String::new();
        for c in name.chars() {
            if truncated.push(c).is_err() {
                break;
            }
        }
        Self {
            name: truncated,
            ..self
        }
    }

    /// Sets task priority.
    ///
    /// Higher value means higher priority. Default value is 1.
    pub fn with_priority(self, priority: usize) -> Self {
        Self { priority, ..self }
    }

    /// Sets the stack budget (in bytes) used for watermarking.
    pub fn with_stack_size(self, stack_size: usize) -> Self {
        Self { stack_size, ..self }
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            priority: 1,
            stack_size: 2048,
        }
    }
}

/// What a task body did during one dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// Keeps running for the rest of the current tick.
    Continue,
    /// Goes to the back of its priority's ready list.
    Yield,
    /// A blocking call parked the task.
    Pending,
    /// The task finished and is deleted.
    Exit,
}

/// A unit of schedulable work.
///
/// `run` is called every time the task is dispatched. State that must survive
/// between dispatches lives in the body itself.
pub trait TaskBody<M>: Send {
    fn run(&mut self, cx: &mut TaskContext<'_, M>) -> Completion;
}

impl<M, F> TaskBody<M> for F
where
    F: FnMut(&mut TaskContext<'_, M>) -> Completion + Send,
{
    fn run(&mut self, cx: &mut TaskContext<'_, M>) -> Completion {
        self(cx)
    }
}

/// How long a blocking call may wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timeout {
    /// Fail immediately instead of blocking.
    NonBlocking,
    Ticks(u64),
    Forever,
}

impl Timeout {
    pub(crate) fn is_non_blocking(&self) -> bool {
        matches!(self, Timeout::NonBlocking | Timeout::Ticks(0))
    }

    /// Absolute wake-up time, `None` for an unbounded wait.
    pub(crate) fn deadline(&self, now: u64) -> Option<u64> {
        match self {
            Timeout::NonBlocking => Some(now),
            Timeout::Ticks(ticks) => Some(now.saturating_add(*ticks)),
            Timeout::Forever => None,
        }
    }
}

impl From<u64> for Timeout {
    fn from(ticks: u64) -> Self {
        Timeout::Ticks(ticks)
    }
}

/// Read-only snapshot of a task, as returned by [`Kernel::list_tasks`].
#[derive(Clone, Debug)]
pub struct TaskInfo {
    pub id: TaskId,
    pub name: String<MAX_NAME_LEN>,
    pub priority: usize,
    pub state: TaskState,
    pub stack_headroom: usize,
    pub run_ticks: u64,
}

/// Handle given to a task body while it is dispatched.
///
/// Blocking calls return [`Poll::Pending`] after parking the task; the body
/// must then return [`Completion::Pending`] (see [`wait!`](crate::wait)).
/// When the task runs again, issuing the same call returns the outcome of
/// the wait.
pub struct TaskContext<'k, M> {
    pub(crate) kernel: &'k Kernel<M>,
    pub(crate) id: TaskId,
}

impl<'k, M> TaskContext<'k, M> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn kernel(&self) -> &'k Kernel<M> {
        self.kernel
    }

    pub fn current_time(&self) -> u64 {
        self.kernel.current_time()
    }

    /// Blocks for `ticks` ticks.
    pub fn delay(&mut self, ticks: u64) -> Poll<()> {
        self.kernel.delay_task(self.id, ticks)
    }

    /// Blocks until `*last_wake + period`, then advances `last_wake` by `period`.
    pub fn delay_until(&mut self, last_wake: &mut u64, period: u64) -> Poll<()> {
        self.kernel.delay_task_until(self.id, last_wake, period)
    }

    pub fn take(&mut self, sem: SemaphoreId, timeout: Timeout) -> Poll<Result<(), Error>> {
        self.kernel.take_as(self.id, sem, timeout)
    }

    pub fn give(&mut self, sem: SemaphoreId) -> Result<(), Error> {
        self.kernel.give_as(Some(self.id), sem)
    }

    pub fn send(&mut self, queue: QueueId, msg: M, timeout: Timeout) -> Poll<Result<(), Error>> {
        self.kernel.send_as(self.id, queue, msg, timeout)
    }

    pub fn receive(&mut self, queue: QueueId, timeout: Timeout) -> Poll<Result<M, Error>> {
        self.kernel.receive_as(self.id, queue, timeout)
    }

    pub fn select(
        &mut self,
        set: QueueSetId,
        timeout: Timeout,
    ) -> Poll<Result<QueueSetMember, Error>> {
        self.kernel.select_as(self.id, set, timeout)
    }

    /// Gives the CPU to the next task of the same priority.
    ///
    /// ```ignore
    /// return cx.yield_now();
    /// ```
    pub fn yield_now(&mut self) -> Completion {
        Completion::Yield
    }

    /// Suspends the calling task. The body should return right after this.
    pub fn suspend_self(&mut self) -> Result<(), Error> {
        self.kernel.suspend(self.id)
    }

    /// Records that the task currently uses `bytes` of its stack budget.
    pub fn report_stack_usage(&mut self, bytes: usize) -> Result<(), Error> {
        self.kernel.report_stack_usage(self.id, bytes)
    }
}
