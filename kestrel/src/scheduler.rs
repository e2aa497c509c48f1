use alloc::boxed::Box;
use core::{cell::RefCell, sync::atomic::Ordering, task::Poll};

use critical_section::Mutex;
use heapless::{Deque, String, Vec};
use portable_atomic::AtomicBool;

use crate::{
    Error, MAX_NAME_LEN, MAX_PRIORITY, MAX_QUEUE_SETS, MAX_QUEUES, MAX_SEMAPHORES, MAX_TASKS,
    port::{Event, Port},
    queue::{QueueId, QueueState},
    queue_set::{QueueSetId, QueueSetMember, QueueSetState},
    semaphore::{SemaphoreId, SemaphoreState},
    task::{Completion, TaskBody, TaskConfig, TaskContext, TaskId, TaskInfo, TaskState},
    timer::{Timer, TimerEntry},
    wait_queue::WaitQueue,
};

#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct KernelConfig {
    /// Tick frequency in Hz. Only used to convert wall-clock time into ticks.
    pub tick_freq: u32,
    /// Number of ticks a task may run before an equal-priority task gets the CPU.
    pub time_slice: u32,
    /// Upper bound on task dispatches between two ticks.
    pub max_dispatches_per_tick: usize,
}

impl KernelConfig {
    pub fn with_tick_freq(self, tick_freq: u32) -> Self {
        Self { tick_freq, ..self }
    }

    pub fn with_time_slice(self, time_slice: u32) -> Self {
        Self {
            time_slice: time_slice.max(1),
            ..self
        }
    }

    pub fn with_max_dispatches_per_tick(self, max_dispatches_per_tick: usize) -> Self {
        Self {
            max_dispatches_per_tick: max_dispatches_per_tick.max(1),
            ..self
        }
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            tick_freq: 1000,
            time_slice: 1,
            max_dispatches_per_tick: 64,
        }
    }
}

/// Kernel-wide counters, as returned by [`Kernel::runtime_stats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    pub now: u64,
    pub idle_ticks: u64,
    pub context_switches: u64,
}

/// What a blocked task is waiting for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum WaitOn {
    Delay,
    Semaphore(SemaphoreId),
    Send(QueueId),
    Receive(QueueId),
    Select(QueueSetId),
}

/// Successful end of a wait.
pub(crate) enum Wakeup<M> {
    Signaled,
    Message(M),
    Member(QueueSetMember),
}

pub(crate) struct WaitRecord<M> {
    on: WaitOn,
    /// Filled when the wait ends, consumed when the task re-issues the call.
    outcome: Option<Result<Wakeup<M>, Error>>,
    /// Message of a sender parked on a full queue.
    pub(crate) outgoing: Option<M>,
}

/// Task Control Block (TCB)
pub(crate) struct Tcb<M> {
    generation: u32,
    name: String<MAX_NAME_LEN>,
    pub(crate) priority: usize,
    pub(crate) state: TaskState,
    /// State restored by `resume`.
    resume_state: TaskState,
    pub(crate) wait: Option<WaitRecord<M>>,
    wait_seq: u32,
    stack_size: usize,
    stack_high_water: usize,
    run_ticks: u64,
    body: Option<Box<dyn TaskBody<M>>>,
}

pub(crate) struct KernelState<M> {
    tasks: [Option<Tcb<M>>; MAX_TASKS],
    generations: [u32; MAX_TASKS],
    /// Task queues for each priority
    ready: [Deque<TaskId, MAX_TASKS>; MAX_PRIORITY + 1],
    current: Option<TaskId>,
    /// The current task already used up the ongoing tick.
    slice_done: bool,
    slice_used: u32,
    timer: Timer,
    pub(crate) semaphores: Vec<SemaphoreState, MAX_SEMAPHORES>,
    pub(crate) queues: Vec<QueueState<M>, MAX_QUEUES>,
    pub(crate) sets: Vec<QueueSetState, MAX_QUEUE_SETS>,
    idle_ticks: u64,
    context_switches: u64,
}

/// The kernel: owns every task and every primitive.
///
/// All state is guarded by one critical section. `Kernel` is `Sync`, so
/// interrupt-context calls such as [`Kernel::give_from_interrupt`] can be made
/// from other threads while tasks are being dispatched.
pub struct Kernel<M> {
    config: KernelConfig,
    state: Mutex<RefCell<KernelState<M>>>,
    yield_pending: AtomicBool,
}

impl<M> Kernel<M> {
    pub fn new(config: KernelConfig) -> Self {
        Self {
            config,
            state: Mutex::new(RefCell::new(KernelState::new())),
            yield_pending: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut KernelState<M>) -> R) -> R {
        critical_section::with(|cs| f(&mut self.state.borrow_ref_mut(cs)))
    }

    /// Asks the dispatcher to re-evaluate the running task at its next safe point.
    pub(crate) fn request_yield(&self) {
        self.yield_pending.store(true, Ordering::Release);
    }

    /// Returns and clears the reschedule request raised by interrupt-context calls.
    pub fn take_yield_pending(&self) -> bool {
        self.yield_pending.swap(false, Ordering::AcqRel)
    }

    /// Creates a task in Ready state.
    pub fn spawn<F>(&self, config: TaskConfig, body: F) -> Result<TaskId, Error>
    where
        F: FnMut(&mut TaskContext<'_, M>) -> Completion + Send + 'static,
    {
        self.spawn_body(config, Box::new(body))
    }

    pub fn spawn_body(
        &self,
        config: TaskConfig,
        body: Box<dyn TaskBody<M>>,
    ) -> Result<TaskId, Error> {
        if config.priority > MAX_PRIORITY {
            return Err(Error::InvalidPriority);
        }

        let id = self.with_state(|state| {
            let Some(index) = state.tasks.iter().position(|slot| slot.is_none()) else {
                return Err(Error::ResourceExhausted);
            };
            let id = TaskId {
                index,
                generation: state.generations[index],
            };

            state.tasks[index] = Some(Tcb {
                generation: id.generation,
                name: config.name.clone(),
                priority: config.priority,
                state: TaskState::Ready,
                resume_state: TaskState::Ready,
                wait: None,
                wait_seq: 0,
                stack_size: config.stack_size,
                stack_high_water: 0,
                run_ticks: 0,
                body: Some(body),
            });
            state.make_ready(id);

            Ok(id)
        })?;

        info!(
            "Task #{} {} created (priority {})",
            id.index,
            config.name.as_str(),
            config.priority
        );

        Ok(id)
    }

    /// Moves a task to Suspended. It is never selected until [`Kernel::resume`].
    pub fn suspend(&self, id: TaskId) -> Result<(), Error> {
        self.with_state(|state| state.suspend(id))?;
        debug!("Task #{} suspended", id.index);
        Ok(())
    }

    /// Returns a suspended task to the state it had, or to Ready if its wait ended meanwhile.
    ///
    /// A task suspended while waiting on a primitive comes back Ready and its
    /// blocking call starts over when re-issued.
    pub fn resume(&self, id: TaskId) -> Result<(), Error> {
        self.with_state(|state| state.resume(id))?;
        debug!("Task #{} resumed", id.index);
        Ok(())
    }

    /// Deletes a task and frees its slot.
    ///
    /// Mutexes held by the task are not released.
    pub fn delete(&self, id: TaskId) -> Result<(), Error> {
        self.with_state(|state| state.delete(id))?;
        info!("Task #{} deleted", id.index);
        Ok(())
    }

    pub fn task_state(&self, id: TaskId) -> Result<TaskState, Error> {
        self.with_state(|state| {
            if id.index >= MAX_TASKS {
                return Err(Error::NotFound);
            }
            Ok(state.tcb(id).map_or(TaskState::Deleted, |tcb| tcb.state))
        })
    }

    pub fn priority(&self, id: TaskId) -> Result<usize, Error> {
        self.with_state(|state| state.tcb(id).map(|tcb| tcb.priority))
    }

    pub fn set_priority(&self, id: TaskId, priority: usize) -> Result<(), Error> {
        if priority > MAX_PRIORITY {
            return Err(Error::InvalidPriority);
        }
        self.with_state(|state| state.set_priority(id, priority))?;
        debug!("Task #{} priority set to {}", id.index, priority);
        Ok(())
    }

    /// The task that is currently Running, if any.
    pub fn current_task(&self) -> Option<TaskId> {
        self.with_state(|state| state.running())
    }

    pub fn current_time(&self) -> u64 {
        self.with_state(|state| state.timer.now())
    }

    pub fn task_count(&self) -> usize {
        self.with_state(|state| state.tasks.iter().flatten().count())
    }

    /// Read-only snapshot of every live task.
    pub fn list_tasks(&self) -> Vec<TaskInfo, MAX_TASKS> {
        self.with_state(|state| {
            let mut list = Vec::new();
            for (index, tcb) in state.tasks.iter().enumerate() {
                let Some(tcb) = tcb else {
                    continue;
                };
                let info = TaskInfo {
                    id: TaskId {
                        index,
                        generation: tcb.generation,
                    },
                    name: tcb.name.clone(),
                    priority: tcb.priority,
                    state: tcb.state,
                    stack_headroom: tcb.stack_size.saturating_sub(tcb.stack_high_water),
                    run_ticks: tcb.run_ticks,
                };
                list.push(info).unwrap_or_else(|_| unreachable!());
            }
            list
        })
    }

    pub fn runtime_stats(&self) -> RuntimeStats {
        self.with_state(|state| RuntimeStats {
            now: state.timer.now(),
            idle_ticks: state.idle_ticks,
            context_switches: state.context_switches,
        })
    }

    pub(crate) fn report_stack_usage(&self, id: TaskId, bytes: usize) -> Result<(), Error> {
        let overflow = self.with_state(|state| {
            let tcb = state.tcb_mut(id)?;
            tcb.stack_high_water = tcb.stack_high_water.max(bytes);
            Ok::<_, Error>(bytes > tcb.stack_size)
        })?;

        if !overflow {
            return Ok(());
        }

        error!("Stack overflow detected in task #{}", id.index);
        #[cfg(feature = "stack-canary")]
        self.delete(id)?;
        Err(Error::StackOverflow)
    }

    pub(crate) fn delay_task(&self, id: TaskId, ticks: u64) -> Poll<()> {
        self.with_state(|state| {
            if state.take_outcome(id, WaitOn::Delay).is_some() || ticks == 0 {
                return Poll::Ready(());
            }
            if state.check_running(id).is_err() {
                return Poll::Ready(());
            }
            let deadline = state.timer.now().saturating_add(ticks);
            state.block(id, WaitOn::Delay, Some(deadline), None);
            Poll::Pending
        })
    }

    pub(crate) fn delay_task_until(&self, id: TaskId, last_wake: &mut u64, period: u64) -> Poll<()> {
        let target = last_wake.saturating_add(period);
        self.with_state(|state| {
            let woken = state.take_outcome(id, WaitOn::Delay).is_some();
            if woken || target <= state.timer.now() || state.check_running(id).is_err() {
                *last_wake = target;
                return Poll::Ready(());
            }
            state.block(id, WaitOn::Delay, Some(target), None);
            Poll::Pending
        })
    }

    /// Runs one tick: dispatches tasks until the running one has used the
    /// tick up, then advances the clock.
    pub fn run_tick(&self) {
        self.take_yield_pending();
        self.dispatch();
        self.tick();
    }

    pub fn run_for(&self, ticks: u64) {
        for _ in 0..ticks {
            self.run_tick();
        }
    }

    /// Dispatches tasks without advancing time.
    ///
    /// Used to honor a reschedule requested from interrupt context between two ticks.
    /// A task that already used the current tick is not run again.
    pub fn poll(&self) {
        self.take_yield_pending();
        self.dispatch();
    }

    /// Advances the clock by one tick, waking tasks whose deadline passed.
    pub fn tick(&self) {
        let time_slice = self.config.time_slice;
        self.with_state(|state| state.tick(time_slice));
    }

    /// Runs the kernel on `port` until it reports [`Event::Shutdown`].
    pub fn start<P: Port>(&self, port: &mut P) {
        info!("Kernel started");

        loop {
            match port.wait_for_event() {
                Event::Tick => self.run_tick(),
                Event::Interrupt => {
                    if self.take_yield_pending() {
                        self.dispatch();
                    }
                }
                Event::Shutdown => break,
            }
        }

        info!("Kernel stopped");
    }

    fn dispatch(&self) {
        for _ in 0..self.config.max_dispatches_per_tick {
            let next = self.with_state(|state| {
                let id = state.select_next()?;
                let body = state.tcb_mut(id).ok()?.body.take()?;
                Some((id, body))
            });
            let Some((id, mut body)) = next else {
                return;
            };

            let completion = body.run(&mut TaskContext { kernel: self, id });

            let finished = self.with_state(|state| state.finish_dispatch(id, body, completion));
            if finished {
                info!("Task #{} finished", id.index);
            }
        }

        trace!("Dispatch limit reached");
    }
}

impl<M> KernelState<M> {
    fn new() -> Self {
        Self {
            tasks: [const { None }; MAX_TASKS],
            generations: [0; MAX_TASKS],
            ready: [const { Deque::new() }; MAX_PRIORITY + 1],
            current: None,
            slice_done: false,
            slice_used: 0,
            timer: Timer::new(),
            semaphores: Vec::new(),
            queues: Vec::new(),
            sets: Vec::new(),
            idle_ticks: 0,
            context_switches: 0,
        }
    }

    pub(crate) fn tcb(&self, id: TaskId) -> Result<&Tcb<M>, Error> {
        match self.tasks.get(id.index) {
            Some(Some(tcb)) if tcb.generation == id.generation => Ok(tcb),
            _ => Err(Error::NotFound),
        }
    }

    pub(crate) fn tcb_mut(&mut self, id: TaskId) -> Result<&mut Tcb<M>, Error> {
        match self.tasks.get_mut(id.index) {
            Some(Some(tcb)) if tcb.generation == id.generation => Ok(tcb),
            _ => Err(Error::NotFound),
        }
    }

    pub(crate) fn now(&self) -> u64 {
        self.timer.now()
    }

    /// The current task if it is still Running.
    pub(crate) fn running(&self) -> Option<TaskId> {
        let id = self.current?;
        match self.tcb(id) {
            Ok(tcb) if tcb.state == TaskState::Running => Some(id),
            _ => None,
        }
    }

    pub(crate) fn running_priority(&self) -> Option<usize> {
        self.running()
            .and_then(|id| self.tcb(id).ok())
            .map(|tcb| tcb.priority)
    }

    /// Blocking calls are only valid for the task being dispatched.
    pub(crate) fn check_running(&self, id: TaskId) -> Result<(), Error> {
        if self.running() == Some(id) {
            Ok(())
        } else {
            Err(Error::NotInTask)
        }
    }

    fn make_ready(&mut self, id: TaskId) {
        let Ok(tcb) = self.tcb_mut(id) else {
            return;
        };
        tcb.state = TaskState::Ready;
        let priority = tcb.priority;
        self.ready[priority]
            .push_back(id)
            .unwrap_or_else(|_| unreachable!());
    }

    fn remove_from_ready(&mut self, id: TaskId, priority: usize) {
        let mut new_queue = Deque::new();
        for elem in self.ready[priority].iter() {
            if *elem != id {
                new_queue
                    .push_back(*elem)
                    .unwrap_or_else(|_| unreachable!());
            }
        }
        self.ready[priority] = new_queue;
    }

    fn highest_ready_priority(&self) -> Option<usize> {
        (0..=MAX_PRIORITY)
            .rev()
            .find(|priority| !self.ready[*priority].is_empty())
    }

    /// Picks the task to dispatch next, or `None` when the rest of the tick is idle
    /// or already used by the running task.
    fn select_next(&mut self) -> Option<TaskId> {
        if let Some(current) = self.running() {
            let priority = self.tcb(current).map_or(0, |tcb| tcb.priority);
            match self.highest_ready_priority() {
                Some(highest) if highest > priority => {
                    trace!("Task #{} preempted", current.index);
                    self.make_ready(current);
                }
                _ => return if self.slice_done { None } else { Some(current) },
            }
        }

        let Some(highest) = self.highest_ready_priority() else {
            self.current = None;
            return None;
        };
        let next = self.ready[highest]
            .pop_front()
            .unwrap_or_else(|| unreachable!());
        if let Ok(tcb) = self.tcb_mut(next) {
            tcb.state = TaskState::Running;
        }

        if self.current != Some(next) {
            if let Some(previous) = self.current {
                trace!("Context switch: #{} -> #{}", previous.index, next.index);
            }
            self.current = Some(next);
            self.context_switches += 1;
            self.slice_used = 0;
            self.slice_done = false;
        }

        if self.slice_done { None } else { Some(next) }
    }

    /// Puts the body back and applies the task's completion. Returns `true` when the task exited.
    fn finish_dispatch(
        &mut self,
        id: TaskId,
        body: Box<dyn TaskBody<M>>,
        completion: Completion,
    ) -> bool {
        let Ok(tcb) = self.tcb_mut(id) else {
            // Deleted while running; the body is dropped here
            return false;
        };
        tcb.body = Some(body);
        let state = tcb.state;

        match completion {
            Completion::Exit => {
                self.remove_task(id);
                return true;
            }
            Completion::Yield if state == TaskState::Running => {
                self.make_ready(id);
                self.slice_done = true;
            }
            _ if state == TaskState::Running => self.slice_done = true,
            _ => {}
        }

        false
    }

    pub(crate) fn block(
        &mut self,
        id: TaskId,
        on: WaitOn,
        deadline: Option<u64>,
        outgoing: Option<M>,
    ) {
        let Ok(tcb) = self.tcb_mut(id) else {
            return;
        };
        tcb.wait_seq = tcb.wait_seq.wrapping_add(1);
        tcb.wait = Some(WaitRecord {
            on,
            outcome: None,
            outgoing,
        });
        tcb.state = TaskState::Blocked;
        let wait_seq = tcb.wait_seq;

        trace!("Task #{} became blocked", id.index);

        if let Some(time) = deadline {
            let tasks = &self.tasks;
            self.timer.arm(
                TimerEntry {
                    time,
                    task: id,
                    wait_seq,
                },
                |entry| entry_is_live(tasks, entry),
            );
        }
    }

    /// Ends the wait of `id` with `outcome`. Returns the priority of the woken task.
    pub(crate) fn complete_wait(
        &mut self,
        id: TaskId,
        outcome: Result<Wakeup<M>, Error>,
    ) -> Option<usize> {
        let tcb = self.tcb_mut(id).ok()?;
        let wait = tcb.wait.as_mut()?;
        wait.outcome = Some(outcome);
        tcb.wait_seq = tcb.wait_seq.wrapping_add(1);
        let priority = tcb.priority;

        match tcb.state {
            TaskState::Blocked => self.make_ready(id),
            TaskState::Suspended => tcb.resume_state = TaskState::Ready,
            _ => {}
        }

        trace!("Task #{} is unblocked", id.index);

        Some(priority)
    }

    /// Takes the outcome of a finished wait on `on`. Any other record is stale and dropped.
    pub(crate) fn take_outcome(&mut self, id: TaskId, on: WaitOn) -> Option<Result<Wakeup<M>, Error>> {
        let wait = self.tcb_mut(id).ok()?.wait.take()?;
        if wait.on == on {
            return wait.outcome;
        }
        if wait.outcome.is_some() {
            warn!("Task #{} dropped the result of a finished wait", id.index);
        }
        None
    }

    fn wait_queue_mut(&mut self, on: WaitOn) -> Option<&mut WaitQueue> {
        match on {
            WaitOn::Delay => None,
            WaitOn::Semaphore(sem) => self.semaphores.get_mut(sem.0).map(|s| &mut s.waiters),
            WaitOn::Send(queue) => self.queues.get_mut(queue.0).map(|q| &mut q.senders),
            WaitOn::Receive(queue) => self.queues.get_mut(queue.0).map(|q| &mut q.receivers),
            WaitOn::Select(set) => self.sets.get_mut(set.0).map(|s| &mut s.waiters),
        }
    }

    /// Pending wait of `id`, if it is still registered on a primitive.
    fn pending_wait(&self, id: TaskId) -> Option<WaitOn> {
        let wait = self.tcb(id).ok()?.wait.as_ref()?;
        if wait.outcome.is_none() { Some(wait.on) } else { None }
    }

    fn detach_waiter(&mut self, id: TaskId) {
        if let Some(on) = self.pending_wait(id)
            && let Some(queue) = self.wait_queue_mut(on)
        {
            queue.remove(id);
        }
    }

    fn suspend(&mut self, id: TaskId) -> Result<(), Error> {
        let tcb = self.tcb_mut(id)?;
        let previous = tcb.state;
        let priority = tcb.priority;
        match previous {
            TaskState::Suspended | TaskState::Deleted => return Ok(()),
            TaskState::Blocked => tcb.resume_state = TaskState::Blocked,
            TaskState::Ready | TaskState::Running => tcb.resume_state = TaskState::Ready,
        }
        tcb.state = TaskState::Suspended;

        match previous {
            TaskState::Ready => self.remove_from_ready(id, priority),
            // A suspended task must not be handed a unit, message or member.
            // It leaves the wait queue and re-issues the call once resumed
            TaskState::Blocked => {
                if let Some(on) = self.pending_wait(id)
                    && on != WaitOn::Delay
                {
                    self.detach_waiter(id);
                    if let Ok(tcb) = self.tcb_mut(id) {
                        tcb.resume_state = TaskState::Ready;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn resume(&mut self, id: TaskId) -> Result<(), Error> {
        let tcb = self.tcb_mut(id)?;
        if tcb.state != TaskState::Suspended {
            return Ok(());
        }
        if tcb.resume_state == TaskState::Blocked {
            tcb.state = TaskState::Blocked;
        } else {
            self.make_ready(id);
        }
        Ok(())
    }

    fn delete(&mut self, id: TaskId) -> Result<(), Error> {
        self.tcb(id)?;
        self.remove_task(id);
        Ok(())
    }

    fn remove_task(&mut self, id: TaskId) {
        let Ok(tcb) = self.tcb(id) else {
            return;
        };
        if tcb.state == TaskState::Ready {
            let priority = tcb.priority;
            self.remove_from_ready(id, priority);
        }
        self.detach_waiter(id);

        self.tasks[id.index] = None;
        self.generations[id.index] = self.generations[id.index].wrapping_add(1);
        if self.current == Some(id) {
            self.current = None;
        }
    }

    fn set_priority(&mut self, id: TaskId, priority: usize) -> Result<(), Error> {
        let tcb = self.tcb_mut(id)?;
        let old = tcb.priority;
        let state = tcb.state;
        tcb.priority = priority;

        if state == TaskState::Ready {
            self.remove_from_ready(id, old);
            self.ready[priority]
                .push_back(id)
                .unwrap_or_else(|_| unreachable!());
        }
        if let Some(on) = self.pending_wait(id)
            && let Some(queue) = self.wait_queue_mut(on)
        {
            queue.reprioritize(id, priority);
        }
        Ok(())
    }

    fn tick(&mut self, time_slice: u32) {
        match self.running() {
            Some(id) => {
                if let Ok(tcb) = self.tcb_mut(id) {
                    tcb.run_ticks += 1;
                }
            }
            None => self.idle_ticks += 1,
        }

        let now = self.timer.advance();
        trace!("Tick {}", now);

        while let Some(entry) = self.timer.pop_expired() {
            self.expire(entry);
        }

        #[cfg(feature = "round-robin")]
        if let Some(id) = self.running() {
            self.slice_used += 1;
            let priority = self.tcb(id).map_or(0, |tcb| tcb.priority);
            if self.slice_used >= time_slice && !self.ready[priority].is_empty() {
                trace!("Time slice of task #{} expired", id.index);
                self.make_ready(id);
                self.slice_used = 0;
            }
        }
        #[cfg(not(feature = "round-robin"))]
        let _ = time_slice;

        self.slice_done = false;
    }

    fn expire(&mut self, entry: TimerEntry) {
        if !entry_is_live(&self.tasks, &entry) {
            return;
        }
        let Some(on) = self.pending_wait(entry.task) else {
            return;
        };
        self.detach_waiter(entry.task);

        let outcome = if on == WaitOn::Delay {
            Ok(Wakeup::Signaled)
        } else {
            warn!("Task #{} timed out", entry.task.index);
            Err(Error::TimedOut)
        };
        self.complete_wait(entry.task, outcome);
    }
}

/// Whether a timer entry still belongs to an ongoing wait.
fn entry_is_live<M>(tasks: &[Option<Tcb<M>>], entry: &TimerEntry) -> bool {
    match tasks.get(entry.task.index) {
        Some(Some(tcb)) => {
            tcb.generation == entry.task.generation
                && tcb.wait_seq == entry.wait_seq
                && tcb.wait.as_ref().is_some_and(|wait| wait.outcome.is_none())
        }
        _ => false,
    }
}
