//! Binary and counting semaphores, and mutexes.
//!
//! A mutex is a binary semaphore that starts available and remembers its
//! holder. There is no priority inheritance: a low-priority holder keeps its
//! priority while higher-priority tasks wait for it.

use core::task::Poll;

use crate::{
    Error,
    queue_set::{QueueSetId, QueueSetMember},
    scheduler::{Kernel, KernelState, WaitOn, Wakeup},
    task::{TaskId, Timeout},
    wait_queue::WaitQueue,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SemaphoreId(pub(crate) usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SemaphoreKind {
    Binary,
    Counting,
    Mutex,
}

pub(crate) struct SemaphoreState {
    kind: SemaphoreKind,
    pub(crate) count: usize,
    pub(crate) max: usize,
    owner: Option<TaskId>,
    pub(crate) waiters: WaitQueue,
    pub(crate) set: Option<QueueSetId>,
}

impl<M> Kernel<M> {
    /// Creates a binary semaphore that starts empty.
    pub fn create_binary(&self) -> Result<SemaphoreId, Error> {
        self.create_semaphore(SemaphoreKind::Binary, 1, 0)
    }

    pub fn create_counting(&self, max: usize, initial: usize) -> Result<SemaphoreId, Error> {
        if initial > max {
            return Err(Error::Overflow);
        }
        self.create_semaphore(SemaphoreKind::Counting, max, initial)
    }

    /// Creates a mutex that starts unlocked.
    pub fn create_mutex(&self) -> Result<SemaphoreId, Error> {
        self.create_semaphore(SemaphoreKind::Mutex, 1, 1)
    }

    fn create_semaphore(
        &self,
        kind: SemaphoreKind,
        max: usize,
        initial: usize,
    ) -> Result<SemaphoreId, Error> {
        if max == 0 {
            return Err(Error::ResourceExhausted);
        }
        let sem = self.with_state(|state| {
            let id = SemaphoreId(state.semaphores.len());
            state
                .semaphores
                .push(SemaphoreState {
                    kind,
                    count: initial,
                    max,
                    owner: None,
                    waiters: WaitQueue::new(),
                    set: None,
                })
                .or(Err(Error::ResourceExhausted))?;
            Ok(id)
        })?;

        debug!("Semaphore #{} created (max {})", sem.0, max);

        Ok(sem)
    }

    pub(crate) fn take_as(
        &self,
        id: TaskId,
        sem: SemaphoreId,
        timeout: Timeout,
    ) -> Poll<Result<(), Error>> {
        self.with_state(|state| {
            if let Some(outcome) = state.take_outcome(id, WaitOn::Semaphore(sem)) {
                return Poll::Ready(outcome.map(|_| ()));
            }
            if let Err(e) = state.check_running(id) {
                return Poll::Ready(Err(e));
            }
            let now = state.now();
            let priority = match state.tcb(id) {
                Ok(tcb) => tcb.priority,
                Err(e) => return Poll::Ready(Err(e)),
            };

            let Some(semaphore) = state.semaphores.get_mut(sem.0) else {
                return Poll::Ready(Err(Error::NotFound));
            };
            if semaphore.count > 0 {
                semaphore.count -= 1;
                if semaphore.kind == SemaphoreKind::Mutex {
                    semaphore.owner = Some(id);
                }
                state.consume_token(QueueSetMember::Semaphore(sem));
                return Poll::Ready(Ok(()));
            }

            if timeout.is_non_blocking() {
                return Poll::Ready(Err(Error::TimedOut));
            }
            semaphore.waiters.push(id, priority);
            state.block(id, WaitOn::Semaphore(sem), timeout.deadline(now), None);
            Poll::Pending
        })
    }

    pub(crate) fn give_as(&self, caller: Option<TaskId>, sem: SemaphoreId) -> Result<(), Error> {
        self.with_state(|state| state.signal(sem, caller))?;
        Ok(())
    }

    /// Non-blocking give usable from interrupt context.
    ///
    /// Returns `true` when a task with a higher priority than the running one
    /// was woken; the reschedule request is raised in that case as well.
    pub fn give_from_interrupt(&self, sem: SemaphoreId) -> bool {
        let woken = self.with_state(|state| {
            let woken = match state.signal(sem, None) {
                Ok(woken) => woken,
                Err(_) => return false,
            };
            match (woken, state.running_priority()) {
                (Some(woken), Some(running)) => woken > running,
                (Some(_), None) => true,
                (None, _) => false,
            }
        });

        if woken {
            self.request_yield();
        }
        woken
    }

    pub fn semaphore_count(&self, sem: SemaphoreId) -> Result<usize, Error> {
        self.with_state(|state| {
            state
                .semaphores
                .get(sem.0)
                .map(|s| s.count)
                .ok_or(Error::NotFound)
        })
    }

    /// The task holding a mutex. Always `None` for other semaphores.
    pub fn mutex_holder(&self, sem: SemaphoreId) -> Result<Option<TaskId>, Error> {
        self.with_state(|state| {
            state
                .semaphores
                .get(sem.0)
                .map(|s| s.owner)
                .ok_or(Error::NotFound)
        })
    }
}

impl<M> KernelState<M> {
    /// Gives one unit. A waiting task receives it directly (and the mutex
    /// ownership with it) before it becomes Ready. Returns the priority of
    /// the woken task, if any.
    fn signal(&mut self, sem: SemaphoreId, caller: Option<TaskId>) -> Result<Option<usize>, Error> {
        let semaphore = self.semaphores.get_mut(sem.0).ok_or(Error::NotFound)?;

        if semaphore.kind == SemaphoreKind::Mutex
            && semaphore.owner.is_some()
            && semaphore.owner != caller
        {
            return Err(Error::NotOwner);
        }
        if semaphore.count >= semaphore.max {
            warn!("Semaphore #{} is already given", sem.0);
            return Err(Error::Overflow);
        }

        if let Some(waiter) = semaphore.waiters.pop_front() {
            if semaphore.kind == SemaphoreKind::Mutex {
                semaphore.owner = Some(waiter);
            }
            return Ok(self.complete_wait(waiter, Ok(Wakeup::Signaled)));
        }

        semaphore.count += 1;
        semaphore.owner = None;
        Ok(self.post_token(QueueSetMember::Semaphore(sem)))
    }
}
