//! Queue sets: one wait across several queues and semaphores.
//!
//! Every time data becomes available in a member, the set records a readiness
//! token for it. A selecting task pops the oldest token whose member still
//! holds data. Tokens never outnumber the data in their member: taking data
//! out of a member directly drops its oldest excess tokens.

use core::task::Poll;

use heapless::{Deque, Vec};

use crate::{
    Error, MAX_SET_CAPACITY, MAX_SET_MEMBERS,
    queue::QueueId,
    scheduler::{Kernel, KernelState, WaitOn, Wakeup},
    semaphore::SemaphoreId,
    task::{TaskId, Timeout},
    wait_queue::WaitQueue,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QueueSetId(pub(crate) usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueueSetMember {
    Queue(QueueId),
    Semaphore(SemaphoreId),
}

impl From<QueueId> for QueueSetMember {
    fn from(queue: QueueId) -> Self {
        Self::Queue(queue)
    }
}

impl From<SemaphoreId> for QueueSetMember {
    fn from(sem: SemaphoreId) -> Self {
        Self::Semaphore(sem)
    }
}

pub(crate) struct QueueSetState {
    capacity: usize,
    /// Sum of the capacities of all members
    reserved: usize,
    members: Vec<QueueSetMember, MAX_SET_MEMBERS>,
    tokens: Deque<QueueSetMember, MAX_SET_CAPACITY>,
    pub(crate) waiters: WaitQueue,
}

impl<M> Kernel<M> {
    /// Creates a set whose members may hold up to `capacity` items in total.
    pub fn create_set(&self, capacity: usize) -> Result<QueueSetId, Error> {
        if capacity == 0 || capacity > MAX_SET_CAPACITY {
            return Err(Error::ResourceExhausted);
        }
        let set = self.with_state(|state| {
            let id = QueueSetId(state.sets.len());
            state
                .sets
                .push(QueueSetState {
                    capacity,
                    reserved: 0,
                    members: Vec::new(),
                    tokens: Deque::new(),
                    waiters: WaitQueue::new(),
                })
                .or(Err(Error::ResourceExhausted))?;
            Ok(id)
        })?;

        debug!("Queue set #{} created (capacity {})", set.0, capacity);

        Ok(set)
    }

    pub fn add_member(
        &self,
        set: QueueSetId,
        member: impl Into<QueueSetMember>,
    ) -> Result<(), Error> {
        let member = member.into();
        self.with_state(|state| {
            if state.member_set(member)?.is_some() {
                return Err(Error::AlreadyMember);
            }
            let capacity = state.member_capacity(member)?;
            let items = state.member_len(member)?;

            let s = state.sets.get_mut(set.0).ok_or(Error::NotFound)?;
            if s.reserved + capacity > s.capacity {
                return Err(Error::AlreadyFull);
            }
            s.members.push(member).or(Err(Error::AlreadyFull))?;
            s.reserved += capacity;

            state.set_member_set(member, Some(set));
            // Data already in the member must be visible to `select`
            for _ in 0..items {
                state.post_token(member);
            }
            Ok(())
        })
    }

    /// Removes an empty member from its set.
    pub fn remove_member(
        &self,
        set: QueueSetId,
        member: impl Into<QueueSetMember>,
    ) -> Result<(), Error> {
        let member = member.into();
        self.with_state(|state| {
            if state.member_set(member)? != Some(set) {
                return Err(Error::NotFound);
            }
            if state.member_len(member)? > 0 {
                return Err(Error::NotEmpty);
            }
            let capacity = state.member_capacity(member)?;

            let s = state.sets.get_mut(set.0).ok_or(Error::NotFound)?;
            s.members.retain(|m| *m != member);
            s.reserved -= capacity;

            state.set_member_set(member, None);
            Ok(())
        })
    }

    pub(crate) fn select_as(
        &self,
        id: TaskId,
        set: QueueSetId,
        timeout: Timeout,
    ) -> Poll<Result<QueueSetMember, Error>> {
        self.with_state(|state| {
            if let Some(outcome) = state.take_outcome(id, WaitOn::Select(set)) {
                return Poll::Ready(outcome.map(|wakeup| match wakeup {
                    Wakeup::Member(member) => member,
                    _ => unreachable!(),
                }));
            }
            if let Err(e) = state.check_running(id) {
                return Poll::Ready(Err(e));
            }

            match state.pop_token(set) {
                Ok(Some(member)) => return Poll::Ready(Ok(member)),
                Ok(None) => {}
                Err(e) => return Poll::Ready(Err(e)),
            }
            if timeout.is_non_blocking() {
                return Poll::Ready(Err(Error::TimedOut));
            }

            let now = state.now();
            let priority = state.tcb(id).map_or(0, |tcb| tcb.priority);
            if let Some(s) = state.sets.get_mut(set.0) {
                s.waiters.push(id, priority);
            }
            state.block(id, WaitOn::Select(set), timeout.deadline(now), None);
            Poll::Pending
        })
    }
}

impl<M> KernelState<M> {
    fn member_set(&self, member: QueueSetMember) -> Result<Option<QueueSetId>, Error> {
        match member {
            QueueSetMember::Queue(queue) => self.queues.get(queue.0).map(|q| q.set),
            QueueSetMember::Semaphore(sem) => self.semaphores.get(sem.0).map(|s| s.set),
        }
        .ok_or(Error::NotFound)
    }

    fn set_member_set(&mut self, member: QueueSetMember, set: Option<QueueSetId>) {
        match member {
            QueueSetMember::Queue(queue) => {
                if let Some(q) = self.queues.get_mut(queue.0) {
                    q.set = set;
                }
            }
            QueueSetMember::Semaphore(sem) => {
                if let Some(s) = self.semaphores.get_mut(sem.0) {
                    s.set = set;
                }
            }
        }
    }

    fn member_capacity(&self, member: QueueSetMember) -> Result<usize, Error> {
        match member {
            QueueSetMember::Queue(queue) => self.queues.get(queue.0).map(|q| q.capacity()),
            QueueSetMember::Semaphore(sem) => self.semaphores.get(sem.0).map(|s| s.max),
        }
        .ok_or(Error::NotFound)
    }

    /// Messages stored in a queue, or units available in a semaphore.
    fn member_len(&self, member: QueueSetMember) -> Result<usize, Error> {
        match member {
            QueueSetMember::Queue(queue) => self.queues.get(queue.0).map(|q| q.buffer.len()),
            QueueSetMember::Semaphore(sem) => self.semaphores.get(sem.0).map(|s| s.count),
        }
        .ok_or(Error::NotFound)
    }

    /// Announces one new item in `member`.
    ///
    /// A selecting task gets the member right away; otherwise a token is queued.
    /// Returns the priority of the woken selector, if any.
    pub(crate) fn post_token(&mut self, member: QueueSetMember) -> Option<usize> {
        let set = self.member_set(member).ok()??;
        let s = self.sets.get_mut(set.0)?;

        if let Some(waiter) = s.waiters.pop_front() {
            return self.complete_wait(waiter, Ok(Wakeup::Member(member)));
        }

        // Tokens never outnumber items, and items never exceed the reserved capacity
        s.tokens
            .push_back(member)
            .unwrap_or_else(|_| unreachable!());
        None
    }

    /// Drops the oldest tokens of `member` that no longer have an item behind them.
    pub(crate) fn consume_token(&mut self, member: QueueSetMember) {
        let Ok(Some(set)) = self.member_set(member) else {
            return;
        };
        let Ok(items) = self.member_len(member) else {
            return;
        };
        let Some(s) = self.sets.get_mut(set.0) else {
            return;
        };

        let tokens = s.tokens.iter().filter(|m| **m == member).count();
        let mut excess = tokens.saturating_sub(items);
        if excess == 0 {
            return;
        }

        let mut kept = Deque::new();
        while let Some(token) = s.tokens.pop_front() {
            if token == member && excess > 0 {
                excess -= 1;
                continue;
            }
            kept.push_back(token).unwrap_or_else(|_| unreachable!());
        }
        s.tokens = kept;
    }

    /// Pops the oldest token whose member still holds data.
    fn pop_token(&mut self, set: QueueSetId) -> Result<Option<QueueSetMember>, Error> {
        loop {
            let s = self.sets.get_mut(set.0).ok_or(Error::NotFound)?;
            let Some(member) = s.tokens.pop_front() else {
                return Ok(None);
            };
            if self.member_len(member)? > 0 {
                return Ok(Some(member));
            }
            trace!("Stale token dropped from queue set #{}", set.0);
        }
    }
}
