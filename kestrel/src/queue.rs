//! Bounded FIFO message queues with blocking send and receive.

use core::task::Poll;

use heapless::Deque;

use crate::{
    Error, MAX_QUEUE_LEN,
    queue_set::{QueueSetId, QueueSetMember},
    scheduler::{Kernel, KernelState, WaitOn, Wakeup},
    task::{TaskId, Timeout},
    wait_queue::WaitQueue,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QueueId(pub(crate) usize);

pub(crate) struct QueueState<M> {
    capacity: usize,
    pub(crate) buffer: Deque<M, MAX_QUEUE_LEN>,
    /// Blocked because the queue was full
    pub(crate) senders: WaitQueue,
    /// Blocked because the queue was empty
    pub(crate) receivers: WaitQueue,
    pub(crate) set: Option<QueueSetId>,
}

impl<M> QueueState<M> {
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<M> Kernel<M> {
    /// Creates a queue holding up to `capacity` messages.
    pub fn create_queue(&self, capacity: usize) -> Result<QueueId, Error> {
        if capacity == 0 || capacity > MAX_QUEUE_LEN {
            return Err(Error::ResourceExhausted);
        }
        let queue = self.with_state(|state| {
            let id = QueueId(state.queues.len());
            state
                .queues
                .push(QueueState {
                    capacity,
                    buffer: Deque::new(),
                    senders: WaitQueue::new(),
                    receivers: WaitQueue::new(),
                    set: None,
                })
                .or(Err(Error::ResourceExhausted))?;
            Ok(id)
        })?;

        debug!("Queue #{} created (capacity {})", queue.0, capacity);

        Ok(queue)
    }

    pub(crate) fn send_as(
        &self,
        id: TaskId,
        queue: QueueId,
        msg: M,
        timeout: Timeout,
    ) -> Poll<Result<(), Error>> {
        self.with_state(|state| {
            if let Some(outcome) = state.take_outcome(id, WaitOn::Send(queue)) {
                return Poll::Ready(outcome.map(|_| ()));
            }
            if let Err(e) = state.check_running(id) {
                return Poll::Ready(Err(e));
            }

            let msg = match state.push_message(queue, msg) {
                Ok(Ok(_)) => return Poll::Ready(Ok(())),
                Ok(Err(msg)) => msg,
                Err(e) => return Poll::Ready(Err(e)),
            };
            if timeout.is_non_blocking() {
                warn!("Queue #{} is full", queue.0);
                return Poll::Ready(Err(Error::TimedOut));
            }

            let now = state.now();
            let priority = state.tcb(id).map_or(0, |tcb| tcb.priority);
            if let Some(q) = state.queues.get_mut(queue.0) {
                q.senders.push(id, priority);
            }
            state.block(id, WaitOn::Send(queue), timeout.deadline(now), Some(msg));
            Poll::Pending
        })
    }

    pub(crate) fn receive_as(
        &self,
        id: TaskId,
        queue: QueueId,
        timeout: Timeout,
    ) -> Poll<Result<M, Error>> {
        self.with_state(|state| {
            if let Some(outcome) = state.take_outcome(id, WaitOn::Receive(queue)) {
                return Poll::Ready(outcome.map(|wakeup| match wakeup {
                    Wakeup::Message(msg) => msg,
                    _ => unreachable!(),
                }));
            }
            if let Err(e) = state.check_running(id) {
                return Poll::Ready(Err(e));
            }

            match state.pop_message(queue) {
                Ok(Some(msg)) => return Poll::Ready(Ok(msg)),
                Ok(None) => {}
                Err(e) => return Poll::Ready(Err(e)),
            }
            if timeout.is_non_blocking() {
                return Poll::Ready(Err(Error::TimedOut));
            }

            let now = state.now();
            let priority = state.tcb(id).map_or(0, |tcb| tcb.priority);
            if let Some(q) = state.queues.get_mut(queue.0) {
                q.receivers.push(id, priority);
            }
            state.block(id, WaitOn::Receive(queue), timeout.deadline(now), None);
            Poll::Pending
        })
    }

    /// Non-blocking send usable outside of tasks. Fails with `Overflow` when the queue is full.
    pub fn try_send(&self, queue: QueueId, msg: M) -> Result<(), Error> {
        match self.with_state(|state| state.push_message(queue, msg))? {
            Ok(_) => Ok(()),
            Err(_) => {
                warn!("Queue #{} is full", queue.0);
                Err(Error::Overflow)
            }
        }
    }

    /// Non-blocking receive usable outside of tasks. Fails with `TimedOut` when the queue is empty.
    pub fn try_receive(&self, queue: QueueId) -> Result<M, Error> {
        self.with_state(|state| state.pop_message(queue))?
            .ok_or(Error::TimedOut)
    }

    /// Non-blocking send usable from interrupt context.
    ///
    /// Returns `Ok(true)` when a task with a higher priority than the running
    /// one was woken; the reschedule request is raised in that case as well.
    pub fn send_from_interrupt(&self, queue: QueueId, msg: M) -> Result<bool, Error> {
        let higher = self.with_state(|state| {
            let woken = match state.push_message(queue, msg)? {
                Ok(woken) => woken,
                Err(_) => return Err(Error::Overflow),
            };
            Ok(match (woken, state.running_priority()) {
                (Some(woken), Some(running)) => woken > running,
                (Some(_), None) => true,
                (None, _) => false,
            })
        })?;

        if higher {
            self.request_yield();
        }
        Ok(higher)
    }

    /// Number of stored messages and free slots. Has no side effects.
    pub fn peek_depth(&self, queue: QueueId) -> Result<(usize, usize), Error> {
        self.with_state(|state| {
            let q = state.queues.get(queue.0).ok_or(Error::NotFound)?;
            Ok((q.buffer.len(), q.capacity - q.buffer.len()))
        })
    }

    pub fn queue_depth(&self, queue: QueueId) -> Result<(usize, usize), Error> {
        self.peek_depth(queue)
    }
}

impl<M> KernelState<M> {
    /// Appends `msg`, or hands it straight to the first waiting receiver.
    ///
    /// Gives the message back when the queue is full. On success returns the
    /// priority of the task woken by the send, if any.
    pub(crate) fn push_message(
        &mut self,
        queue: QueueId,
        msg: M,
    ) -> Result<Result<Option<usize>, M>, Error> {
        let q = self.queues.get_mut(queue.0).ok_or(Error::NotFound)?;

        // Receivers only wait on an empty buffer, so the handoff keeps FIFO order
        if let Some(receiver) = q.receivers.pop_front() {
            return Ok(Ok(self.complete_wait(receiver, Ok(Wakeup::Message(msg)))));
        }

        if q.buffer.len() >= q.capacity {
            return Ok(Err(msg));
        }
        q.buffer
            .push_back(msg)
            .unwrap_or_else(|_| unreachable!());

        Ok(Ok(self.post_token(QueueSetMember::Queue(queue))))
    }

    /// Pops the oldest message and lets the first blocked sender refill the freed slot.
    pub(crate) fn pop_message(&mut self, queue: QueueId) -> Result<Option<M>, Error> {
        let q = self.queues.get_mut(queue.0).ok_or(Error::NotFound)?;
        let Some(msg) = q.buffer.pop_front() else {
            return Ok(None);
        };
        let sender = q.senders.pop_front();
        self.consume_token(QueueSetMember::Queue(queue));

        if let Some(sender) = sender {
            let outgoing = self
                .tcb_mut(sender)
                .ok()
                .and_then(|tcb| tcb.wait.as_mut())
                .and_then(|wait| wait.outgoing.take());
            if let Some(outgoing) = outgoing
                && let Some(q) = self.queues.get_mut(queue.0)
            {
                q.buffer
                    .push_back(outgoing)
                    .unwrap_or_else(|_| unreachable!());
                self.post_token(QueueSetMember::Queue(queue));
            }
            self.complete_wait(sender, Ok(Wakeup::Signaled));
        }

        Ok(Some(msg))
    }
}
