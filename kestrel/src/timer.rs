//! Time management.
//!
//! Time is represented as the number of ticks since the kernel was created.
//! Wait deadlines are kept in a heap based timer, which is a variation of Scheme 3 described in the following paper:
//!     G. Varghese and T. Lauck, “Hashed and hierarchical timing wheels: data structures for the efficient implementation of a timer facility,” in Proceedings of the eleventh ACM Symposium on Operating systems principles - SOSP ’87, Austin, Texas, United States, 1987.
//!
//! Entries are never removed when a wait ends early. Each entry carries the
//! sequence number of the wait it belongs to, and the scheduler ignores
//! entries whose wait is already over.

use heapless::{BinaryHeap, Vec, binary_heap::Min};

use crate::{MAX_TASKS, task::TaskId};

const MAX_TIMER_REGS: usize = 4 * MAX_TASKS;

#[derive(Clone, Copy, Debug)]
pub(crate) struct TimerEntry {
    pub(crate) time: u64,
    pub(crate) task: TaskId,
    pub(crate) wait_seq: u32,
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.time.cmp(&other.time)
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// This is strange, but necessary for consistency of `Ord` and `Eq`.
impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time
    }
}

impl Eq for TimerEntry {}

pub(crate) struct Timer {
    time: u64,
    queue: BinaryHeap<TimerEntry, Min, MAX_TIMER_REGS>,
}

impl Timer {
    pub(crate) fn new() -> Self {
        Self {
            time: 0,
            queue: BinaryHeap::new(),
        }
    }

    pub(crate) fn now(&self) -> u64 {
        self.time
    }

    pub(crate) fn advance(&mut self) -> u64 {
        self.time += 1;
        self.time
    }

    /// Registers a one-shot deadline.
    ///
    /// When the heap is full, entries rejected by `is_live` are dropped first.
    /// At most one entry per task is live, so compaction always makes room.
    pub(crate) fn arm(&mut self, entry: TimerEntry, is_live: impl Fn(&TimerEntry) -> bool) {
        let Err(entry) = self.queue.push(entry) else {
            return;
        };

        let mut live: Vec<TimerEntry, MAX_TIMER_REGS> = Vec::new();
        while let Some(old) = self.queue.pop() {
            if is_live(&old) {
                live.push(old).unwrap_or_else(|_| unreachable!());
            }
        }
        for old in live {
            self.queue.push(old).unwrap_or_else(|_| unreachable!());
        }
        self.queue.push(entry).unwrap_or_else(|_| unreachable!());
    }

    /// Pops the earliest entry if it is due.
    pub(crate) fn pop_expired(&mut self) -> Option<TimerEntry> {
        match self.queue.peek() {
            Some(top) if top.time <= self.time => self.queue.pop(),
            _ => None,
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }
}
