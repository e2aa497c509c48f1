use heapless::Vec;

use crate::{MAX_TASKS, task::TaskId};

/// Tasks blocked on one primitive, highest priority first and FIFO among equals.
///
/// Only ids are stored; the task table stays the single owner of every task.
#[derive(Clone, Debug, Default)]
pub(crate) struct WaitQueue {
    entries: Vec<(TaskId, usize), MAX_TASKS>,
}

impl WaitQueue {
    pub(crate) const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Inserts behind every waiter whose priority is the same or higher.
    pub(crate) fn push(&mut self, id: TaskId, priority: usize) {
        let pos = self
            .entries
            .iter()
            .position(|(_, p)| *p < priority)
            .unwrap_or(self.entries.len());
        // A task waits on at most one queue, so MAX_TASKS entries always fit
        self.entries
            .insert(pos, (id, priority))
            .unwrap_or_else(|_| unreachable!());
    }

    pub(crate) fn pop_front(&mut self) -> Option<TaskId> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0).0)
        }
    }

    pub(crate) fn remove(&mut self, id: TaskId) -> bool {
        match self.entries.iter().position(|(waiter, _)| *waiter == id) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Moves a waiter to the position matching its new priority.
    pub(crate) fn reprioritize(&mut self, id: TaskId, priority: usize) {
        if self.remove(id) {
            self.push(id, priority);
        }
    }

    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
