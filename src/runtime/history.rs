use crate::document::Document;
use std::collections::VecDeque;
use std::num::NonZeroUsize;

/// Bounded undo/redo ring.
///
/// `entries[..index]` are the states to return to on undo, oldest first;
/// `entries[index..]` are the states to return to on redo. Moving the cursor
/// swaps the live state into the slot it leaves, so a slot always holds the
/// state on the other side of the cursor from the live one.
#[derive(Debug, Clone)]
pub(crate) struct History {
    entries: VecDeque<Document>,
    index: usize,
    max_size: NonZeroUsize,
}

impl History {
    pub(crate) fn new(max_size: NonZeroUsize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_size.get()),
            index: 0,
            max_size,
        }
    }

    /// Records the state an edit is about to replace.
    ///
    /// Redo entries are discarded first. When the ring is full the oldest
    /// entry is evicted and the cursor stays put. Returns whether an entry
    /// was evicted.
    pub(crate) fn push(&mut self, snapshot: Document) -> bool {
        self.entries.truncate(self.index);
        self.entries.push_back(snapshot);
        if self.entries.len() > self.max_size.get() {
            self.entries.pop_front();
            true
        } else {
            self.index += 1;
            false
        }
    }

    pub(crate) fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub(crate) fn can_redo(&self) -> bool {
        self.index < self.entries.len()
    }

    pub(crate) fn undo(&mut self, current: Document) -> Option<Document> {
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        Some(std::mem::replace(&mut self.entries[self.index], current))
    }

    pub(crate) fn redo(&mut self, current: Document) -> Option<Document> {
        if !self.can_redo() {
            return None;
        }
        let next = std::mem::replace(&mut self.entries[self.index], current);
        self.index += 1;
        Some(next)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn max_size(&self) -> NonZeroUsize {
        self.max_size
    }
}
