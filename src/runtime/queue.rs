use crate::document::Document;
use std::collections::{BTreeMap, HashSet};
use std::task::{Poll, Waker};

/// Position in the single-writer queue, handed out in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Ticket(u64);

/// State change that arrived while a dispatch held the writer slot.
#[derive(Debug)]
pub(crate) enum DeferredOp {
    Undo,
    Redo,
    Replace(Document),
}

/// FIFO of writers. Exactly one ticket is served at a time; dispatches wait
/// for their turn, synchronous operations queued behind them are parked in
/// `deferred` and run by whoever releases the slot before them.
#[derive(Debug, Default)]
pub(crate) struct WriterQueue {
    next: u64,
    serving: u64,
    wakers: BTreeMap<u64, Waker>,
    abandoned: HashSet<u64>,
    deferred: BTreeMap<u64, DeferredOp>,
}

impl WriterQueue {
    pub(crate) fn is_idle(&self) -> bool {
        self.serving == self.next
    }

    pub(crate) fn enqueue(&mut self) -> Ticket {
        let ticket = Ticket(self.next);
        self.next += 1;
        ticket
    }

    pub(crate) fn defer(&mut self, op: DeferredOp) {
        let Ticket(ticket) = self.enqueue();
        self.deferred.insert(ticket, op);
    }

    pub(crate) fn poll_turn(&mut self, ticket: Ticket, waker: &Waker) -> Poll<()> {
        if self.serving == ticket.0 {
            self.wakers.remove(&ticket.0);
            Poll::Ready(())
        } else {
            self.wakers.insert(ticket.0, waker.clone());
            Poll::Pending
        }
    }

    /// Gives up `ticket`. The slot moves on if the ticket was being served;
    /// otherwise it is skipped when its turn comes.
    pub(crate) fn release(&mut self, ticket: Ticket) {
        self.wakers.remove(&ticket.0);
        if self.serving == ticket.0 {
            self.serving += 1;
        } else if ticket.0 > self.serving {
            self.abandoned.insert(ticket.0);
        }
    }

    /// Advances past abandoned tickets. Returns the next deferred operation
    /// if one is now at the head (its ticket is consumed); otherwise wakes the
    /// dispatch waiting at the head, if any, and returns `None`.
    pub(crate) fn next_deferred(&mut self) -> Option<DeferredOp> {
        while !self.is_idle() {
            if self.abandoned.remove(&self.serving) {
                self.serving += 1;
                continue;
            }
            if let Some(op) = self.deferred.remove(&self.serving) {
                self.serving += 1;
                return Some(op);
            }
            if let Some(waker) = self.wakers.remove(&self.serving) {
                waker.wake();
            }
            return None;
        }
        None
    }
}
