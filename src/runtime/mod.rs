//! Command runtime: the single mutable owner of the current document.
//!
//! All state changes go through one FIFO writer queue. `dispatch` takes its
//! place in the queue when it is called and holds the writer slot while its
//! handler runs, even if the handler suspends. `undo`, `redo`, `set_state`
//! and `import_snapshot` run at once when the queue is empty and are queued
//! behind in-flight dispatches otherwise.
//!
//! ```rust
//! use mindmap_core::{Action, CommandRuntime, Document, Node, NodeData, RuntimeConfig};
//!
//! let doc = Document::new(Node::new("root", "Mind Map")).unwrap();
//! let runtime = CommandRuntime::with_builtin_actions(doc, &RuntimeConfig::default());
//!
//! futures::executor::block_on(
//!     runtime.dispatch(Action::add_child("root", &NodeData::new("Idea"))),
//! )
//! .unwrap();
//! assert_eq!(runtime.get_state().root().children.len(), 1);
//!
//! runtime.undo();
//! assert!(runtime.get_state().root().children.is_empty());
//! ```

mod history;
mod queue;

use crate::actions::{Action, ActionRegistry};
use crate::config::RuntimeConfig;
use crate::document::{Document, Node};
use crate::error::{Result, RuntimeError};
use history::History;
use queue::{DeferredOp, Ticket, WriterQueue};
use serde::Deserialize;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace, warn};

pub type Subscriber = dyn Fn(&Document) + Send + Sync;

/// Handle returned by [`CommandRuntime::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Parses a serialized document and checks its id invariants.
///
/// Nesting depth is not limited: anything `add_child` can build must import
/// back. The stack grows on the heap while deserializing deep trees.
pub fn parse_snapshot(text: &str) -> Result<Document> {
    let mut deserializer = serde_json::Deserializer::from_str(text);
    deserializer.disable_recursion_limit();
    let root = Node::deserialize(serde_stacker::Deserializer::new(&mut deserializer))
        .map_err(RuntimeError::ImportParse)?;
    deserializer.end().map_err(RuntimeError::ImportParse)?;
    Ok(Document::new(root)?)
}

pub struct CommandRuntime {
    core: Mutex<RuntimeCore>,
    actions: ActionRegistry,
    subscribers: Mutex<Subscribers>,
}

struct RuntimeCore {
    state: Document,
    history: History,
    queue: WriterQueue,
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    entries: Vec<(SubscriptionId, Arc<Subscriber>)>,
}

impl std::fmt::Debug for CommandRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.lock_core();
        f.debug_struct("CommandRuntime")
            .field("root", &core.state.root_id())
            .field("history_len", &core.history.len())
            .field("history_index", &core.history.index())
            .field("actions", &self.actions)
            .finish()
    }
}

impl RuntimeCore {
    fn apply(&mut self, op: DeferredOp) -> Option<Document> {
        let next = match op {
            DeferredOp::Undo => self.history.undo(self.state.clone())?,
            DeferredOp::Redo => self.history.redo(self.state.clone())?,
            DeferredOp::Replace(document) => {
                self.push_history();
                document
            }
        };
        self.state = next;
        Some(self.state.clone())
    }

    fn push_history(&mut self) {
        if self.history.push(self.state.clone()) {
            trace!(
                max = self.history.max_size().get(),
                "history full, evicted oldest entry"
            );
        }
    }

    /// Runs deferred operations that reached the head of the queue and
    /// collects the states to announce.
    fn drain_deferred(&mut self) -> Vec<Document> {
        let mut changed = Vec::new();
        while let Some(op) = self.queue.next_deferred() {
            debug!(?op, "applying queued operation");
            changed.extend(self.apply(op));
        }
        changed
    }
}

impl CommandRuntime {
    pub fn new(initial: Document, actions: ActionRegistry, config: &RuntimeConfig) -> Self {
        Self {
            core: Mutex::new(RuntimeCore {
                state: initial,
                history: History::new(config.max_history_size),
                queue: WriterQueue::default(),
            }),
            actions,
            subscribers: Mutex::new(Subscribers::default()),
        }
    }

    pub fn with_builtin_actions(initial: Document, config: &RuntimeConfig) -> Self {
        Self::new(initial, ActionRegistry::with_builtins(), config)
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    /// Applies `action` once every earlier writer has finished.
    ///
    /// The pre-action state is pushed to history before the handler runs, so
    /// every successful dispatch consumes one history slot even when the
    /// handler changes nothing. A handler returning `None` leaves the state
    /// as is. Subscribers are notified after every successful dispatch.
    ///
    /// Unknown action types fail immediately without touching history or
    /// notifying anyone. A failing handler leaves state and history exactly
    /// as they were before the call.
    ///
    /// The queue position is taken by this call, not by the first poll. Until
    /// the returned future is awaited or dropped, `undo`, `redo`, `set_state`
    /// and later dispatches wait behind it, so do not hold a dispatch future
    /// without driving it.
    pub fn dispatch(&self, action: Action) -> impl Future<Output = Result<Option<Document>>> + Send + '_ {
        let handler = self.actions.get(&action.action_type);
        let turn = handler.as_ref().map(|_| Turn {
            runtime: self,
            ticket: self.lock_core().queue.enqueue(),
            rollback: None,
            released: false,
        });

        async move {
            let Action {
                action_type,
                params,
            } = action;
            let (Some(handler), Some(mut turn)) = (handler, turn) else {
                warn!(action = %action_type, "unknown action");
                return Err(RuntimeError::UnknownAction { action_type });
            };

            turn.wait().await;
            let snapshot = {
                let mut core = self.lock_core();
                turn.rollback = Some(core.history.clone());
                core.push_history();
                core.state.clone()
            };
            debug!(action = %action_type, "dispatching");

            let outcome = handler.handle(snapshot, params).await;

            let result = {
                let mut core = self.lock_core();
                match outcome {
                    Ok(Some(document)) => {
                        core.state = document.clone();
                        Ok(Some(document))
                    }
                    Ok(None) => Ok(None),
                    Err(source) => {
                        if let Some(history) = turn.rollback.take() {
                            core.history = history;
                        }
                        warn!(action = %action_type, error = %source, "action failed");
                        Err(RuntimeError::Action {
                            action_type,
                            source,
                        })
                    }
                }
            };
            turn.rollback = None;

            let mut changed = Vec::new();
            if result.is_ok() {
                changed.push(self.get_state());
            }
            changed.extend(turn.release());
            self.notify(&changed);
            result
        }
    }

    pub fn get_state(&self) -> Document {
        self.lock_core().state.clone()
    }

    /// Replaces the whole document, recording the previous one in history.
    pub fn set_state(&self, document: Document) {
        self.run_or_defer(DeferredOp::Replace(document));
    }

    pub fn undo(&self) {
        self.run_or_defer(DeferredOp::Undo);
    }

    pub fn redo(&self) {
        self.run_or_defer(DeferredOp::Redo);
    }

    pub fn can_undo(&self) -> bool {
        self.lock_core().history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.lock_core().history.can_redo()
    }

    pub fn history_len(&self) -> usize {
        self.lock_core().history.len()
    }

    /// Number of undo steps available from the current state.
    pub fn history_index(&self) -> usize {
        self.lock_core().history.index()
    }

    pub fn max_history_size(&self) -> usize {
        self.lock_core().history.max_size().get()
    }

    /// Compact JSON form of the current document.
    pub fn export_snapshot(&self) -> Result<String> {
        serde_json::to_string(&self.get_state()).map_err(RuntimeError::Export)
    }

    pub fn export_snapshot_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.get_state()).map_err(RuntimeError::Export)
    }

    /// Replaces the document with a parsed snapshot. On error nothing changes.
    pub fn import_snapshot(&self, text: &str) -> Result<()> {
        let document = parse_snapshot(text).inspect_err(|err| {
            warn!(error = %err, "rejected snapshot import");
        })?;
        self.set_state(document);
        Ok(())
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Document) + Send + Sync + 'static,
    {
        let mut subscribers = self.lock_subscribers();
        let id = SubscriptionId(subscribers.next_id);
        subscribers.next_id += 1;
        subscribers.entries.push((id, Arc::new(callback)));
        id
    }

    /// Removes one registration. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock_subscribers();
        let before = subscribers.entries.len();
        subscribers.entries.retain(|(entry, _)| *entry != id);
        subscribers.entries.len() != before
    }

    fn run_or_defer(&self, op: DeferredOp) {
        let changed: Vec<Document> = {
            let mut core = self.lock_core();
            if core.queue.is_idle() {
                core.apply(op).into_iter().collect()
            } else {
                debug!(?op, "writer busy, queueing operation");
                core.queue.defer(op);
                Vec::new()
            }
        };
        self.notify(&changed);
    }

    // Callbacks run without any runtime lock held so they may call back in.
    fn notify(&self, changed: &[Document]) {
        if changed.is_empty() {
            return;
        }
        let callbacks: Vec<Arc<Subscriber>> = self
            .lock_subscribers()
            .entries
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for state in changed {
            for callback in &callbacks {
                callback(state);
            }
        }
    }

    fn lock_core(&self) -> MutexGuard<'_, RuntimeCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Subscribers> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// A dispatch's place in the writer queue. Dropping it early (a cancelled
/// dispatch future) restores history and hands the slot to the next writer.
struct Turn<'a> {
    runtime: &'a CommandRuntime,
    ticket: Ticket,
    rollback: Option<History>,
    released: bool,
}

impl<'a> Turn<'a> {
    fn wait(&self) -> impl Future<Output = ()> + Send + 'a {
        let runtime = self.runtime;
        let ticket = self.ticket;
        futures::future::poll_fn(move |cx| runtime.lock_core().queue.poll_turn(ticket, cx.waker()))
    }

    fn release(&mut self) -> Vec<Document> {
        self.released = true;
        let mut core = self.runtime.lock_core();
        if let Some(history) = self.rollback.take() {
            core.history = history;
        }
        core.queue.release(self.ticket);
        core.drain_deferred()
    }
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        if !self.released {
            let changed = self.release();
            self.runtime.notify(&changed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionFuture, ActionRegistry};
    use crate::document::NodeData;
    use futures::FutureExt;
    use futures::executor::block_on;
    use std::num::NonZeroUsize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn doc() -> Document {
        Document::new(Node::new("root", "R").with_child(Node::new("a", "A"))).unwrap()
    }

    fn runtime_with(max: usize) -> CommandRuntime {
        CommandRuntime::with_builtin_actions(
            doc(),
            &RuntimeConfig {
                max_history_size: NonZeroUsize::new(max).unwrap(),
            },
        )
    }

    #[test]
    fn dispatch_records_pre_state() {
        let runtime = runtime_with(10);
        block_on(runtime.dispatch(Action::set_text("a", "changed"))).unwrap();
        assert_eq!(runtime.history_len(), 1);
        assert!(runtime.can_undo());
        assert!(!runtime.can_redo());
        runtime.undo();
        assert_eq!(runtime.get_state(), doc());
        assert!(runtime.can_redo());
    }

    #[test]
    fn handler_returning_none_still_uses_a_slot() {
        let mut actions = ActionRegistry::with_builtins();
        actions.register_sync("noop", |_: &Document, _| Ok(None));
        let runtime = CommandRuntime::new(doc(), actions, &RuntimeConfig::default());
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);
        runtime.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let result = block_on(runtime.dispatch(Action::new("noop", serde_json::Value::Null))).unwrap();
        assert!(result.is_none());
        assert_eq!(runtime.history_len(), 1);
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.get_state(), doc());
    }

    #[test]
    fn failed_handler_rolls_back_history() {
        let runtime = runtime_with(10);
        block_on(runtime.dispatch(Action::set_text("a", "one"))).unwrap();
        let err = block_on(runtime.dispatch(Action::add_child("root", &NodeData::new("dup").with_id("a"))))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Action { .. }));
        assert_eq!(runtime.history_len(), 1);
        assert_eq!(runtime.get_state().find("a").unwrap().text, "one");
    }

    #[test]
    fn cancelled_dispatch_frees_the_writer_slot() {
        let mut actions = ActionRegistry::with_builtins();
        actions.register("never", |_: Document, _: serde_json::Value| -> ActionFuture {
            futures::future::pending().boxed()
        });
        let runtime = CommandRuntime::new(doc(), actions, &RuntimeConfig::default());

        let mut stuck = Box::pin(runtime.dispatch(Action::new("never", serde_json::Value::Null)));
        assert!((&mut stuck).now_or_never().is_none());
        runtime.undo();
        drop(stuck);

        assert_eq!(runtime.history_len(), 0);
        block_on(runtime.dispatch(Action::set_text("a", "after"))).unwrap();
        assert_eq!(runtime.get_state().find("a").unwrap().text, "after");
    }

    #[test]
    fn unsubscribe_removes_one_registration() {
        let runtime = runtime_with(10);
        let hits = Arc::new(AtomicUsize::new(0));
        let first = {
            let hits = Arc::clone(&hits);
            runtime.subscribe(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        {
            let hits = Arc::clone(&hits);
            runtime.subscribe(move |_| {
                hits.fetch_add(10, Ordering::SeqCst);
            });
        }
        assert!(runtime.unsubscribe(first));
        assert!(!runtime.unsubscribe(first));
        runtime.set_state(doc());
        assert_eq!(hits.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn subscribers_can_read_the_runtime() {
        let runtime = Arc::new(runtime_with(10));
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let weak = Arc::downgrade(&runtime);
            let seen = Arc::clone(&seen);
            runtime.subscribe(move |state| {
                if let Some(runtime) = weak.upgrade() {
                    assert_eq!(&runtime.get_state(), state);
                    seen.lock().unwrap().push(runtime.can_undo());
                }
            });
        }
        block_on(runtime.dispatch(Action::set_text("a", "x"))).unwrap();
        runtime.undo();
        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    }
}
