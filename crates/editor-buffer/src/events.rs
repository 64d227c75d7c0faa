//! Document change notifications.
//!
//! Subscribers register a callback and get a [`Subscription`] handle back. Dropping the handle
//! (or calling [`Subscription::detach`]) detaches the callback; detached entries are pruned the
//! next time an event fires. Events are delivered after the document lock is released, so
//! callbacks may read the document.

use crate::delta::TextDelta;
use crate::line_tree::LineChange;
use parking_lot::{Mutex, ReentrantMutex};
use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A committed edit group.
#[derive(Debug, Clone)]
pub struct EditEvent {
    /// Edit counter before the group.
    pub old_generation: u64,
    /// Edit counter after the group.
    pub new_generation: u64,
    /// The edits of the group, in order.
    pub delta: Arc<TextDelta>,
    /// Line partition changes, one per primitive edit.
    pub line_changes: Vec<LineChange>,
}

/// Events emitted by a [`Document`](crate::Document).
#[derive(Debug, Clone)]
pub enum DocumentEvent {
    /// An edit group was committed.
    Edited(EditEvent),
    /// An atomic group is about to start.
    AtomicLock,
    /// An atomic group finished (committed or rolled back).
    AtomicUnlock,
    /// Every cached scanner state was dropped.
    SyntaxInvalidated,
}

/// Event callback type.
pub type EventCallback = Box<dyn FnMut(&DocumentEvent) + Send>;

/// A callback that is running is not re-entered when it triggers another event on the same thread.
type SharedCallback = Arc<ReentrantMutex<RefCell<EventCallback>>>;

struct Entry {
    id: u64,
    attached: Arc<AtomicBool>,
    callback: SharedCallback,
}

/// Handle of a registered callback. Detaches the callback when dropped.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    attached: Arc<AtomicBool>,
}

impl Subscription {
    /// Registry-unique id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the callback still receives events.
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Stop delivering events to the callback.
    pub fn detach(&self) {
        self.attached.store(false, Ordering::Release);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Registry of event callbacks.
#[derive(Default)]
pub struct EventRegistry {
    entries: Mutex<Vec<Entry>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("entries", &self.entries.lock().len())
            .finish()
    }
}

impl EventRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback`.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&DocumentEvent) + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let attached = Arc::new(AtomicBool::new(true));
        let callback: EventCallback = Box::new(callback);
        self.entries.lock().push(Entry {
            id,
            attached: Arc::clone(&attached),
            callback: Arc::new(ReentrantMutex::new(RefCell::new(callback))),
        });
        Subscription { id, attached }
    }

    /// Detach and remove the callback of `subscription`.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        subscription.detach();
        self.entries.lock().retain(|e| e.id != subscription.id);
    }

    /// Number of registered entries, including detached ones not yet pruned.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `events` to every attached callback, pruning detached ones first.
    pub(crate) fn fire(&self, events: &[DocumentEvent]) {
        if events.is_empty() {
            return;
        }
        let targets: Vec<(Arc<AtomicBool>, SharedCallback)> = {
            let mut entries = self.entries.lock();
            let before = entries.len();
            entries.retain(|e| e.attached.load(Ordering::Acquire));
            if entries.len() != before {
                tracing::trace!(target: "editor_buffer::document", pruned = before - entries.len(), "events.prune");
            }
            entries
                .iter()
                .map(|e| (Arc::clone(&e.attached), Arc::clone(&e.callback)))
                .collect()
        };

        for event in events {
            for (attached, callback) in &targets {
                if !attached.load(Ordering::Acquire) {
                    continue;
                }
                let guard = callback.lock();
                if let Ok(mut callback) = guard.try_borrow_mut() {
                    let callback: &mut EventCallback = &mut callback;
                    callback(event);
                }
            }
        }
    }
}
