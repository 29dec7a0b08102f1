//! Change notification.
//!
//! The facade emits one [`Change`] per mutating operation. Subscribers are
//! plain callbacks invoked synchronously, in subscription order, on the thread
//! that performed the mutation. Keep them short; hand real work to a channel.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    ArtifactsAttached,
    Outcome,
    Recycled,
    Restored,
    Archived,
    Unarchived,
    Purged,
    ActiveChanged,
    Swept,
}

/// What changed, and which records it touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub kind: ChangeKind,
    pub ids: Vec<String>,
}

impl Change {
    pub fn one(kind: ChangeKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            ids: vec![id.into()],
        }
    }
}

type Listener = Arc<dyn Fn(&Change) + Send + Sync>;
type Listeners = Arc<Mutex<BTreeMap<u64, Listener>>>;

#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Listeners,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Change) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(listener));
        Subscription {
            id,
            listeners: Arc::clone(&self.listeners),
        }
    }

    /// Call every subscriber with `change`.
    ///
    /// The listener list is copied first, so a callback may subscribe or
    /// unsubscribe without deadlocking.
    pub fn emit(&self, change: &Change) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for listener in listeners {
            listener(change);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Handle returned by [`EventBus::subscribe`].
///
/// Dropping it keeps the subscription alive; call [`Subscription::unsubscribe`]
/// to detach.
pub struct Subscription {
    id: u64,
    listeners: Listeners,
}

impl Subscription {
    pub fn unsubscribe(self) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}
