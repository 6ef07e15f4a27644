//! Action Event Bus
//!
//! In-process, synchronous publish/subscribe for typed [`Action`]s.
//!
//! - `publish` invokes every current subscriber on the caller's thread, in
//!   registration order, before returning. A slow subscriber therefore blocks
//!   the publisher; there is no batching or async dispatch.
//! - Publishing with no subscribers is a silent no-op. UI bridges are expected
//!   to be mounted before the first command runs.
//! - Subscribers must not feed results back into the agent loop synchronously.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use crate::actions::Action;

/// Callback invoked for every published action.
pub type ActionHandler = Arc<dyn Fn(&Action) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Handle returned by [`ActionBus::subscribe`]. Call [`Subscription::unsubscribe`]
/// to detach the handler; dropping the handle leaves it attached.
pub struct Subscription {
    id: SubscriptionId,
    cancel: Option<Box<dyn FnOnce() -> bool + Send + Sync>>,
}

impl Subscription {
    pub fn new(id: SubscriptionId, cancel: impl FnOnce() -> bool + Send + Sync + 'static) -> Self {
        Self {
            id,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Detach the handler. Returns false if the bus is gone or the handler was
    /// already removed.
    pub fn unsubscribe(mut self) -> bool {
        match self.cancel.take() {
            Some(cancel) => cancel(),
            None => false,
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Typed publish/subscribe abstraction between tool execution and visible effects.
pub trait ActionBus: Send + Sync {
    /// Notify all current subscribers synchronously, in registration order.
    fn publish(&self, action: Action);

    /// Register a handler; it sees every action published after this call.
    fn subscribe(&self, handler: ActionHandler) -> Subscription;

    /// Remove a handler by id. Returns whether a handler was removed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    fn subscriber_count(&self) -> usize;
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    handlers: RwLock<Vec<(SubscriptionId, ActionHandler)>>,
}

impl BusInner {
    fn remove(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        let before = handlers.len();
        handlers.retain(|(hid, _)| *hid != id);
        handlers.len() != before
    }
}

/// Default [`ActionBus`] living entirely inside the process.
#[derive(Clone, Default)]
pub struct InProcessActionBus {
    inner: Arc<BusInner>,
}

impl InProcessActionBus {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ActionBus for InProcessActionBus {
    fn publish(&self, action: Action) {
        // Snapshot so handlers may subscribe/unsubscribe without deadlocking.
        let handlers: Vec<ActionHandler> = {
            let guard = self.inner.handlers.read().unwrap_or_else(|e| e.into_inner());
            guard.iter().map(|(_, h)| Arc::clone(h)).collect()
        };

        if handlers.is_empty() {
            tracing::debug!(action = action.action_type(), "action published with no subscribers");
            return;
        }

        tracing::debug!(
            action = action.action_type(),
            subscribers = handlers.len(),
            "publishing action"
        );
        for handler in handlers {
            handler(&action);
        }
    }

    fn subscribe(&self, handler: ActionHandler) -> Subscription {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, handler));

        let weak: Weak<BusInner> = Arc::downgrade(&self.inner);
        Subscription::new(id, move || match weak.upgrade() {
            Some(inner) => inner.remove(id),
            None => false,
        })
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.remove(id)
    }

    fn subscriber_count(&self) -> usize {
        self.inner
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl fmt::Debug for InProcessActionBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InProcessActionBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
