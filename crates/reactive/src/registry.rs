//! Subscription tokens and cancellation.
//!
//! The registry owns the cancel handles of every live subscription. Tokens
//! are never reused; cancelling is idempotent. Handles are always invoked
//! outside the registry lock, so a source may call back into the registry
//! while it tears down.

use docstream_core::CancelHandle;
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::{debug, trace};

/// Unique identifier for a subscription.
pub type SubscriptionId = u64;

/// A live subscription: the cancel handles of its sources.
pub struct Subscription {
    id: SubscriptionId,
    handles: Vec<Box<dyn CancelHandle>>,
    created_at: Instant,
}

impl Subscription {
    fn new(id: SubscriptionId) -> Self {
        Self {
            id,
            handles: Vec::new(),
            created_at: Instant::now(),
        }
    }

    /// Returns the subscription ID.
    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns the number of source registrations.
    #[inline]
    pub fn source_count(&self) -> usize {
        self.handles.len()
    }

    /// Returns when the subscription was created.
    #[inline]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    fn cancel(self) {
        for handle in self.handles {
            handle.cancel();
        }
    }
}

struct RegistryInner {
    subscriptions: Mutex<HashMap<SubscriptionId, Subscription>>,
    next_id: AtomicU64,
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        let remaining: Vec<_> = self.subscriptions.get_mut().drain().map(|(_, s)| s).collect();
        if !remaining.is_empty() {
            debug!(count = remaining.len(), "registry dropped, cancelling subscriptions");
        }
        for sub in remaining {
            sub.cancel();
        }
    }
}

/// Tracks active subscriptions and their cancel handles.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                subscriptions: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Registers a subscription holding `handles` and returns its token.
    pub fn register(&self, handles: Vec<Box<dyn CancelHandle>>) -> SubscriptionId {
        let id = self.reserve();
        self.attach(id, handles);
        id
    }

    /// Allocates a live token with no handles yet.
    ///
    /// Sources may emit synchronously while they are being opened; reserving
    /// first lets those emissions see a live token.
    pub fn reserve(&self) -> SubscriptionId {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscriptions.lock().insert(id, Subscription::new(id));
        trace!(id, "subscription reserved");
        id
    }

    /// Attaches cancel handles to a reserved token.
    ///
    /// If the token was cancelled in the meantime the handles are cancelled
    /// immediately. Returns whether the token was still live.
    pub fn attach(&self, id: SubscriptionId, handles: Vec<Box<dyn CancelHandle>>) -> bool {
        let orphaned = {
            let mut subscriptions = self.inner.subscriptions.lock();
            match subscriptions.get_mut(&id) {
                Some(sub) => {
                    sub.handles.extend(handles);
                    None
                }
                None => Some(handles),
            }
        };

        match orphaned {
            None => true,
            Some(handles) => {
                debug!(id, "subscription cancelled while opening, releasing sources");
                for handle in handles {
                    handle.cancel();
                }
                false
            }
        }
    }

    /// Cancels a subscription.
    ///
    /// Returns true if the token was live. Unknown or already cancelled
    /// tokens are a no-op.
    pub fn cancel(&self, id: SubscriptionId) -> bool {
        let removed = self.inner.subscriptions.lock().remove(&id);
        match removed {
            Some(sub) => {
                debug!(id, sources = sub.source_count(), "subscription cancelled");
                sub.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels every subscription. Returns how many were live.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<_> = self
            .inner
            .subscriptions
            .lock()
            .drain()
            .map(|(_, sub)| sub)
            .collect();
        let count = drained.len();
        for sub in drained {
            sub.cancel();
        }
        if count > 0 {
            debug!(count, "all subscriptions cancelled");
        }
        count
    }

    /// Returns true if the token is live.
    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.inner.subscriptions.lock().contains_key(&id)
    }

    /// Returns the number of live subscriptions.
    pub fn len(&self) -> usize {
        self.inner.subscriptions.lock().len()
    }

    /// Returns true if there are no live subscriptions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns all live tokens.
    pub fn tokens(&self) -> Vec<SubscriptionId> {
        self.inner.subscriptions.lock().keys().copied().collect()
    }

    /// Returns a handle that observes liveness without keeping the registry
    /// alive.
    pub fn downgrade(&self) -> WeakRegistry {
        WeakRegistry {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// Non-owning view of a registry.
#[derive(Clone)]
pub struct WeakRegistry {
    inner: Weak<RegistryInner>,
}

impl WeakRegistry {
    /// Returns true if the registry still exists and the token is live.
    pub fn is_live(&self, id: SubscriptionId) -> bool {
        self.inner
            .upgrade()
            .map_or(false, |inner| inner.subscriptions.lock().contains_key(&id))
    }
}
