//! Fan-out point for callback-driven sources.
//!
//! `SourceHub` adapts a push API (a vendor SDK callback, a test harness) into
//! a `LiveSource` that any number of subscriptions can listen to. Emissions
//! are broadcast to the sinks registered at the time of the call; there is
//! no replay for late listeners.

use docstream_core::{cancel_fn, CancelHandle, Emission, LiveSource, SnapshotSink, TransportError};
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;

type ListenerId = u64;

struct HubInner<S> {
    listeners: Mutex<HashMap<ListenerId, Arc<dyn Fn(Emission<S>) + Send + Sync>>>,
    next_id: AtomicU64,
}

/// A broadcast `LiveSource`.
pub struct SourceHub<S> {
    inner: Arc<HubInner<S>>,
}

impl<S> Clone for SourceHub<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Send + Sync + 'static> Default for SourceHub<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Send + Sync + 'static> SourceHub<S> {
    /// Creates a hub with no listeners.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                listeners: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Broadcasts a snapshot.
    pub fn publish(&self, snapshot: S) {
        self.publish_shared(Arc::new(snapshot));
    }

    /// Broadcasts an already shared snapshot.
    pub fn publish_shared(&self, snapshot: Arc<S>) {
        self.emit(Ok(Some(snapshot)));
    }

    /// Broadcasts the null-snapshot signal.
    pub fn publish_missing(&self) {
        self.emit(Ok(None));
    }

    /// Broadcasts a transport failure.
    pub fn fail(&self, error: TransportError) {
        self.emit(Err(error));
    }

    /// Broadcasts an emission. Sinks run outside the hub lock.
    pub fn emit(&self, emission: Emission<S>) {
        let listeners: Vec<_> = self.inner.listeners.lock().values().cloned().collect();
        trace!(listeners = listeners.len(), ok = emission.is_ok(), "hub emission");
        for listener in listeners {
            listener(emission.clone());
        }
    }

    /// Returns the number of registered sinks.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }
}

impl<S: Send + Sync + 'static> LiveSource for SourceHub<S> {
    type Snapshot = S;

    fn listen(&self, sink: SnapshotSink<S>) -> Box<dyn CancelHandle> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().insert(id, Arc::from(sink));

        let hub: Weak<HubInner<S>> = Arc::downgrade(&self.inner);
        cancel_fn(move || {
            if let Some(hub) = hub.upgrade() {
                // Dropped outside the lock: the sink may own the last
                // reference to a subscription.
                let removed = hub.listeners.lock().remove(&id);
                drop(removed);
            }
        })
    }
}
