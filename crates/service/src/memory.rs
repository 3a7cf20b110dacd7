//! In-memory document store.
//!
//! `MemoryStore` implements `WriteTarget` and hands out live collection and
//! document sources over its contents. Every listener receives the current
//! state when it starts listening and a new snapshot after each committed
//! batch that changes what it sees. Documents of a collection are ordered by
//! id. Nothing is persisted.

use crate::error::{Result, WriteError};
use crate::store::{WriteBatch, WriteOp, WriteTarget};
use docstream_core::{
    cancel_fn, CancelHandle, CollectionPath, Document, DocumentPath, DocumentSnapshot, Emission,
    LiveSource, QuerySnapshot, SnapshotSink, TransportError,
};
use hashbrown::HashMap;
use parking_lot::{Mutex, ReentrantMutex};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Narrows a live collection to the documents it accepts.
pub type Filter = Arc<dyn Fn(&Document) -> bool + Send + Sync>;

type Sink<S> = Arc<dyn Fn(Emission<S>) + Send + Sync>;

struct CollectionWatcher {
    filter: Option<Filter>,
    last: Vec<Document>,
    sink: Sink<QuerySnapshot>,
}

struct DocumentWatcher {
    last: Option<Document>,
    sink: Sink<DocumentSnapshot>,
}

#[derive(Default)]
struct State {
    collections: HashMap<CollectionPath, BTreeMap<String, Value>>,
    collection_watchers: HashMap<CollectionPath, HashMap<u64, CollectionWatcher>>,
    document_watchers: HashMap<DocumentPath, HashMap<u64, DocumentWatcher>>,
    denied: HashMap<CollectionPath, String>,
    offline: bool,
    next_watcher: u64,
}

impl State {
    fn documents(&self, path: &CollectionPath, filter: Option<&Filter>) -> Vec<Document> {
        self.collections
            .get(path)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| Document::new(id.clone(), data.clone()))
                    .filter(|doc| filter.map_or(true, |f| f(doc)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn document(&self, path: &DocumentPath) -> Option<Document> {
        self.collections
            .get(path.collection())
            .and_then(|docs| docs.get(path.id()))
            .map(|data| Document::new(path.id(), data.clone()))
    }

    fn next_watcher(&mut self) -> u64 {
        self.next_watcher += 1;
        self.next_watcher
    }
}

struct StoreInner {
    state: Mutex<State>,
    // Held while a change is applied and its snapshots emitted, so listeners
    // see commits in order. Re-entrant for callbacks that write back.
    publish: ReentrantMutex<()>,
}

type Pending = Vec<Box<dyn FnOnce() + Send>>;

/// An in-memory document store.
///
/// Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(State::default()),
                publish: ReentrantMutex::new(()),
            }),
        }
    }

    /// Returns this store as a shared write target.
    pub fn target(&self) -> Arc<dyn WriteTarget> {
        Arc::new(self.clone())
    }

    /// Returns a live source over a collection.
    pub fn collection(&self, path: CollectionPath) -> MemoryCollection {
        MemoryCollection {
            store: self.clone(),
            path,
            filter: None,
        }
    }

    /// Returns a live source over one document.
    pub fn document(&self, path: DocumentPath) -> MemoryDocument {
        MemoryDocument {
            store: self.clone(),
            path,
        }
    }

    /// Returns the current documents of a collection, ordered by id.
    pub fn documents(&self, path: &CollectionPath) -> Vec<Document> {
        self.inner.state.lock().documents(path, None)
    }

    /// Pushes a transport failure to every listener of a collection.
    pub fn fail(&self, path: &CollectionPath, error: TransportError) {
        let _publish = self.inner.publish.lock();
        let sinks: Vec<_> = self
            .inner
            .state
            .lock()
            .collection_watchers
            .get(path)
            .map(|watchers| watchers.values().map(|w| Arc::clone(&w.sink)).collect())
            .unwrap_or_default();
        for sink in sinks {
            sink(Err(error.clone()));
        }
    }

    /// Rejects every later write to a collection.
    pub fn deny(&self, path: &CollectionPath, reason: impl Into<String>) {
        self.inner.state.lock().denied.insert(path.clone(), reason.into());
    }

    /// Simulates losing the connection. Offline stores refuse every read
    /// and write.
    pub fn set_offline(&self, offline: bool) {
        self.inner.state.lock().offline = offline;
    }

    /// Returns the number of active listeners.
    pub fn listener_count(&self) -> usize {
        let state = self.inner.state.lock();
        let collections: usize = state.collection_watchers.values().map(HashMap::len).sum();
        let documents: usize = state.document_watchers.values().map(HashMap::len).sum();
        collections + documents
    }

    fn apply(state: &mut State, batch: WriteBatch) -> Result<Pending> {
        if state.offline {
            return Err(TransportError::new("store offline").into());
        }
        for op in batch.ops() {
            let path = op.path();
            if let Some(reason) = state.denied.get(path.collection()) {
                return Err(WriteError::rejected(path.to_string(), reason.clone()));
            }
        }

        let mut touched_collections = Vec::new();
        let mut touched_documents = Vec::new();
        for op in batch.into_ops() {
            let path = op.path().clone();
            match op {
                WriteOp::Set { data, .. } => {
                    state
                        .collections
                        .entry(path.collection().clone())
                        .or_default()
                        .insert(path.id().to_string(), data);
                }
                WriteOp::Delete { .. } => {
                    if let Some(docs) = state.collections.get_mut(path.collection()) {
                        docs.remove(path.id());
                    }
                }
            }
            if !touched_collections.contains(path.collection()) {
                touched_collections.push(path.collection().clone());
            }
            if !touched_documents.contains(&path) {
                touched_documents.push(path);
            }
        }

        let mut pending: Pending = Vec::new();
        for collection in &touched_collections {
            let current_all = state.documents(collection, None);
            let watchers = match state.collection_watchers.get_mut(collection) {
                Some(watchers) => watchers,
                None => continue,
            };
            for watcher in watchers.values_mut() {
                let current: Vec<Document> = match &watcher.filter {
                    Some(filter) => current_all.iter().filter(|d| filter(*d)).cloned().collect(),
                    None => current_all.clone(),
                };
                let snapshot = QuerySnapshot::transition(&watcher.last, current.clone());
                if snapshot.changes().is_empty() {
                    continue;
                }
                watcher.last = current;
                let sink = Arc::clone(&watcher.sink);
                let snapshot = Arc::new(snapshot);
                pending.push(Box::new(move || sink(Ok(Some(snapshot)))));
            }
        }

        for path in &touched_documents {
            let current = state.document(path);
            let watchers = match state.document_watchers.get_mut(path) {
                Some(watchers) => watchers,
                None => continue,
            };
            for watcher in watchers.values_mut() {
                if watcher.last == current {
                    continue;
                }
                watcher.last = current.clone();
                let snapshot = Arc::new(match &current {
                    Some(doc) => DocumentSnapshot::existing(doc.clone()),
                    None => DocumentSnapshot::missing(path.id()),
                });
                let sink = Arc::clone(&watcher.sink);
                pending.push(Box::new(move || sink(Ok(Some(snapshot)))));
            }
        }

        Ok(pending)
    }
}

impl WriteTarget for MemoryStore {
    fn commit(&self, batch: WriteBatch) -> Result<()> {
        let _publish = self.inner.publish.lock();
        let ops = batch.len();
        let pending = Self::apply(&mut self.inner.state.lock(), batch)?;
        debug!(ops, notifications = pending.len(), "batch committed");
        for emit in pending {
            emit();
        }
        Ok(())
    }

    fn get(&self, path: &DocumentPath) -> core::result::Result<Option<Document>, TransportError> {
        let state = self.inner.state.lock();
        if state.offline {
            return Err(TransportError::new("store offline"));
        }
        Ok(state.document(path))
    }

    fn query(&self, path: &CollectionPath) -> core::result::Result<QuerySnapshot, TransportError> {
        let state = self.inner.state.lock();
        if state.offline {
            return Err(TransportError::new("store offline"));
        }
        Ok(QuerySnapshot::new(state.documents(path, None)))
    }
}

/// Live source over a collection of a `MemoryStore`.
#[derive(Clone)]
pub struct MemoryCollection {
    store: MemoryStore,
    path: CollectionPath,
    filter: Option<Filter>,
}

impl MemoryCollection {
    /// Narrows the source to documents accepted by `predicate`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Document) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(predicate));
        self
    }

    /// Returns the collection path.
    pub fn path(&self) -> &CollectionPath {
        &self.path
    }
}

fn watcher_handle<F>(store: &MemoryStore, remove: F) -> Box<dyn CancelHandle>
where
    F: FnOnce(&mut State) + Send + 'static,
{
    let store: Weak<StoreInner> = Arc::downgrade(&store.inner);
    cancel_fn(move || {
        if let Some(inner) = store.upgrade() {
            remove(&mut inner.state.lock());
        }
    })
}

impl LiveSource for MemoryCollection {
    type Snapshot = QuerySnapshot;

    fn listen(&self, sink: SnapshotSink<QuerySnapshot>) -> Box<dyn CancelHandle> {
        let _publish = self.store.inner.publish.lock();
        let sink: Sink<QuerySnapshot> = Arc::from(sink);
        let (id, documents) = {
            let mut state = self.store.inner.state.lock();
            let documents = state.documents(&self.path, self.filter.as_ref());
            let id = state.next_watcher();
            state
                .collection_watchers
                .entry(self.path.clone())
                .or_default()
                .insert(
                    id,
                    CollectionWatcher {
                        filter: self.filter.clone(),
                        last: documents.clone(),
                        sink: Arc::clone(&sink),
                    },
                );
            (id, documents)
        };
        sink(Ok(Some(Arc::new(QuerySnapshot::initial(documents)))));

        let path = self.path.clone();
        watcher_handle(&self.store, move |state| {
            if let Some(watchers) = state.collection_watchers.get_mut(&path) {
                watchers.remove(&id);
                if watchers.is_empty() {
                    state.collection_watchers.remove(&path);
                }
            }
        })
    }
}

/// Live source over one document of a `MemoryStore`.
#[derive(Clone)]
pub struct MemoryDocument {
    store: MemoryStore,
    path: DocumentPath,
}

impl MemoryDocument {
    /// Returns the document path.
    pub fn path(&self) -> &DocumentPath {
        &self.path
    }
}

impl LiveSource for MemoryDocument {
    type Snapshot = DocumentSnapshot;

    fn listen(&self, sink: SnapshotSink<DocumentSnapshot>) -> Box<dyn CancelHandle> {
        let _publish = self.store.inner.publish.lock();
        let sink: Sink<DocumentSnapshot> = Arc::from(sink);
        let (id, current) = {
            let mut state = self.store.inner.state.lock();
            let current = state.document(&self.path);
            let id = state.next_watcher();
            state
                .document_watchers
                .entry(self.path.clone())
                .or_default()
                .insert(
                    id,
                    DocumentWatcher {
                        last: current.clone(),
                        sink: Arc::clone(&sink),
                    },
                );
            (id, current)
        };
        let snapshot = match current {
            Some(doc) => DocumentSnapshot::existing(doc),
            None => DocumentSnapshot::missing(self.path.id()),
        };
        sink(Ok(Some(Arc::new(snapshot))));

        let path = self.path.clone();
        watcher_handle(&self.store, move |state| {
            if let Some(watchers) = state.document_watchers.get_mut(&path) {
                watchers.remove(&id);
                if watchers.is_empty() {
                    state.document_watchers.remove(&path);
                }
            }
        })
    }
}
