//! Typed services over one collection or one document.
//!
//! A service bundles a listener, a live source, a decoder and a writer, and
//! maps every subscription failure through the caller's error handler.
//! Callbacks hold the service weakly: once it is dropped they do nothing, and
//! dropping it cancels every subscription it made.

use crate::error::Result;
use crate::store::WriteTarget;
use crate::writer::{DocumentWriter, Writer};
use docstream_core::{
    ChangeKind, CollectionPath, DecodeFailure, DecodeFailureReport, Decoder, DocumentPath,
    DocumentSnapshot, ListenError, LiveSource, QuerySnapshot,
};
use docstream_reactive::{
    decode_snapshot, feed, CollectionSource, DocumentSource, Listener, SubscriptionId,
};
use serde::Serialize;
use std::sync::{Arc, Weak};
use tracing::debug;

type ErrorHandler<E> = Box<dyn Fn(ListenError) -> E + Send + Sync>;

struct Shared<E> {
    error_handler: ErrorHandler<E>,
}

impl<E> Shared<E> {
    fn map<T>(&self, result: core::result::Result<T, ListenError>) -> core::result::Result<T, E> {
        result.map_err(|err| (self.error_handler)(err))
    }
}

/// Live reads and writes of one collection of `T`.
pub struct CollectionService<T, E> {
    shared: Arc<Shared<E>>,
    listener: Listener,
    source: CollectionSource,
    decoder: Decoder<T>,
    writer: Arc<dyn Writer<T>>,
}

impl<T, E> CollectionService<T, E>
where
    T: Send + 'static,
    E: 'static,
{
    /// Creates a service.
    pub fn new<S, W, H>(
        listener: Listener,
        source: S,
        decoder: Decoder<T>,
        writer: W,
        error_handler: H,
    ) -> Self
    where
        S: LiveSource<Snapshot = QuerySnapshot> + 'static,
        W: Writer<T> + 'static,
        H: Fn(ListenError) -> E + Send + Sync + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                error_handler: Box::new(error_handler),
            }),
            listener,
            source: Arc::new(source),
            decoder,
            writer: Arc::new(writer),
        }
    }

    /// Subscribes to every decodable item of the collection.
    pub fn subscribe<C>(&self, on_update: C) -> SubscriptionId
    where
        C: Fn(core::result::Result<Vec<T>, E>) + Send + Sync + 'static,
    {
        self.subscribe_query(Arc::clone(&self.source), on_update)
    }

    /// Subscribes to a narrower query over the same kind of items.
    pub fn subscribe_query<S, C>(&self, query: S, on_update: C) -> SubscriptionId
    where
        S: LiveSource<Snapshot = QuerySnapshot> + 'static,
        C: Fn(core::result::Result<Vec<T>, E>) + Send + Sync + 'static,
    {
        let shared = Arc::downgrade(&self.shared);
        self.listener.subscribe(
            (feed::collection(query, self.decoder.clone()),),
            move |result| {
                if let Some(shared) = Weak::upgrade(&shared) {
                    on_update(shared.map(result.map(|(items,)| items)));
                }
            },
        )
    }

    /// Subscribes to the per-document changes of the collection.
    pub fn subscribe_to_changes<C>(&self, on_update: C) -> SubscriptionId
    where
        C: Fn(core::result::Result<Vec<(ChangeKind, T)>, E>) + Send + Sync + 'static,
    {
        let shared = Arc::downgrade(&self.shared);
        self.listener.subscribe(
            (feed::changes(Arc::clone(&self.source), self.decoder.clone()),),
            move |result| {
                if let Some(shared) = Weak::upgrade(&shared) {
                    on_update(shared.map(result.map(|(changes,)| changes)));
                }
            },
        )
    }

    /// Reads a collection of `T` once, under the listener's decode failure
    /// threshold.
    pub fn load(
        &self,
        target: &dyn WriteTarget,
        path: &CollectionPath,
    ) -> core::result::Result<Vec<T>, E> {
        let result = target
            .query(path)
            .map_err(ListenError::from)
            .and_then(|snapshot| {
                let decoded = decode_snapshot(&snapshot, &self.decoder);
                Ok(self.listener.guard().check(decoded)?)
            });
        debug!(path = %path, ok = result.is_ok(), "collection loaded");
        self.shared.map(result)
    }

    /// Cancels a subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listener.unsubscribe(id)
    }

    /// Returns the number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.listener.subscription_count()
    }

    /// Saves one item.
    pub fn save(&self, item: &T) -> Result<()> {
        self.writer.save(item)
    }

    /// Saves items in order, stopping at the first failure.
    pub fn save_all(&self, items: &[T]) -> Result<()> {
        debug!(count = items.len(), "saving items");
        items.iter().try_for_each(|item| self.writer.save(item))
    }

    /// Deletes one item.
    pub fn delete(&self, item: &T) -> Result<()> {
        self.writer.delete(item)
    }
}

/// Live reads and writes of one document of `T`.
pub struct DocumentService<T, E> {
    shared: Arc<Shared<E>>,
    listener: Listener,
    source: DocumentSource,
    decoder: Decoder<T>,
    target: Arc<dyn WriteTarget>,
    path: DocumentPath,
    writer: Arc<dyn Writer<T>>,
}

impl<T, E> DocumentService<T, E>
where
    T: Send + 'static,
    E: 'static,
{
    /// Creates a service. Reads and writes go to the writer's document.
    pub fn new<S, M, H>(
        listener: Listener,
        source: S,
        decoder: Decoder<T>,
        writer: DocumentWriter<T, M>,
        error_handler: H,
    ) -> Self
    where
        S: LiveSource<Snapshot = DocumentSnapshot> + 'static,
        M: Serialize + 'static,
        H: Fn(ListenError) -> E + Send + Sync + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                error_handler: Box::new(error_handler),
            }),
            listener,
            source: Arc::new(source),
            decoder,
            target: Arc::clone(writer.target()),
            path: writer.path().clone(),
            writer: Arc::new(writer),
        }
    }

    /// Returns the document path.
    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    /// Subscribes to the document. `None` means it does not exist.
    pub fn subscribe<C>(&self, on_update: C) -> SubscriptionId
    where
        C: Fn(core::result::Result<Option<T>, E>) + Send + Sync + 'static,
    {
        let shared = Arc::downgrade(&self.shared);
        self.listener.subscribe(
            (feed::document(Arc::clone(&self.source), self.decoder.clone()),),
            move |result| {
                if let Some(shared) = Weak::upgrade(&shared) {
                    on_update(shared.map(result.map(|(item,)| item)));
                }
            },
        )
    }

    /// Reads the document once.
    pub fn get(&self) -> core::result::Result<Option<T>, E> {
        let result = match self.target.get(&self.path) {
            Ok(Some(document)) => self.decoder.decode(&document).map(Some).map_err(|err| {
                let failure = DecodeFailure::new(document.id(), err);
                ListenError::Decode(DecodeFailureReport::new(1.0, 1, vec![failure]))
            }),
            Ok(None) => Ok(None),
            Err(err) => Err(ListenError::Transport(err)),
        };
        self.shared.map(result)
    }

    /// Cancels a subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listener.unsubscribe(id)
    }

    /// Creates or replaces the document.
    pub fn save(&self, item: &T) -> Result<()> {
        self.writer.save(item)
    }

    /// Deletes the document.
    pub fn delete(&self) -> Result<()> {
        debug!(path = %self.path, "deleting document");
        self.target.delete(&self.path)
    }
}
