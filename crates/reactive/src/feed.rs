//! Typed feeds over live sources.
//!
//! A feed pairs a live source with a decoder. The engine stores the raw
//! emissions of each feed and asks the feed to decode the latest one.

use crate::decoder::{decode_changes, decode_documents, decode_snapshot};
use crate::guard::ThresholdGuard;
use docstream_core::{
    CancelHandle, ChangeKind, Decoder, DocumentSnapshot, ListenError, ListenResult, LiveSource,
    QuerySnapshot, TransportError,
};
use std::sync::Arc;

/// Callback receiving the raw emissions of one feed.
pub type RawSink<R> = Box<dyn Fn(Result<R, TransportError>) + Send + Sync>;

/// Live collection source.
pub type CollectionSource = Arc<dyn LiveSource<Snapshot = QuerySnapshot>>;

/// Live single-document source.
pub type DocumentSource = Arc<dyn LiveSource<Snapshot = DocumentSnapshot>>;

/// One input of a subscription.
pub trait Feed: Send + Sync + 'static {
    /// What the source emits.
    type Raw: Clone + Send + Sync + 'static;
    /// What a successful decode yields.
    type Output: Send + 'static;

    /// Starts the underlying source.
    fn open(&self, sink: RawSink<Self::Raw>) -> Box<dyn CancelHandle>;

    /// Decodes and guards one raw emission.
    fn decode(&self, raw: &Self::Raw, guard: &ThresholdGuard) -> ListenResult<Self::Output>;
}

/// Feed over a live collection, yielding every decodable document.
pub struct CollectionFeed<T> {
    source: CollectionSource,
    decoder: Decoder<T>,
}

impl<T: Send + 'static> Feed for CollectionFeed<T> {
    type Raw = Option<Arc<QuerySnapshot>>;
    type Output = Vec<T>;

    fn open(&self, sink: RawSink<Self::Raw>) -> Box<dyn CancelHandle> {
        self.source.listen(sink)
    }

    fn decode(&self, raw: &Self::Raw, guard: &ThresholdGuard) -> ListenResult<Vec<T>> {
        let snapshot = raw.as_deref().ok_or(ListenError::MissingSnapshot)?;
        Ok(guard.check(decode_snapshot(snapshot, &self.decoder))?)
    }
}

/// Feed over a single document, yielding `None` when it does not exist.
pub struct DocumentFeed<T> {
    source: DocumentSource,
    decoder: Decoder<T>,
}

impl<T: Send + 'static> Feed for DocumentFeed<T> {
    type Raw = Option<Arc<DocumentSnapshot>>;
    type Output = Option<T>;

    fn open(&self, sink: RawSink<Self::Raw>) -> Box<dyn CancelHandle> {
        self.source.listen(sink)
    }

    fn decode(&self, raw: &Self::Raw, guard: &ThresholdGuard) -> ListenResult<Option<T>> {
        let document = match raw.as_deref().and_then(DocumentSnapshot::document) {
            Some(document) => document,
            None => return Ok(None),
        };
        let items = guard.check(decode_documents(std::iter::once(document), &self.decoder))?;
        Ok(items.into_iter().next())
    }
}

/// Feed over the per-document changes of a live collection.
pub struct ChangeFeed<T> {
    source: CollectionSource,
    decoder: Decoder<T>,
}

impl<T: Send + 'static> Feed for ChangeFeed<T> {
    type Raw = Option<Arc<QuerySnapshot>>;
    type Output = Vec<(ChangeKind, T)>;

    fn open(&self, sink: RawSink<Self::Raw>) -> Box<dyn CancelHandle> {
        self.source.listen(sink)
    }

    fn decode(&self, raw: &Self::Raw, guard: &ThresholdGuard) -> ListenResult<Self::Output> {
        let snapshot = raw.as_deref().ok_or(ListenError::MissingSnapshot)?;
        Ok(guard.check(decode_changes(snapshot.changes(), &self.decoder))?)
    }
}

/// Creates a collection feed.
pub fn collection<T, S>(source: S, decoder: Decoder<T>) -> CollectionFeed<T>
where
    S: LiveSource<Snapshot = QuerySnapshot> + 'static,
{
    CollectionFeed {
        source: Arc::new(source),
        decoder,
    }
}

/// Creates a single-document feed.
pub fn document<T, S>(source: S, decoder: Decoder<T>) -> DocumentFeed<T>
where
    S: LiveSource<Snapshot = DocumentSnapshot> + 'static,
{
    DocumentFeed {
        source: Arc::new(source),
        decoder,
    }
}

/// Creates a change feed.
pub fn changes<T, S>(source: S, decoder: Decoder<T>) -> ChangeFeed<T>
where
    S: LiveSource<Snapshot = QuerySnapshot> + 'static,
{
    ChangeFeed {
        source: Arc::new(source),
        decoder,
    }
}
