//! Documents and snapshots.
//!
//! A `QuerySnapshot` is the complete current result set of a live collection
//! at one point in time, never a diff. The per-document `changes` relative to
//! the previous emission ride along for change subscriptions.

use crate::decode::Decoder;
use crate::error::DecodeError;
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A persisted document: its id within the collection and its fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    id: String,
    data: Value,
}

impl Document {
    /// Creates a new document.
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Returns the document id.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the document fields.
    #[inline]
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Consumes the document and returns its fields.
    #[inline]
    pub fn into_data(self) -> Value {
        self.data
    }

    /// Returns a top-level field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    /// Decodes this document with the given decoder.
    #[inline]
    pub fn decode<T>(&self, decoder: &Decoder<T>) -> Result<T, DecodeError> {
        decoder.decode(self)
    }
}

/// Kind of a per-document change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// The document entered the result set.
    Added,
    /// The document's fields changed.
    Modified,
    /// The document left the result set.
    Removed,
}

/// A document change between two emissions of the same source.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentChange {
    /// What happened to the document.
    pub kind: ChangeKind,
    /// The document after the change (before it, for removals).
    pub document: Document,
}

impl DocumentChange {
    /// Creates a change.
    pub fn new(kind: ChangeKind, document: Document) -> Self {
        Self { kind, document }
    }
}

/// The full result set of a live collection at one point in time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuerySnapshot {
    documents: Vec<Document>,
    changes: Vec<DocumentChange>,
}

impl QuerySnapshot {
    /// Creates a snapshot with no change information.
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            changes: Vec::new(),
        }
    }

    /// Creates a snapshot with explicit changes.
    pub fn with_changes(documents: Vec<Document>, changes: Vec<DocumentChange>) -> Self {
        Self { documents, changes }
    }

    /// Creates a first snapshot: every document is reported as added.
    pub fn initial(documents: Vec<Document>) -> Self {
        let changes = documents
            .iter()
            .cloned()
            .map(|doc| DocumentChange::new(ChangeKind::Added, doc))
            .collect();
        Self { documents, changes }
    }

    /// Creates the snapshot that follows `previous`, deriving the changes.
    ///
    /// Added and modified documents are reported in `current` order, removals
    /// after them in `previous` order.
    pub fn transition(previous: &[Document], current: Vec<Document>) -> Self {
        let before: HashMap<&str, &Document> =
            previous.iter().map(|doc| (doc.id(), doc)).collect();
        let mut changes = Vec::new();

        for doc in &current {
            match before.get(doc.id()) {
                None => changes.push(DocumentChange::new(ChangeKind::Added, doc.clone())),
                Some(old) if old.data() != doc.data() => {
                    changes.push(DocumentChange::new(ChangeKind::Modified, doc.clone()))
                }
                Some(_) => {}
            }
        }

        {
            let after: HashSet<&str> = current.iter().map(|doc| doc.id()).collect();
            for doc in previous {
                if !after.contains(doc.id()) {
                    changes.push(DocumentChange::new(ChangeKind::Removed, doc.clone()));
                }
            }
        }

        Self {
            documents: current,
            changes,
        }
    }

    /// Returns the documents in result order.
    #[inline]
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Returns the changes relative to the previous emission.
    #[inline]
    pub fn changes(&self) -> &[DocumentChange] {
        &self.changes
    }

    /// Returns the number of documents.
    #[inline]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns true if the result set is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// The state of one document at one point in time.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentSnapshot {
    id: String,
    document: Option<Document>,
}

impl DocumentSnapshot {
    /// Snapshot of an existing document.
    pub fn existing(document: Document) -> Self {
        Self {
            id: document.id().into(),
            document: Some(document),
        }
    }

    /// Snapshot of a document that does not exist.
    pub fn missing(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            document: None,
        }
    }

    /// Returns the document id.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns true if the document exists.
    #[inline]
    pub fn exists(&self) -> bool {
        self.document.is_some()
    }

    /// Returns the document, if it exists.
    #[inline]
    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }
}
