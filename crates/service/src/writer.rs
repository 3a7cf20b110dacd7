//! Typed writers.
//!
//! A writer maps a domain value to its persisted model and writes it to a
//! document path derived from the model's id (or a fixed path).

use crate::error::Result;
use crate::model::{identity, Identified, Mapper};
use crate::store::{WriteBatch, WriteTarget};
use docstream_core::{CollectionPath, DocumentPath};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Saves and deletes values of type `T`.
pub trait Writer<T>: Send + Sync {
    /// Creates or replaces the document for `item`.
    fn save(&self, item: &T) -> Result<()>;

    /// Deletes the document for `item`.
    fn delete(&self, item: &T) -> Result<()>;
}

/// Writes each value to `collection/{id}`.
pub struct CollectionWriter<T, M> {
    target: Arc<dyn WriteTarget>,
    collection: CollectionPath,
    mapper: Mapper<T, M>,
}

impl<T, M> CollectionWriter<T, M>
where
    M: Identified + Serialize,
{
    /// Creates a writer that persists `mapper(item)`.
    pub fn new(target: Arc<dyn WriteTarget>, collection: CollectionPath, mapper: Mapper<T, M>) -> Self {
        Self {
            target,
            collection,
            mapper,
        }
    }

    /// Returns the collection written to.
    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    fn path_of(&self, model: &M) -> Result<DocumentPath> {
        Ok(self.collection.doc(model.id())?)
    }
}

impl<T> CollectionWriter<T, T>
where
    T: Clone + Identified + Serialize + 'static,
{
    /// Creates a writer that persists values as they are.
    pub fn identity(target: Arc<dyn WriteTarget>, collection: CollectionPath) -> Self {
        Self::new(target, collection, identity())
    }
}

impl<T, M> Writer<T> for CollectionWriter<T, M>
where
    M: Identified + Serialize,
{
    fn save(&self, item: &T) -> Result<()> {
        let model = (self.mapper)(item);
        let path = self.path_of(&model)?;
        let mut batch = WriteBatch::new();
        batch.set_model(path.clone(), &model)?;
        debug!(path = %path, "saving document");
        self.target.commit(batch)
    }

    fn delete(&self, item: &T) -> Result<()> {
        let model = (self.mapper)(item);
        let path = self.path_of(&model)?;
        debug!(path = %path, "deleting document");
        self.target.delete(&path)
    }
}

/// Writes values to one fixed document.
pub struct DocumentWriter<T, M> {
    target: Arc<dyn WriteTarget>,
    path: DocumentPath,
    mapper: Mapper<T, M>,
}

impl<T, M: Serialize> DocumentWriter<T, M> {
    /// Creates a writer that persists `mapper(item)` at `path`.
    pub fn new(target: Arc<dyn WriteTarget>, path: DocumentPath, mapper: Mapper<T, M>) -> Self {
        Self {
            target,
            path,
            mapper,
        }
    }

    /// Returns the document written to.
    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    /// Returns the store written to.
    pub fn target(&self) -> &Arc<dyn WriteTarget> {
        &self.target
    }

    /// Creates or replaces the document.
    pub fn save(&self, item: &T) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.set_model(self.path.clone(), &(self.mapper)(item))?;
        debug!(path = %self.path, "saving document");
        self.target.commit(batch)
    }

    /// Deletes the document.
    pub fn delete(&self) -> Result<()> {
        debug!(path = %self.path, "deleting document");
        self.target.delete(&self.path)
    }
}

impl<T: Clone + Serialize + 'static> DocumentWriter<T, T> {
    /// Creates a writer that persists values as they are.
    pub fn identity(target: Arc<dyn WriteTarget>, path: DocumentPath) -> Self {
        Self::new(target, path, identity())
    }
}

impl<T, M: Serialize> Writer<T> for DocumentWriter<T, M> {
    fn save(&self, item: &T) -> Result<()> {
        DocumentWriter::save(self, item)
    }

    fn delete(&self, _item: &T) -> Result<()> {
        DocumentWriter::delete(self)
    }
}
