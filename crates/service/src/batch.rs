//! Parent/children writes committed in one batch.

use crate::error::Result;
use crate::model::Identified;
use crate::store::{WriteBatch, WriteTarget};
use crate::writer::Writer;
use docstream_core::{CollectionPath, DocumentPath};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

type SplitFn<I, P, C> = Arc<dyn Fn(&I) -> (P, Vec<C>) + Send + Sync>;

/// Where the child documents of a batched write live.
#[derive(Clone, Debug, PartialEq)]
pub enum ChildLocation {
    /// One shared collection.
    Collection(CollectionPath),
    /// A subcollection with this name under each parent document.
    Subcollection(String),
}

/// Writes an item as a parent document plus child documents, atomically.
///
/// Saving sets the parent and every child; deleting removes them. Either
/// every operation of the item is applied or none is.
pub struct BatchedWriter<I, P, C> {
    target: Arc<dyn WriteTarget>,
    parents: CollectionPath,
    children: ChildLocation,
    split: SplitFn<I, P, C>,
}

impl<I, P, C> BatchedWriter<I, P, C>
where
    P: Identified + Serialize,
    C: Identified + Serialize,
{
    /// Creates a writer that stores children in a shared collection.
    pub fn new<F>(
        target: Arc<dyn WriteTarget>,
        parents: CollectionPath,
        children: CollectionPath,
        split: F,
    ) -> Self
    where
        F: Fn(&I) -> (P, Vec<C>) + Send + Sync + 'static,
    {
        Self::with_location(target, parents, ChildLocation::Collection(children), split)
    }

    /// Creates a writer that stores children under `parent/{id}/{name}`.
    pub fn nested<F>(
        target: Arc<dyn WriteTarget>,
        parents: CollectionPath,
        name: impl Into<String>,
        split: F,
    ) -> Self
    where
        F: Fn(&I) -> (P, Vec<C>) + Send + Sync + 'static,
    {
        Self::with_location(target, parents, ChildLocation::Subcollection(name.into()), split)
    }

    fn with_location<F>(
        target: Arc<dyn WriteTarget>,
        parents: CollectionPath,
        children: ChildLocation,
        split: F,
    ) -> Self
    where
        F: Fn(&I) -> (P, Vec<C>) + Send + Sync + 'static,
    {
        Self {
            target,
            parents,
            children,
            split: Arc::new(split),
        }
    }

    /// Returns where child documents are written.
    pub fn children(&self) -> &ChildLocation {
        &self.children
    }

    fn paths(&self, parent: &P, children: &[C]) -> Result<(DocumentPath, Vec<DocumentPath>)> {
        let parent_path = self.parents.doc(parent.id())?;
        let collection = match &self.children {
            ChildLocation::Collection(collection) => collection.clone(),
            ChildLocation::Subcollection(name) => parent_path.subcollection(name)?,
        };
        let child_paths = children
            .iter()
            .map(|child| collection.doc(child.id()))
            .collect::<core::result::Result<Vec<_>, _>>()?;
        Ok((parent_path, child_paths))
    }

    /// Builds the batch that saves `item`.
    pub fn save_batch(&self, item: &I) -> Result<WriteBatch> {
        let (parent, children) = (self.split)(item);
        let (parent_path, child_paths) = self.paths(&parent, &children)?;

        let mut batch = WriteBatch::new();
        batch.set_model(parent_path, &parent)?;
        for (path, child) in child_paths.into_iter().zip(&children) {
            batch.set_model(path, child)?;
        }
        Ok(batch)
    }

    /// Builds the batch that deletes `item`.
    pub fn delete_batch(&self, item: &I) -> Result<WriteBatch> {
        let (parent, children) = (self.split)(item);
        let (parent_path, child_paths) = self.paths(&parent, &children)?;

        let mut batch = WriteBatch::new();
        batch.delete(parent_path);
        for path in child_paths {
            batch.delete(path);
        }
        Ok(batch)
    }
}

impl<I, P, C> Writer<I> for BatchedWriter<I, P, C>
where
    P: Identified + Serialize,
    C: Identified + Serialize,
{
    fn save(&self, item: &I) -> Result<()> {
        let batch = self.save_batch(item)?;
        debug!(collection = %self.parents, ops = batch.len(), "committing batched save");
        self.target.commit(batch)
    }

    fn delete(&self, item: &I) -> Result<()> {
        let batch = self.delete_batch(item)?;
        debug!(collection = %self.parents, ops = batch.len(), "committing batched delete");
        self.target.commit(batch)
    }
}
