//! Collection and document paths.
//!
//! Paths alternate collection and document segments: `users`,
//! `users/u1/entries` are collections, `users/u1` is a document.

use crate::error::PathError;
use core::fmt;

/// Path of a collection.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// Parses and validates a collection path.
    pub fn new(path: impl Into<String>) -> Result<Self, PathError> {
        let path = path.into();
        let segments = validate_segments(&path)?;
        if segments % 2 == 0 {
            return Err(PathError::NotACollection(path));
        }
        Ok(Self(path))
    }

    /// Returns the path of a document in this collection.
    pub fn doc(&self, id: impl Into<String>) -> Result<DocumentPath, PathError> {
        let id = id.into();
        if id.is_empty() || id.contains('/') {
            return Err(PathError::InvalidDocumentId(id));
        }
        Ok(DocumentPath {
            collection: self.clone(),
            id,
        })
    }

    /// Returns the path as a string.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Path of a single document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath {
    collection: CollectionPath,
    id: String,
}

impl DocumentPath {
    /// Parses and validates a document path such as `users/u1`.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        validate_segments(path)?;
        match path.rsplit_once('/') {
            Some((collection, id)) => CollectionPath::new(collection)?.doc(id),
            None => Err(PathError::InvalidDocumentId(path.to_string())),
        }
    }

    /// Returns the parent collection.
    #[inline]
    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    /// Returns the document id.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the path of a subcollection under this document.
    pub fn subcollection(&self, name: &str) -> Result<CollectionPath, PathError> {
        CollectionPath::new(format!("{}/{}", self, name))
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

fn validate_segments(path: &str) -> Result<usize, PathError> {
    let mut count = 0;
    for segment in path.split('/') {
        if segment.is_empty() {
            return Err(PathError::EmptySegment(path.to_string()));
        }
        count += 1;
    }
    Ok(count)
}
