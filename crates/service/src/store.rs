//! The write capability of a document store.

use crate::error::{Result, WriteError};
use docstream_core::{CollectionPath, Document, DocumentPath, QuerySnapshot, TransportError};
use serde::Serialize;
use serde_json::Value;

/// One operation of a write batch.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteOp {
    /// Creates or replaces a document.
    Set { path: DocumentPath, data: Value },
    /// Deletes a document. Deleting a missing document is not an error.
    Delete { path: DocumentPath },
}

impl WriteOp {
    /// Returns the path the operation writes to.
    pub fn path(&self) -> &DocumentPath {
        match self {
            WriteOp::Set { path, .. } | WriteOp::Delete { path } => path,
        }
    }
}

/// An ordered list of writes committed all-or-nothing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a set of raw fields.
    pub fn set(&mut self, path: DocumentPath, data: Value) -> &mut Self {
        self.ops.push(WriteOp::Set { path, data });
        self
    }

    /// Queues a set of a serialized model.
    pub fn set_model<M: Serialize>(&mut self, path: DocumentPath, model: &M) -> Result<&mut Self> {
        let data =
            serde_json::to_value(model).map_err(|err| WriteError::serialize(path.to_string(), err))?;
        Ok(self.set(path, data))
    }

    /// Queues a delete.
    pub fn delete(&mut self, path: DocumentPath) -> &mut Self {
        self.ops.push(WriteOp::Delete { path });
        self
    }

    /// Returns the queued operations in order.
    #[inline]
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Consumes the batch and returns its operations.
    #[inline]
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    /// Returns the number of queued operations.
    #[inline]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if nothing is queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// A store that accepts writes and one-shot reads.
pub trait WriteTarget: Send + Sync {
    /// Applies every operation of the batch, or none of them.
    fn commit(&self, batch: WriteBatch) -> Result<()>;

    /// Reads one document.
    fn get(&self, path: &DocumentPath) -> core::result::Result<Option<Document>, TransportError>;

    /// Reads every document of a collection once.
    fn query(&self, path: &CollectionPath) -> core::result::Result<QuerySnapshot, TransportError>;

    /// Creates or replaces one document.
    fn set(&self, path: &DocumentPath, data: Value) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.set(path.clone(), data);
        self.commit(batch)
    }

    /// Deletes one document.
    fn delete(&self, path: &DocumentPath) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.delete(path.clone());
        self.commit(batch)
    }
}
