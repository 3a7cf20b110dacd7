//! Error types for writes.

use docstream_core::{PathError, TransportError};
use thiserror::Error;

/// Result type for write operations.
pub type Result<T> = core::result::Result<T, WriteError>;

/// Errors that can occur while writing documents.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The model could not be serialized into document fields.
    #[error("failed to serialize document {path}: {source}")]
    Serialize {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The model's id does not form a valid document path.
    #[error(transparent)]
    InvalidPath(#[from] PathError),

    /// The store refused the write.
    #[error("write to {path} rejected: {reason}")]
    Rejected { path: String, reason: String },

    /// The store could not be reached.
    #[error(transparent)]
    Unavailable(#[from] TransportError),
}

impl WriteError {
    /// Creates a serialization error for the given path.
    pub fn serialize(path: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialize {
            path: path.into(),
            source,
        }
    }

    /// Creates a rejection error.
    pub fn rejected(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WriteError::rejected("users/u1", "read only");
        assert_eq!(err.to_string(), "write to users/u1 rejected: read only");

        let err = WriteError::from(TransportError::new("offline"));
        assert_eq!(err.to_string(), "transport error: offline");

        let err = WriteError::from(PathError::InvalidDocumentId("a/b".into()));
        assert!(err.to_string().contains("a/b"));
    }

    #[test]
    fn test_serialize_keeps_source() {
        let json_err = serde_json::from_str::<u32>("x").unwrap_err();
        let err = WriteError::serialize("users/u1", json_err);
        assert!(err.to_string().starts_with("failed to serialize document users/u1"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
