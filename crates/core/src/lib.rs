//! Docstream Core - Documents, snapshots and error types for Docstream.
//!
//! This crate provides the foundational types shared by the Docstream crates:
//!
//! - `Document`: A persisted document (id + structured fields)
//! - `QuerySnapshot` / `DocumentSnapshot`: Full state of a live collection or document
//! - `Decoder<T>`: Explicit mapping from a document to a typed value
//! - `LiveSource`: The push-based capability a vendor SDK exposes for live reads
//! - `CollectionPath` / `DocumentPath`: Validated document locations
//! - `ListenError`: The failure taxonomy delivered to subscribers
//!
//! # Example
//!
//! ```rust
//! use docstream_core::{Decoder, Document};
//! use serde::Deserialize;
//! use serde_json::json;
//!
//! #[derive(Deserialize)]
//! struct Note {
//!     title: String,
//! }
//!
//! let doc = Document::new("n1", json!({ "title": "groceries" }));
//! let note = doc.decode(&Decoder::<Note>::json()).unwrap();
//!
//! assert_eq!(note.title, "groceries");
//! ```

mod decode;
mod document;
mod error;
mod path;
mod source;

pub use decode::Decoder;
pub use document::{ChangeKind, Document, DocumentChange, DocumentSnapshot, QuerySnapshot};
pub use error::{
    ordinal, BoxError, CombinedSourceFailure, ConfigError, DecodeError, DecodeFailure,
    DecodeFailureReport, ListenError, ListenResult, PathError, SlotFailure, TransportError,
};
pub use path::{CollectionPath, DocumentPath};
pub use source::{cancel_fn, CancelHandle, Emission, LiveSource, SnapshotSink};
