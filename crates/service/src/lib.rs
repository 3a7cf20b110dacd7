//! Docstream Service - Typed services over a document store.
//!
//! This crate builds on `docstream-reactive` with the write side and the
//! typed services applications use directly:
//!
//! - `WriteTarget` / `WriteBatch`: The store's write capability and atomic batches
//! - `CollectionWriter` / `DocumentWriter`: Map values to models and write them
//! - `BatchedWriter`: Parent plus children committed together
//! - `CollectionService` / `DocumentService`: Subscriptions and writes for one type
//! - `MemoryStore`: An in-memory store with live collection and document sources
//!
//! # Example
//!
//! ```rust
//! use docstream_core::{CollectionPath, Decoder};
//! use docstream_reactive::Listener;
//! use docstream_service::{CollectionService, CollectionWriter, Identified, MemoryStore};
//! use serde::{Deserialize, Serialize};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct Habit {
//!     id: String,
//!     streak: u32,
//! }
//!
//! impl Identified for Habit {
//!     fn id(&self) -> &str {
//!         &self.id
//!     }
//! }
//!
//! let store = MemoryStore::new();
//! let habits = CollectionPath::new("habits").unwrap();
//! let service = CollectionService::new(
//!     Listener::new(),
//!     store.collection(habits.clone()),
//!     Decoder::<Habit>::json(),
//!     CollectionWriter::identity(store.target(), habits),
//!     |err| err.to_string(),
//! );
//!
//! let streaks = Arc::new(Mutex::new(Vec::new()));
//! let seen = streaks.clone();
//! service.subscribe(move |result| {
//!     let habits = result.unwrap();
//!     seen.lock().unwrap().push(habits.iter().map(|h| h.streak).sum::<u32>());
//! });
//!
//! service.save(&Habit { id: "read".into(), streak: 3 }).unwrap();
//! assert_eq!(*streaks.lock().unwrap(), vec![0, 3]);
//! ```

pub mod batch;
pub mod error;
pub mod memory;
pub mod model;
pub mod service;
pub mod store;
pub mod writer;

pub use batch::{BatchedWriter, ChildLocation};
pub use error::{Result, WriteError};
pub use memory::{Filter, MemoryCollection, MemoryDocument, MemoryStore};
pub use model::{identity, mapper, Identified, Mapper};
pub use service::{CollectionService, DocumentService};
pub use store::{WriteBatch, WriteOp, WriteTarget};
pub use writer::{CollectionWriter, DocumentWriter, Writer};
