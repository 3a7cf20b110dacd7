//! Docstream Reactive - Live subscriptions over document sources.
//!
//! This crate combines one or more live sources into a single typed update,
//! tolerating a bounded share of documents that fail to decode.
//!
//! # Core Concepts
//!
//! - `Feed`: A live source paired with a decoder (collection, document or changes)
//! - `FeedSet`: A tuple of 1 to 4 feeds combined latest-value style
//! - `ThresholdGuard`: Accepts or rejects a snapshot by its decode failure ratio
//! - `SubscriptionRegistry`: Tokens and cancel handles of live subscriptions
//! - `Listener`: Subscribes feed sets to callbacks
//! - `DeliveryContext`: Where callbacks run (inline or a drained queue)
//! - `SourceHub`: Broadcast adapter turning pushes into a `LiveSource`
//!
//! # Example
//!
//! ```rust
//! use docstream_core::{Decoder, Document, DocumentSnapshot, QuerySnapshot};
//! use docstream_reactive::{feed, Listener, SourceHub};
//! use serde::Deserialize;
//! use serde_json::json;
//!
//! #[derive(Deserialize)]
//! struct Entry {
//!     amount: i64,
//! }
//!
//! #[derive(Deserialize)]
//! struct Budget {
//!     limit: i64,
//! }
//!
//! let entries = SourceHub::<QuerySnapshot>::new();
//! let budget = SourceHub::<DocumentSnapshot>::new();
//! let listener = Listener::new();
//!
//! listener.subscribe(
//!     (
//!         feed::collection(entries.clone(), Decoder::<Entry>::json()),
//!         feed::document(budget.clone(), Decoder::<Budget>::json()),
//!     ),
//!     |result| {
//!         let (entries, budget) = result.unwrap();
//!         let spent: i64 = entries.iter().map(|e| e.amount).sum();
//!         assert!(budget.map_or(true, |b| spent <= b.limit));
//!     },
//! );
//!
//! entries.publish(QuerySnapshot::new(vec![Document::new("e1", json!({ "amount": 40 }))]));
//! budget.publish(DocumentSnapshot::existing(Document::new("b", json!({ "limit": 100 }))));
//! ```

pub mod combine;
pub mod decoder;
pub mod delivery;
pub mod feed;
pub mod guard;
pub mod hub;
pub mod listener;
pub mod registry;

pub use combine::{FeedSet, SlotEvent, SlotSink};
pub use decoder::{decode_changes, decode_documents, decode_snapshot, DecodeOutcome, Decoded};
pub use delivery::{queue, DeliveryContext, DeliveryJob, DeliveryQueue, Inline, QueueDelivery};
pub use feed::{ChangeFeed, CollectionFeed, CollectionSource, DocumentFeed, DocumentSource, Feed};
pub use guard::{ThresholdGuard, Verdict, DEFAULT_DECODE_FAILURE_THRESHOLD};
pub use hub::SourceHub;
pub use listener::{Listener, ListenerBuilder, ListenerConfig};
pub use registry::{Subscription, SubscriptionId, SubscriptionRegistry, WeakRegistry};
