//! The subscription entry point.
//!
//! A `Listener` owns a registry and subscribes feed sets to callbacks. Every
//! owning component (a service, a screen) creates its own listener; dropping
//! the listener cancels whatever is still subscribed.
//!
//! # Example
//!
//! ```rust
//! use docstream_core::{Decoder, Document, QuerySnapshot};
//! use docstream_reactive::{feed, Listener, SourceHub};
//! use serde::Deserialize;
//! use serde_json::json;
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Deserialize)]
//! struct Task {
//!     title: String,
//! }
//!
//! let tasks = SourceHub::<QuerySnapshot>::new();
//! let listener = Listener::new();
//! let titles = Arc::new(Mutex::new(Vec::new()));
//!
//! let seen = titles.clone();
//! let token = listener.subscribe(
//!     (feed::collection(tasks.clone(), Decoder::<Task>::json()),),
//!     move |result| {
//!         let (tasks,) = result.unwrap();
//!         *seen.lock().unwrap() = tasks.into_iter().map(|t| t.title).collect();
//!     },
//! );
//!
//! tasks.publish(QuerySnapshot::new(vec![
//!     Document::new("t1", json!({ "title": "write docs" })),
//! ]));
//! assert_eq!(*titles.lock().unwrap(), vec!["write docs".to_string()]);
//!
//! listener.unsubscribe(token);
//! ```

use crate::combine::{Combiner, FeedSet};
use crate::delivery::{DeliveryContext, Inline};
use crate::guard::{ThresholdGuard, DEFAULT_DECODE_FAILURE_THRESHOLD};
use crate::registry::{SubscriptionId, SubscriptionRegistry};
use docstream_core::{BoxError, ConfigError, ListenResult};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::debug;

/// Listener settings that hosts may load from their own configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Failure ratio at which a snapshot is rejected, in `(0, 1]`.
    pub decode_failure_threshold: f64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            decode_failure_threshold: DEFAULT_DECODE_FAILURE_THRESHOLD,
        }
    }
}

impl ListenerConfig {
    /// Checks that every setting is in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ThresholdGuard::new(self.decode_failure_threshold).map(|_| ())
    }
}

/// Builder for a `Listener`.
pub struct ListenerBuilder {
    threshold: f64,
    delivery: Arc<dyn DeliveryContext>,
    registry: Option<SubscriptionRegistry>,
}

impl Default for ListenerBuilder {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_DECODE_FAILURE_THRESHOLD,
            delivery: Arc::new(Inline),
            registry: None,
        }
    }
}

impl ListenerBuilder {
    /// Sets the decode failure threshold.
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets where callbacks run.
    pub fn delivery(mut self, delivery: impl DeliveryContext + 'static) -> Self {
        self.delivery = Arc::new(delivery);
        self
    }

    /// Shares an existing registry instead of creating one.
    pub fn registry(mut self, registry: SubscriptionRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Applies a loaded configuration.
    pub fn config(mut self, config: &ListenerConfig) -> Self {
        self.threshold = config.decode_failure_threshold;
        self
    }

    /// Builds the listener.
    pub fn build(self) -> Result<Listener, ConfigError> {
        Ok(Listener {
            registry: self.registry.unwrap_or_default(),
            guard: ThresholdGuard::new(self.threshold)?,
            delivery: self.delivery,
        })
    }
}

/// Subscribes feed sets and tracks the resulting subscriptions.
pub struct Listener {
    registry: SubscriptionRegistry,
    guard: ThresholdGuard,
    delivery: Arc<dyn DeliveryContext>,
}

impl Default for Listener {
    fn default() -> Self {
        Self::new()
    }
}

impl Listener {
    /// Creates a listener with the default threshold and inline delivery.
    pub fn new() -> Self {
        Self {
            registry: SubscriptionRegistry::new(),
            guard: ThresholdGuard::default(),
            delivery: Arc::new(Inline),
        }
    }

    /// Returns a builder.
    pub fn builder() -> ListenerBuilder {
        ListenerBuilder::default()
    }

    /// Subscribes to a feed set.
    ///
    /// The callback receives the decoded output of every feed once all of
    /// them have emitted, then again on every later emission.
    pub fn subscribe<S, C>(&self, feeds: S, on_update: C) -> SubscriptionId
    where
        S: FeedSet,
        C: Fn(ListenResult<S::Output>) + Send + Sync + 'static,
    {
        self.subscribe_with(feeds, Ok::<_, Infallible>, on_update)
    }

    /// Subscribes to a feed set, passing every combined output through
    /// `transformation` before delivery.
    pub fn subscribe_with<S, O, E, T, C>(
        &self,
        feeds: S,
        transformation: T,
        on_update: C,
    ) -> SubscriptionId
    where
        S: FeedSet,
        O: Send + 'static,
        E: Into<BoxError>,
        T: Fn(S::Output) -> Result<O, E> + Send + Sync + 'static,
        C: Fn(ListenResult<O>) + Send + Sync + 'static,
    {
        let id = self.registry.reserve();
        let combiner = Arc::new(Combiner::new(
            id,
            feeds,
            self.guard,
            Box::new(move |output: S::Output| {
                transformation(output).map_err(Into::<BoxError>::into)
            }),
            Box::new(on_update),
            self.registry.downgrade(),
            Arc::clone(&self.delivery),
        ));

        let handles = combiner.open();
        let sources = handles.len();
        if self.registry.attach(id, handles) {
            debug!(id, arity = S::ARITY, sources, "subscribed");
        }
        id
    }

    /// Cancels one subscription. Unknown tokens are a no-op.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.registry.cancel(id)
    }

    /// Cancels every subscription of this listener.
    pub fn unsubscribe_all(&self) -> usize {
        self.registry.cancel_all()
    }

    /// Returns the number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.registry.len()
    }

    /// Returns true if the token is live.
    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.registry.contains(id)
    }

    /// Returns the registry backing this listener.
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Returns the configured threshold.
    pub fn threshold(&self) -> f64 {
        self.guard.threshold()
    }

    /// Returns the guard applied to every subscription.
    pub fn guard(&self) -> ThresholdGuard {
        self.guard
    }
}
