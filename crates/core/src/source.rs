//! The live source capability.
//!
//! A vendor SDK exposes live reads as push callbacks. `LiveSource` is the
//! shape Docstream consumes: register a sink, get back a handle that stops
//! the flow of snapshots when cancelled.

use crate::error::TransportError;
use std::sync::Arc;

/// One push from a live source.
///
/// `Ok(None)` is the null-snapshot signal, distinct from an empty result set.
pub type Emission<S> = Result<Option<Arc<S>>, TransportError>;

/// Callback receiving a source's emissions.
pub type SnapshotSink<S> = Box<dyn Fn(Emission<S>) + Send + Sync>;

/// Stops a live source from emitting to one sink.
pub trait CancelHandle: Send {
    /// Cancels the registration.
    fn cancel(self: Box<Self>);
}

struct FnCancel<F>(F);

impl<F: FnOnce() + Send> CancelHandle for FnCancel<F> {
    fn cancel(self: Box<Self>) {
        (self.0)()
    }
}

/// Wraps a closure as a cancel handle.
pub fn cancel_fn<F>(f: F) -> Box<dyn CancelHandle>
where
    F: FnOnce() + Send + 'static,
{
    Box::new(FnCancel(f))
}

/// A push-based provider of snapshots.
///
/// Implementations may emit synchronously from `listen` (the current state)
/// and afterwards from any thread.
pub trait LiveSource: Send + Sync {
    /// The snapshot type this source emits.
    type Snapshot: Send + Sync + 'static;

    /// Starts delivering emissions to `sink`.
    fn listen(&self, sink: SnapshotSink<Self::Snapshot>) -> Box<dyn CancelHandle>;
}

impl<L: LiveSource + ?Sized> LiveSource for Arc<L> {
    type Snapshot = L::Snapshot;

    fn listen(&self, sink: SnapshotSink<Self::Snapshot>) -> Box<dyn CancelHandle> {
        (**self).listen(sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_cancel_fn_runs_once() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();

        let handle = cancel_fn(move || flag.store(true, Ordering::SeqCst));
        assert!(!cancelled.load(Ordering::SeqCst));

        handle.cancel();
        assert!(cancelled.load(Ordering::SeqCst));
    }
}
