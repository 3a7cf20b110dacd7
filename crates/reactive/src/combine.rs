//! Latest-value combination of several feeds.
//!
//! Each subscription keeps one slot per feed holding the feed's latest raw
//! emission. Nothing is produced until every slot is filled; afterwards any
//! slot update re-decodes all slots and produces one combined result.

use crate::delivery::DeliveryContext;
use crate::feed::Feed;
use crate::guard::ThresholdGuard;
use crate::registry::{SubscriptionId, WeakRegistry};
use docstream_core::{
    BoxError, CancelHandle, CombinedSourceFailure, ListenError, ListenResult, SlotFailure,
    TransportError,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

/// A change to the slot table of a subscription.
pub enum SlotEvent<L> {
    /// Stores a new raw emission in its slot.
    Update(Box<dyn FnOnce(&mut L) + Send>),
    /// The source at `position` failed.
    Transport {
        /// 0-based position of the failing feed.
        position: usize,
        /// The source's error.
        error: TransportError,
    },
}

/// Callback receiving slot events from every feed of a set.
pub type SlotSink<L> = Arc<dyn Fn(SlotEvent<L>) + Send + Sync>;

/// A fixed-arity set of feeds combined into one subscription.
///
/// Implemented for tuples of 1 to 4 feeds.
pub trait FeedSet: Send + Sync + 'static {
    /// Number of feeds.
    const ARITY: usize;
    /// Latest raw emission per slot, `None` until the feed first emits.
    type Latest: Default + Send + 'static;
    /// Raw emissions of every slot once all are filled.
    type Complete: Send + 'static;
    /// Decoded outputs of every slot.
    type Output: Send + 'static;

    /// Opens every feed, routing emissions to `sink`.
    fn open(&self, sink: SlotSink<Self::Latest>) -> Vec<Box<dyn CancelHandle>>;

    /// Returns the raw emissions if every slot is filled.
    fn complete(latest: &Self::Latest) -> Option<Self::Complete>;

    /// Decodes every slot. On failure, returns every failing position.
    fn decode(
        &self,
        complete: &Self::Complete,
        guard: &ThresholdGuard,
    ) -> Result<Self::Output, Vec<SlotFailure>>;
}

macro_rules! impl_feed_set {
    ($arity:expr; $(($F:ident, $idx:tt, $out:ident)),+) => {
        impl<$($F: Feed),+> FeedSet for ($($F,)+) {
            const ARITY: usize = $arity;
            type Latest = ($(Option<$F::Raw>,)+);
            type Complete = ($($F::Raw,)+);
            type Output = ($($F::Output,)+);

            fn open(&self, sink: SlotSink<Self::Latest>) -> Vec<Box<dyn CancelHandle>> {
                vec![$({
                    let sink = Arc::clone(&sink);
                    self.$idx.open(Box::new(
                        move |emission: Result<$F::Raw, TransportError>| match emission {
                            Ok(raw) => sink(SlotEvent::Update(Box::new(
                                move |latest: &mut Self::Latest| latest.$idx = Some(raw),
                            ))),
                            Err(error) => sink(SlotEvent::Transport { position: $idx, error }),
                        },
                    ))
                }),+]
            }

            fn complete(latest: &Self::Latest) -> Option<Self::Complete> {
                Some(($(latest.$idx.clone()?,)+))
            }

            fn decode(
                &self,
                complete: &Self::Complete,
                guard: &ThresholdGuard,
            ) -> Result<Self::Output, Vec<SlotFailure>> {
                $(let $out = self.$idx.decode(&complete.$idx, guard);)+
                match ($($out,)+) {
                    ($(Ok($out),)+) => Ok(($($out,)+)),
                    ($($out,)+) => {
                        let mut failures = Vec::new();
                        $(if let Err(error) = $out {
                            failures.push(SlotFailure::new($idx, error));
                        })+
                        Err(failures)
                    }
                }
            }
        }
    };
}

impl_feed_set!(1; (A, 0, a));
impl_feed_set!(2; (A, 0, a), (B, 1, b));
impl_feed_set!(3; (A, 0, a), (B, 1, b), (C, 2, c));
impl_feed_set!(4; (A, 0, a), (B, 1, b), (C, 2, c), (D, 3, d));

/// Caller transformation applied to every combined output.
pub(crate) type Transform<I, O> = Box<dyn Fn(I) -> Result<O, BoxError> + Send + Sync>;

/// Subscriber callback.
pub(crate) type Callback<O> = Box<dyn Fn(ListenResult<O>) + Send + Sync>;

struct Slots<L> {
    latest: L,
    seq: u64,
}

// Delivery bookkeeping. While one thread runs the callback, newer results
// park in `pending` and that thread delivers them once the callback returns.
struct Outbox<O> {
    delivered: u64,
    delivering: bool,
    pending: Option<(u64, ListenResult<O>)>,
}

/// The state machine behind one subscription.
pub(crate) struct Combiner<S: FeedSet, O> {
    id: SubscriptionId,
    feeds: S,
    guard: ThresholdGuard,
    slots: Mutex<Slots<S::Latest>>,
    outbox: Mutex<Outbox<O>>,
    transform: Transform<S::Output, O>,
    callback: Callback<O>,
    registry: WeakRegistry,
    delivery: Arc<dyn DeliveryContext>,
}

impl<S: FeedSet, O: Send + 'static> Combiner<S, O> {
    pub(crate) fn new(
        id: SubscriptionId,
        feeds: S,
        guard: ThresholdGuard,
        transform: Transform<S::Output, O>,
        callback: Callback<O>,
        registry: WeakRegistry,
        delivery: Arc<dyn DeliveryContext>,
    ) -> Self {
        Self {
            id,
            feeds,
            guard,
            slots: Mutex::new(Slots {
                latest: S::Latest::default(),
                seq: 0,
            }),
            outbox: Mutex::new(Outbox {
                delivered: 0,
                delivering: false,
                pending: None,
            }),
            transform,
            callback,
            registry,
            delivery,
        }
    }

    /// Opens every feed of the subscription.
    pub(crate) fn open(self: &Arc<Self>) -> Vec<Box<dyn CancelHandle>> {
        let target = Arc::clone(self);
        let sink: SlotSink<S::Latest> =
            Arc::new(move |event: SlotEvent<S::Latest>| target.on_event(event));
        self.feeds.open(sink)
    }

    fn on_event(self: &Arc<Self>, event: SlotEvent<S::Latest>) {
        if !self.registry.is_live(self.id) {
            trace!(id = self.id, "emission for cancelled subscription dropped");
            return;
        }

        match event {
            SlotEvent::Transport { position, error } => {
                let seq = {
                    let mut slots = self.slots.lock();
                    slots.seq += 1;
                    slots.seq
                };
                let failure = Self::aggregate(vec![SlotFailure::new(position, error.into())]);
                self.dispatch(seq, Err(failure));
            }
            SlotEvent::Update(apply) => {
                let (seq, complete) = {
                    let mut slots = self.slots.lock();
                    apply(&mut slots.latest);
                    slots.seq += 1;
                    (slots.seq, S::complete(&slots.latest))
                };
                let complete = match complete {
                    Some(complete) => complete,
                    None => return,
                };

                let result = match self.feeds.decode(&complete, &self.guard) {
                    Ok(output) => (self.transform)(output).map_err(ListenError::Transform),
                    Err(failures) => Err(Self::aggregate(failures)),
                };
                self.dispatch(seq, result);
            }
        }
    }

    // Single-feed subscriptions report the bare failure.
    fn aggregate(mut failures: Vec<SlotFailure>) -> ListenError {
        if S::ARITY == 1 && failures.len() == 1 {
            if let Some(failure) = failures.pop() {
                return failure.error;
            }
        }
        ListenError::Combined(CombinedSourceFailure::new(failures))
    }

    fn dispatch(self: &Arc<Self>, seq: u64, result: ListenResult<O>) {
        let this = Arc::clone(self);
        self.delivery
            .dispatch(Box::new(move || this.deliver(seq, result)));
    }

    // Never waits on a running callback: a result arriving mid-callback is
    // parked and delivered by the thread already running it.
    fn deliver(&self, seq: u64, result: ListenResult<O>) {
        {
            let mut outbox = self.outbox.lock();
            if seq <= outbox.delivered {
                trace!(id = self.id, seq, last = outbox.delivered, "stale emission superseded");
                return;
            }
            if outbox.delivering {
                if outbox.pending.as_ref().map_or(true, |(parked, _)| *parked < seq) {
                    outbox.pending = Some((seq, result));
                } else {
                    trace!(id = self.id, seq, "stale emission superseded");
                }
                return;
            }
            outbox.delivering = true;
            outbox.delivered = seq;
        }

        let mut next = Some((seq, result));
        while let Some((seq, result)) = next {
            if self.registry.is_live(self.id) {
                (self.callback)(result);
            } else {
                trace!(id = self.id, seq, "late emission for cancelled subscription dropped");
            }

            let mut outbox = self.outbox.lock();
            next = outbox.pending.take();
            match &next {
                Some((parked, _)) => outbox.delivered = *parked,
                None => outbox.delivering = false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::RawSink;
    use docstream_core::{cancel_fn, DecodeError, DecodeFailure, DecodeFailureReport};

    /// A feed whose raw value is a number; odd numbers fail to decode.
    struct Numbers;

    impl Feed for Numbers {
        type Raw = u32;
        type Output = u32;

        fn open(&self, _sink: RawSink<u32>) -> Box<dyn CancelHandle> {
            cancel_fn(|| {})
        }

        fn decode(&self, raw: &u32, _guard: &ThresholdGuard) -> ListenResult<u32> {
            if raw % 2 == 0 {
                Ok(*raw)
            } else {
                let failure = DecodeFailure::new(raw.to_string(), DecodeError::new("odd"));
                Err(DecodeFailureReport::new(1.0, 1, vec![failure]).into())
            }
        }
    }

    #[test]
    fn test_complete_requires_every_slot() {
        type Pair = (Numbers, Numbers);
        assert_eq!(<Pair as FeedSet>::complete(&(Some(2), None)), None);
        assert_eq!(<Pair as FeedSet>::complete(&(Some(2), Some(4))), Some((2, 4)));
    }

    #[test]
    fn test_decode_collects_every_failing_position() {
        let feeds = (Numbers, Numbers, Numbers);
        let guard = ThresholdGuard::default();

        assert_eq!(feeds.decode(&(2, 4, 6), &guard).unwrap(), (2, 4, 6));

        let failures = feeds.decode(&(1, 4, 3), &guard).unwrap_err();
        let positions: Vec<_> = failures.iter().map(|f| f.position).collect();
        assert_eq!(positions, vec![0, 2]);
    }

    #[test]
    fn test_arity() {
        assert_eq!(<(Numbers,) as FeedSet>::ARITY, 1);
        assert_eq!(<(Numbers, Numbers, Numbers, Numbers) as FeedSet>::ARITY, 4);
    }
}
