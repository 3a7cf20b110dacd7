//! Delivery contexts.
//!
//! Results are handed to the subscriber through a `DeliveryContext`. The
//! default runs the callback on the emitting thread; `queue()` defers it to
//! whichever task drains the queue.

use tokio::sync::mpsc;
use tracing::trace;

/// A deferred callback invocation.
pub type DeliveryJob = Box<dyn FnOnce() + Send>;

/// Where subscriber callbacks run.
pub trait DeliveryContext: Send + Sync {
    /// Runs or schedules `job`.
    fn dispatch(&self, job: DeliveryJob);
}

/// Runs callbacks on the thread that produced the emission.
#[derive(Clone, Copy, Debug, Default)]
pub struct Inline;

impl DeliveryContext for Inline {
    #[inline]
    fn dispatch(&self, job: DeliveryJob) {
        job()
    }
}

/// Sending half of a delivery queue.
#[derive(Clone)]
pub struct QueueDelivery {
    tx: mpsc::UnboundedSender<DeliveryJob>,
}

impl DeliveryContext for QueueDelivery {
    fn dispatch(&self, job: DeliveryJob) {
        if self.tx.send(job).is_err() {
            trace!("delivery queue closed, dropping result");
        }
    }
}

/// Receiving half of a delivery queue. Jobs run in the order they were
/// dispatched.
pub struct DeliveryQueue {
    rx: mpsc::UnboundedReceiver<DeliveryJob>,
}

impl DeliveryQueue {
    /// Runs every job queued so far. Returns how many ran.
    pub fn drain(&mut self) -> usize {
        let mut count = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            count += 1;
        }
        count
    }

    /// Waits for the next job and runs it. Returns false once every sender
    /// is gone.
    pub async fn next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Runs jobs until every sender is gone.
    pub async fn run(mut self) {
        while self.next().await {}
    }
}

/// Creates a delivery queue.
pub fn queue() -> (QueueDelivery, DeliveryQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (QueueDelivery { tx }, DeliveryQueue { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(u32) -> DeliveryJob) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let make = move |n: u32| {
            let sink = sink.clone();
            Box::new(move || sink.lock().unwrap().push(n)) as DeliveryJob
        };
        (log, make)
    }

    #[test]
    fn test_inline_runs_immediately() {
        let (log, job) = recorder();
        Inline.dispatch(job(1));
        assert_eq!(*log.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_queue_defers_until_drained() {
        let (log, job) = recorder();
        let (delivery, mut queue) = queue();

        delivery.dispatch(job(1));
        delivery.dispatch(job(2));
        assert!(log.lock().unwrap().is_empty());

        assert_eq!(queue.drain(), 2);
        assert_eq!(*log.lock().unwrap(), vec![1, 2]);
        assert_eq!(queue.drain(), 0);
    }

    #[test]
    fn test_dispatch_after_queue_dropped() {
        let (log, job) = recorder();
        let (delivery, queue) = queue();
        drop(queue);

        delivery.dispatch(job(1));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_until_senders_dropped() {
        let (log, job) = recorder();
        let (delivery, queue) = queue();

        let producer = delivery.clone();
        producer.dispatch(job(1));
        delivery.dispatch(job(2));
        drop(producer);
        drop(delivery);

        queue.run().await;
        assert_eq!(*log.lock().unwrap(), vec![1, 2]);
    }
}
