//! Integration tests for combined subscriptions.

use docstream_core::{ChangeKind, Decoder, Document, DocumentChange, QuerySnapshot};
use docstream_reactive::{feed, queue, Listener, SourceHub, SubscriptionRegistry};
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Clone, Debug, PartialEq, Deserialize)]
struct Reading {
    value: i64,
}

fn readings(values: &[i64]) -> QuerySnapshot {
    QuerySnapshot::new(
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Document::new(format!("r{}", i), json!({ "value": v })))
            .collect(),
    )
}

#[test]
fn test_two_items_decode() {
    let hub = SourceHub::new();
    let listener = Listener::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = seen.clone();
    listener.subscribe(
        (feed::collection(hub.clone(), Decoder::<Reading>::json()),),
        move |result| sink.lock().unwrap().push(result.unwrap().0),
    );
    hub.publish(readings(&[4, 5]));

    assert_eq!(
        *seen.lock().unwrap(),
        vec![vec![Reading { value: 4 }, Reading { value: 5 }]]
    );
}

#[test]
fn test_four_sources() {
    let hubs: Vec<SourceHub<QuerySnapshot>> = (0..4).map(|_| SourceHub::new()).collect();
    let listener = Listener::new();
    let totals = Arc::new(Mutex::new(Vec::new()));

    let sink = totals.clone();
    listener.subscribe(
        (
            feed::collection(hubs[0].clone(), Decoder::<Reading>::json()),
            feed::collection(hubs[1].clone(), Decoder::<Reading>::json()),
            feed::collection(hubs[2].clone(), Decoder::<Reading>::json()),
            feed::collection(hubs[3].clone(), Decoder::<Reading>::json()),
        ),
        move |result| {
            let (a, b, c, d) = result.unwrap();
            sink.lock().unwrap().push(a.len() + b.len() + c.len() + d.len());
        },
    );

    for (i, hub) in hubs.iter().enumerate() {
        hub.publish(readings(&vec![1; i + 1]));
    }
    hubs[0].publish(readings(&[]));

    assert_eq!(*totals.lock().unwrap(), vec![10, 9]);
}

#[test]
fn test_change_subscription() {
    let hub = SourceHub::new();
    let listener = Listener::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = seen.clone();
    listener.subscribe(
        (feed::changes(hub.clone(), Decoder::<Reading>::json()),),
        move |result| sink.lock().unwrap().push(result.unwrap().0),
    );

    let first = vec![Document::new("a", json!({ "value": 1 }))];
    hub.publish(QuerySnapshot::initial(first.clone()));
    hub.publish(QuerySnapshot::transition(
        &first,
        vec![Document::new("a", json!({ "value": 2 }))],
    ));

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            vec![(ChangeKind::Added, Reading { value: 1 })],
            vec![(ChangeKind::Modified, Reading { value: 2 })],
        ]
    );
}

#[test]
fn test_change_subscription_threshold() {
    let hub = SourceHub::new();
    let listener = Listener::new();
    let rejected = Arc::new(AtomicUsize::new(0));

    let sink = rejected.clone();
    listener.subscribe(
        (feed::changes(hub.clone(), Decoder::<Reading>::json()),),
        move |result| {
            if result.is_err() {
                sink.fetch_add(1, Ordering::SeqCst);
            }
        },
    );

    hub.publish(QuerySnapshot::with_changes(
        Vec::new(),
        vec![DocumentChange::new(
            ChangeKind::Removed,
            Document::new("a", json!({ "value": "gone" })),
        )],
    ));
    assert_eq!(rejected.load(Ordering::SeqCst), 1);
}

#[test]
fn test_callback_may_unsubscribe_itself() {
    let hub = SourceHub::new();
    let listener = Arc::new(Listener::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let token = Arc::new(Mutex::new(None));

    let inner = Arc::downgrade(&listener);
    let count = calls.clone();
    let own = token.clone();
    let id = listener.subscribe(
        (feed::collection(hub.clone(), Decoder::<Reading>::json()),),
        move |_| {
            count.fetch_add(1, Ordering::SeqCst);
            if let (Some(listener), Some(id)) = (inner.upgrade(), *own.lock().unwrap()) {
                listener.unsubscribe(id);
            }
        },
    );
    *token.lock().unwrap() = Some(id);

    hub.publish(readings(&[1]));
    hub.publish(readings(&[2]));

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!listener.is_subscribed(id));
    assert_eq!(hub.listener_count(), 0);
}

#[test]
fn test_nested_emission_from_callback() {
    let hub = SourceHub::new();
    let listener = Listener::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = seen.clone();
    let echo = hub.clone();
    listener.subscribe(
        (feed::collection(hub.clone(), Decoder::<Reading>::json()),),
        move |result| {
            let (items,) = result.unwrap();
            let total: i64 = items.iter().map(|r| r.value).sum();
            sink.lock().unwrap().push(total);
            if total < 3 {
                echo.publish(readings(&[total + 1]));
            }
        },
    );

    hub.publish(readings(&[1]));
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
}

#[test]
fn test_concurrent_emissions_are_serialized() {
    let hub = SourceHub::new();
    let listener = Listener::new();
    let active = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let deliveries = Arc::new(AtomicUsize::new(0));

    let (a, o, d) = (active.clone(), overlaps.clone(), deliveries.clone());
    listener.subscribe(
        (feed::collection(hub.clone(), Decoder::<Reading>::json()),),
        move |_| {
            if a.fetch_add(1, Ordering::SeqCst) > 0 {
                o.fetch_add(1, Ordering::SeqCst);
            }
            d.fetch_add(1, Ordering::SeqCst);
            a.fetch_sub(1, Ordering::SeqCst);
        },
    );

    let threads: Vec<_> = (0..4)
        .map(|t| {
            let hub = hub.clone();
            thread::spawn(move || {
                for i in 0..50 {
                    hub.publish(readings(&[t * 100 + i]));
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    let delivered = deliveries.load(Ordering::SeqCst);
    assert!(delivered >= 1 && delivered <= 200);
}

#[test]
fn test_shared_registry_across_listeners() {
    let registry = SubscriptionRegistry::new();
    let hub = SourceHub::<QuerySnapshot>::new();
    let first = Listener::builder().registry(registry.clone()).build().unwrap();
    let second = Listener::builder().registry(registry.clone()).build().unwrap();

    let a = first.subscribe(
        (feed::collection(hub.clone(), Decoder::<Reading>::json()),),
        |_| {},
    );
    let b = second.subscribe(
        (feed::collection(hub.clone(), Decoder::<Reading>::json()),),
        |_| {},
    );

    assert_ne!(a, b);
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.cancel_all(), 2);
    assert_eq!(hub.listener_count(), 0);
}

#[tokio::test]
async fn test_queue_delivery_on_task() {
    let hub = SourceHub::new();
    let (delivery, mut queue) = queue();
    let listener = Listener::builder().delivery(delivery).build().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = seen.clone();
    listener.subscribe(
        (feed::collection(hub.clone(), Decoder::<Reading>::json()),),
        move |result| sink.lock().unwrap().push(result.unwrap().0.len()),
    );

    let producer = hub.clone();
    thread::spawn(move || {
        producer.publish(readings(&[1]));
        producer.publish(readings(&[1, 2]));
    })
    .join()
    .unwrap();

    assert!(queue.next().await);
    assert!(queue.next().await);
    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
}
