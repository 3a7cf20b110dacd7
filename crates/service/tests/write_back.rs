//! Integration tests for callbacks that write to the stores they listen to.

use docstream_core::{CollectionPath, Decoder, Document, QuerySnapshot};
use docstream_reactive::{feed, Listener, SourceHub};
use docstream_service::{MemoryStore, WriteTarget};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

fn notes() -> CollectionPath {
    CollectionPath::new("notes").unwrap()
}

#[test]
fn test_write_back_while_another_thread_writes() {
    let store = MemoryStore::new();
    let hub = SourceHub::<QuerySnapshot>::new();
    let listener = Listener::new();
    let wrote = Arc::new(AtomicBool::new(false));
    let deliveries = Arc::new(AtomicUsize::new(0));

    let target = store.clone();
    let (once, count) = (wrote.clone(), deliveries.clone());
    listener.subscribe(
        (
            feed::collection(hub.clone(), Decoder::<Value>::json()),
            feed::collection(store.collection(notes()), Decoder::<Value>::json()),
        ),
        move |result| {
            let (pushed, _) = result.unwrap();
            count.fetch_add(1, Ordering::SeqCst);
            if !pushed.is_empty() && !once.swap(true, Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(200));
                target
                    .set(&notes().doc("echo").unwrap(), json!({ "from": "callback" }))
                    .unwrap();
            }
        },
    );

    let (done, finished) = mpsc::channel();

    let publisher = hub.clone();
    let tx = done.clone();
    thread::spawn(move || {
        publisher.publish(QuerySnapshot::new(vec![Document::new("p", json!({}))]));
        let _ = tx.send("publisher");
    });

    let writer = store.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        writer
            .set(&notes().doc("other").unwrap(), json!({ "from": "writer" }))
            .unwrap();
        let _ = done.send("writer");
    });

    for _ in 0..2 {
        assert!(finished.recv_timeout(Duration::from_secs(5)).is_ok());
    }

    assert!(wrote.load(Ordering::SeqCst));
    assert_eq!(store.documents(&notes()).len(), 2);
    assert!(deliveries.load(Ordering::SeqCst) >= 2);
}

#[test]
fn test_parked_result_reflects_latest_store_state() {
    let store = MemoryStore::new();
    let hub = SourceHub::<QuerySnapshot>::new();
    let listener = Listener::new();
    let last = Arc::new(std::sync::Mutex::new(0usize));

    let target = store.clone();
    let seen = last.clone();
    listener.subscribe(
        (
            feed::collection(hub.clone(), Decoder::<Value>::json()),
            feed::collection(store.collection(notes()), Decoder::<Value>::json()),
        ),
        move |result| {
            let (_, notes_now) = result.unwrap();
            *seen.lock().unwrap() = notes_now.len();
            if notes_now.len() < 3 {
                let id = format!("n{}", notes_now.len());
                target.set(&notes().doc(&id).unwrap(), json!({})).unwrap();
            }
        },
    );

    hub.publish(QuerySnapshot::new(vec![]));

    assert_eq!(store.documents(&notes()).len(), 3);
    assert_eq!(*last.lock().unwrap(), 3);
}
