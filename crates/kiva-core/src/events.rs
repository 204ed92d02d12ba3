use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crossbeam_channel::{bounded, Receiver, Sender};
use serde_json::{Map, Value};

use crate::value::Document;

const SUBSCRIBER_CAPACITY: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Clone, Debug)]
pub struct ChangeEvent {
    pub collection: String,
    pub id: String,
    pub kind: ChangeKind,
    pub new: Option<Document>,
    pub old: Option<Document>,
    pub metadata: Map<String, Value>,
}

pub type Subscriber = Receiver<ChangeEvent>;

/// Per-collection subscriber table. Snapshotting for emission happens
/// under a short-held mutex; sends happen outside any lock.
type Aggregator = std::sync::Arc<dyn Fn(ChangeEvent) + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<u64, Sender<ChangeEvent>>>,
    aggregator: Mutex<Option<Aggregator>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscriber {
        let (tx, rx) = bounded(SUBSCRIBER_CAPACITY);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers.lock().unwrap().insert(id, tx);
        rx
    }

    pub fn set_aggregator(&self, f: Aggregator) {
        *self.aggregator.lock().unwrap() = Some(f);
    }

    /// Deliver `event` to every live subscriber with a non-blocking send.
    /// A full channel drops the event for that subscriber only
    /// (drop-newest-at-source backpressure policy). MUST be called only
    /// after the owning collection's write lock has been released.
    pub fn emit(&self, event: ChangeEvent) {
        let senders: Vec<Sender<ChangeEvent>> = {
            let table = self.subscribers.lock().unwrap();
            table.values().cloned().collect()
        };
        for tx in senders {
            let _ = tx.try_send(event.clone());
        }
        let aggregator = self.aggregator.lock().unwrap().clone();
        if let Some(agg) = aggregator {
            agg(event);
        }
    }

    /// Close every subscriber channel (dropping the sender half) and
    /// clear the table.
    pub fn close(&self) {
        self.subscribers.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Document {
        json!({"id": "a"}).as_object().unwrap().clone()
    }

    #[test]
    fn subscriber_receives_emitted_event() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        bus.emit(ChangeEvent {
            collection: "c".to_string(),
            id: "a".to_string(),
            kind: ChangeKind::Insert,
            new: Some(doc()),
            old: None,
            metadata: Map::new(),
        });
        let received = rx.try_recv().unwrap();
        assert_eq!(received.id, "a");
        assert_eq!(received.kind, ChangeKind::Insert);
    }

    #[test]
    fn multiple_subscribers_each_receive() {
        let bus = EventBus::new();
        let rx1 = bus.subscribe();
        let rx2 = bus.subscribe();
        bus.emit(ChangeEvent {
            collection: "c".to_string(),
            id: "a".to_string(),
            kind: ChangeKind::Insert,
            new: Some(doc()),
            old: None,
            metadata: Map::new(),
        });
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn full_channel_drops_event_without_erroring() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        for _ in 0..(SUBSCRIBER_CAPACITY + 5) {
            bus.emit(ChangeEvent {
                collection: "c".to_string(),
                id: "a".to_string(),
                kind: ChangeKind::Insert,
                new: Some(doc()),
                old: None,
                metadata: Map::new(),
            });
        }
        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, SUBSCRIBER_CAPACITY);
    }

    #[test]
    fn close_clears_subscriber_table() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        bus.close();
        bus.emit(ChangeEvent {
            collection: "c".to_string(),
            id: "a".to_string(),
            kind: ChangeKind::Insert,
            new: Some(doc()),
            old: None,
            metadata: Map::new(),
        });
        assert!(rx.try_recv().is_err());
    }
}
