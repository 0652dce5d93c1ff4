use std::sync::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::{Event, EventType};

/// Receives events from the core. Emission never fails and never blocks.
pub trait EventSink: Send + Sync {
    fn emit(&self, event_type: EventType, payload: Value);
}

/// Fans events out to any number of subscribers
pub struct BroadcastEventSink {
    sender: broadcast::Sender<Event>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl EventSink for BroadcastEventSink {
    fn emit(&self, event_type: EventType, payload: Value) {
        // no subscribers is not an error
        if self.sender.send(Event::new(event_type, payload)).is_err() {
            debug!("Dropped {} event: no subscribers", event_type);
        }
    }
}

/// Writes every event to the log
#[derive(Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event_type: EventType, payload: Value) {
        info!(event = %event_type, "{}", payload);
    }
}

/// Keeps every emitted event in memory
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<Event>>,
}

impl CollectingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn of_type(&self, event_type: EventType) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event_type: EventType, payload: Value) {
        if let Ok(mut events) = self.events.lock() {
            events.push(Event::new(event_type, payload));
        }
    }
}
