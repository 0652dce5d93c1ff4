//! Fire-and-forget delivery of price updates, scraping status and
//! notifications to whatever pushes them downstream.

pub mod notification;
pub mod sink;
#[cfg(test)]
mod tests;

pub use notification::{Notification, NotificationType};
pub use sink::{BroadcastEventSink, CollectingEventSink, EventSink, TracingEventSink};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    PriceUpdate,
    ScrapingStatus,
    Notification,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PriceUpdate => "price-update",
            EventType::ScrapingStatus => "scraping-status",
            EventType::Notification => "notification",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_type: EventType,
    pub payload: Value,
    pub emitted_at: DateTime<Utc>,
}

impl Event {
    pub fn new(event_type: EventType, payload: Value) -> Self {
        Self {
            event_type,
            payload,
            emitted_at: Utc::now(),
        }
    }

    /// Value of the `status` field for scraping-status events
    pub fn status(&self) -> Option<&str> {
        self.payload.get("status").and_then(Value::as_str)
    }
}
