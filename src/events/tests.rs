#[cfg(test)]
mod tests {
    use crate::events::{
        BroadcastEventSink, CollectingEventSink, EventSink, EventType, Notification,
        NotificationType,
    };
    use serde_json::json;

    #[test]
    fn test_event_type_names() {
        assert_eq!(EventType::PriceUpdate.as_str(), "price-update");
        assert_eq!(EventType::ScrapingStatus.as_str(), "scraping-status");
        assert_eq!(EventType::Notification.as_str(), "notification");
        assert_eq!(
            serde_json::to_value(EventType::ScrapingStatus).unwrap(),
            json!("scraping-status")
        );
    }

    #[tokio::test]
    async fn test_broadcast_sink_delivers_to_subscribers() {
        let sink = BroadcastEventSink::new(16);
        let mut rx = sink.subscribe();

        sink.emit(EventType::ScrapingStatus, json!({"status": "scheduling"}));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::ScrapingStatus);
        assert_eq!(event.status(), Some("scheduling"));
    }

    #[test]
    fn test_broadcast_sink_without_subscribers_does_not_panic() {
        let sink = BroadcastEventSink::new(1);
        sink.emit(EventType::PriceUpdate, json!({"productId": 1}));
    }

    #[test]
    fn test_collecting_sink_filters_by_type() {
        let sink = CollectingEventSink::new();
        sink.emit(EventType::PriceUpdate, json!({"productId": 1}));
        sink.emit(EventType::Notification, json!({"type": "price_change"}));

        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.of_type(EventType::PriceUpdate).len(), 1);

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_notification_payload_shape() {
        let n = Notification::competitor_price_drop(
            7,
            "Galaxy A15",
            3,
            900.0,
            1000.0,
            650.0,
            Some("below minimum price".to_string()),
        );
        let payload = n.to_payload();

        assert_eq!(payload["type"], "competitor_price_drop");
        assert_eq!(payload["productId"], 7);
        assert_eq!(payload["metadata"]["priceGap"], 100.0);
        assert_eq!(payload["metadata"]["guard"], "below minimum price");
        assert_eq!(n.notification_type, NotificationType::CompetitorPriceDrop);
    }
}
