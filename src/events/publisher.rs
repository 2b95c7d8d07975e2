use serde_json::Value;
use tokio::sync::broadcast;

/// Broadcast publisher for store lifecycle events.
///
/// Read-side collaborators (UI projection, reporting export) subscribe to
/// learn when a background mutation batch has completed and their caches
/// must be invalidated. Publishing never blocks the writer.
#[derive(Debug, Clone)]
pub struct StoreEventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

/// Event that has been published.
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub name: String,
    pub context: Value,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl StoreEventPublisher {
    /// Create a new publisher with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event with the given name and context.
    pub fn publish(&self, event_name: impl Into<String>, context: Value) {
        let event = PublishedEvent {
            name: event_name.into(),
            context,
            published_at: chrono::Utc::now(),
        };

        // A send error only means there are no subscribers right now, which
        // is fine: mutations must not depend on anyone listening.
        let _ = self.sender.send(event);
    }

    /// Publish the post-batch invalidation signal naming the touched day
    /// keys.
    pub fn publish_invalidated(&self, day_keys: &[String]) {
        if day_keys.is_empty() {
            return;
        }
        self.publish(
            crate::constants::events::STORE_INVALIDATED,
            serde_json::json!({ "dayKeys": day_keys }),
        );
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for StoreEventPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalidation_reaches_subscriber() {
        let publisher = StoreEventPublisher::default();
        let mut rx = publisher.subscribe();

        publisher.publish_invalidated(&["2025-01-01".to_string()]);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name, crate::constants::events::STORE_INVALIDATED);
        assert_eq!(event.context["dayKeys"][0], "2025-01-01");
    }

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let publisher = StoreEventPublisher::default();
        publisher.publish_invalidated(&["2025-01-01".to_string()]);
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[test]
    fn test_empty_batch_publishes_nothing() {
        let publisher = StoreEventPublisher::default();
        let mut rx = publisher.subscribe();
        publisher.publish_invalidated(&[]);
        assert!(rx.try_recv().is_err());
    }
}
