use serde::Serialize;
use tokio::sync::broadcast;

/// Lifecycle notifications published by the container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServiceEvent {
    Initialized { service: String },
    Degraded { service: String, reason: String },
    Failed { service: String, reason: String },
    ContainerReady,
    ShutdownComplete,
}

impl ServiceEvent {
    /// The service this event is about, if any.
    pub fn service(&self) -> Option<&str> {
        match self {
            Self::Initialized { service }
            | Self::Degraded { service, .. }
            | Self::Failed { service, .. } => Some(service),
            Self::ContainerReady | Self::ShutdownComplete => None,
        }
    }
}

/// In-memory broadcast bus for [`ServiceEvent`]s
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ServiceEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Largest accepted event channel capacity
pub const MAX_EVENT_CAPACITY: usize = 1 << 16;

impl EventBus {
    /// Capacity is clamped to `1..=MAX_EVENT_CAPACITY`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.clamp(1, MAX_EVENT_CAPACITY));
        Self { sender }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: ServiceEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServiceEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(ServiceEvent::Initialized {
            service: "storage".into(),
        });
        bus.publish(ServiceEvent::ContainerReady);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.service(), Some("storage"));
        assert_eq!(rx.recv().await.unwrap(), ServiceEvent::ContainerReady);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(0);
        bus.publish(ServiceEvent::ShutdownComplete);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_oversized_capacity_is_clamped() {
        let bus = EventBus::new(usize::MAX);
        let mut rx = bus.subscribe();
        bus.publish(ServiceEvent::ContainerReady);
        assert_eq!(rx.recv().await.unwrap(), ServiceEvent::ContainerReady);
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let json = serde_json::to_value(ServiceEvent::Degraded {
            service: "ai_client".into(),
            reason: "no key".into(),
        })
        .unwrap();
        assert_eq!(json["event"], "degraded");
        assert_eq!(json["service"], "ai_client");
    }
}
