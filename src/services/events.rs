//! Event-bus collaborator interface and the broadcast implementation.

use crate::model::Resource;
use tokio::sync::broadcast;
use tracing::trace;

/// Kind of change a [`ResourceEvent`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

/// A resource change as seen by subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEvent {
    pub kind: EventKind,
    pub resource: Resource,
}

/// Fire-and-forget change notifications.
pub trait EventSink: Send + Sync {
    fn created(&self, resource: &Resource);
    fn updated(&self, resource: &Resource);
    fn deleted(&self, resource: &Resource);
}

/// Publishes every change on a tokio broadcast channel.
///
/// Sending never blocks. Events published while nobody is subscribed are dropped,
/// and slow subscribers observe `RecvError::Lagged` rather than slowing the dispatcher.
#[derive(Debug, Clone)]
pub struct BroadcastEvents {
    sender: broadcast::Sender<ResourceEvent>,
}

impl BroadcastEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.sender.subscribe()
    }

    fn publish(&self, kind: EventKind, resource: &Resource) {
        let event = ResourceEvent { kind, resource: resource.clone() };
        if self.sender.send(event).is_err() {
            trace!(ri = %resource.ri, ?kind, "No event subscribers");
        }
    }
}

impl EventSink for BroadcastEvents {
    fn created(&self, resource: &Resource) {
        self.publish(EventKind::Created, resource);
    }

    fn updated(&self, resource: &Resource) {
        self.publish(EventKind::Updated, resource);
    }

    fn deleted(&self, resource: &Resource) {
        self.publish(EventKind::Deleted, resource);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceType;

    #[tokio::test]
    async fn subscribers_receive_events_in_order() {
        let events = BroadcastEvents::new(8);
        let mut rx = events.subscribe();
        let cnt = Resource::new(ResourceType::Container, "cnt1", "box", Some("ae1".into()));

        events.created(&cnt);
        events.deleted(&cnt);

        assert_eq!(rx.recv().await.unwrap().kind, EventKind::Created);
        let deleted = rx.recv().await.unwrap();
        assert_eq!(deleted.kind, EventKind::Deleted);
        assert_eq!(deleted.resource.ri, "cnt1");
    }
}
