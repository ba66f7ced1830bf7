use crate::domain::event::DomainEvent;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Events a receiver may fall behind by before it starts skipping.
const DEFAULT_CAPACITY: usize = 256;

/// Fan-out of domain events to every live subscription.
///
/// World events carry full snapshots, so a lagging receiver loses nothing
/// it cannot recover from the next event.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns the number of receivers the event reached.
    pub fn publish(&self, event: DomainEvent) -> usize {
        let name = event.event_name();
        let world_id = event.world_id().map(str::to_string);
        match self.sender.send(event) {
            Ok(reached) => {
                tracing::trace!("{} for {:?} reached {} receivers", name, world_id, reached);
                reached
            }
            Err(_) => {
                tracing::trace!("{} for {:?} had no receivers", name, world_id);
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

pub type SharedEventBus = Arc<EventBus>;

pub fn create_event_bus() -> SharedEventBus {
    Arc::new(EventBus::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_receivers() {
        let bus = EventBus::new(4);
        let reached = bus.publish(DomainEvent::WorldDeleted {
            world_id: "w1".into(),
        });
        assert_eq!(reached, 0);
    }

    #[test]
    fn test_every_receiver_gets_the_event() {
        let bus = EventBus::new(4);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        let reached = bus.publish(DomainEvent::BankExpired {
            world_id: "w1".into(),
            group_id: "g1".into(),
        });
        assert_eq!(reached, 2);
        assert_eq!(first.try_recv().unwrap().event_name(), "bank_expired");
        assert_eq!(second.try_recv().unwrap().world_id(), Some("w1"));
    }
}
