//! Live world snapshots.
//!
//! A [`WorldSubscription`] follows one world document through the event
//! bus. Every update carries the full document, so a receiver that falls
//! behind simply skips to a newer snapshot.

use crate::domain::event::DomainEvent;
use crate::domain::model::World;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldSnapshot {
    Updated(World),
    Deleted,
}

pub struct WorldSubscription {
    world_id: String,
    rx: Option<broadcast::Receiver<DomainEvent>>,
    latest: Option<World>,
}

impl WorldSubscription {
    pub fn new(world_id: String, initial: Option<World>, rx: broadcast::Receiver<DomainEvent>) -> Self {
        Self {
            world_id,
            rx: Some(rx),
            latest: initial,
        }
    }

    pub fn world_id(&self) -> &str {
        &self.world_id
    }

    pub fn is_active(&self) -> bool {
        self.rx.is_some()
    }

    /// Wait for the next change of the followed world.
    ///
    /// Returns `None` once the world was deleted, the subscription was
    /// closed or the bus is gone.
    pub async fn next(&mut self) -> Option<WorldSnapshot> {
        loop {
            let rx = self.rx.as_mut()?;
            match rx.recv().await {
                Ok(event) => {
                    if let Some(snapshot) = self.accept(event) {
                        return Some(snapshot);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("World subscription {} skipped {} events", self.world_id, skipped);
                }
                Err(RecvError::Closed) => {
                    self.rx = None;
                    return None;
                }
            }
        }
    }

    /// Drain whatever has arrived and return the most recent snapshot.
    pub fn latest(&mut self) -> Option<&World> {
        while let Some(rx) = self.rx.as_mut() {
            match rx.try_recv() {
                Ok(event) => {
                    self.accept(event);
                }
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Closed) => {
                    self.rx = None;
                }
            }
        }
        self.latest.as_ref()
    }

    /// Stop following the world. Dropping the subscription has the same effect.
    pub fn unsubscribe(mut self) {
        self.rx = None;
        tracing::debug!("Unsubscribed from world {}", self.world_id);
    }

    fn accept(&mut self, event: DomainEvent) -> Option<WorldSnapshot> {
        match event {
            DomainEvent::WorldUpdated { world } if world.id == self.world_id => {
                // Out-of-order delivery never rolls the snapshot back.
                if self.latest.as_ref().is_some_and(|w| w.version > world.version) {
                    return None;
                }
                self.latest = Some(world.clone());
                Some(WorldSnapshot::Updated(world))
            }
            DomainEvent::WorldDeleted { world_id } if world_id == self.world_id => {
                self.latest = None;
                self.rx = None;
                Some(WorldSnapshot::Deleted)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::eventbus::EventBus;

    fn world(id: &str, version: u64) -> World {
        World {
            version,
            ..World::new(id.into(), "admin@x.io".into())
        }
    }

    #[tokio::test]
    async fn test_next_filters_other_worlds() {
        let bus = EventBus::new(16);
        let mut sub = WorldSubscription::new("w1".into(), Some(world("w1", 1)), bus.subscribe());

        bus.publish(DomainEvent::WorldUpdated { world: world("w2", 5) });
        bus.publish(DomainEvent::WorldUpdated { world: world("w1", 2) });

        assert_eq!(sub.next().await, Some(WorldSnapshot::Updated(world("w1", 2))));
    }

    #[tokio::test]
    async fn test_deleted_ends_subscription() {
        let bus = EventBus::new(16);
        let mut sub = WorldSubscription::new("w1".into(), None, bus.subscribe());

        bus.publish(DomainEvent::WorldDeleted { world_id: "w1".into() });
        assert_eq!(sub.next().await, Some(WorldSnapshot::Deleted));
        assert_eq!(sub.next().await, None);
        assert!(!sub.is_active());
    }

    #[test]
    fn test_latest_keeps_newest_version() {
        let bus = EventBus::new(2);
        let mut sub = WorldSubscription::new("w1".into(), Some(world("w1", 1)), bus.subscribe());

        for version in 2..=6 {
            bus.publish(DomainEvent::WorldUpdated { world: world("w1", version) });
        }
        assert_eq!(sub.latest().map(|w| w.version), Some(6));

        bus.publish(DomainEvent::WorldUpdated { world: world("w1", 3) });
        assert_eq!(sub.latest().map(|w| w.version), Some(6));
    }

    #[test]
    fn test_unsubscribe_releases_receiver() {
        let bus = EventBus::new(4);
        let sub = WorldSubscription::new("w1".into(), None, bus.subscribe());
        assert_eq!(bus.subscriber_count(), 1);

        sub.unsubscribe();
        assert_eq!(bus.subscriber_count(), 0);
    }
}
