mod expiry_sweeper;
mod group_service;
mod world_service;

pub use expiry_sweeper::run_expiry_sweeper;
pub use group_service::GroupService;
pub use world_service::{WorldEntry, WorldService};

use crate::application::eventbus::SharedEventBus;
use crate::domain::error::{DomainError, Rejection};
use crate::domain::event::DomainEvent;
use crate::domain::model::{Group, World};
use crate::domain::repository::{Result, WorldRepository};

/// Versioned read-modify-write access to world documents.
///
/// A mutation loads the current snapshot, applies a pure operation and
/// saves the result with a version check. When another writer got there
/// first the whole operation is replayed on a fresh snapshot, up to
/// `max_attempts` times.
pub(crate) struct WorldStore<R: WorldRepository> {
    repo: R,
    event_bus: SharedEventBus,
    max_attempts: u32,
}

impl<R: WorldRepository> WorldStore<R> {
    pub(crate) fn new(repo: R, event_bus: SharedEventBus, max_attempts: u32) -> Self {
        Self {
            repo,
            event_bus,
            max_attempts: max_attempts.max(1),
        }
    }

    pub(crate) fn repo(&self) -> &R {
        &self.repo
    }

    pub(crate) fn load(&self, world_id: &str) -> Result<World> {
        self.repo
            .find_by_id(world_id)?
            .ok_or_else(|| DomainError::NotFound(format!("World {}", world_id)))
    }

    pub(crate) fn insert(&self, world: &World) -> Result<World> {
        let stored = self.repo.insert(world)?;
        self.event_bus.publish(DomainEvent::WorldUpdated {
            world: stored.clone(),
        });
        Ok(stored)
    }

    pub(crate) fn delete(&self, world_id: &str) -> Result<()> {
        self.repo.delete(world_id)?;
        self.event_bus.publish(DomainEvent::WorldDeleted {
            world_id: world_id.to_string(),
        });
        Ok(())
    }

    /// Apply `op` to the current world and persist the outcome.
    ///
    /// Changes `op` made before rejecting are still written, which lets
    /// callers persist housekeeping (such as an expired bank) together with
    /// a refused request. An unchanged world is not written at all.
    pub(crate) fn mutate<T>(
        &self,
        world_id: &str,
        mut op: impl FnMut(&mut World) -> std::result::Result<T, Rejection>,
    ) -> Result<T> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let original = self.load(world_id)?;
            let mut world = original.clone();
            let outcome = op(&mut world);

            if world == original {
                return outcome.map_err(DomainError::from);
            }

            match self.repo.save(&world) {
                Ok(saved) => {
                    tracing::debug!("World {} saved at version {}", saved.id, saved.version);
                    self.event_bus.publish(DomainEvent::WorldUpdated { world: saved });
                    return outcome.map_err(DomainError::from);
                }
                Err(e) if e.is_stale_write() && attempt < self.max_attempts => {
                    tracing::warn!(
                        "Concurrent update of world {} (attempt {}/{}): {}",
                        world_id,
                        attempt,
                        self.max_attempts,
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}

pub(crate) fn require_admin(world: &World, actor: &str, action: &'static str) -> std::result::Result<(), Rejection> {
    if world.is_admin(actor) {
        Ok(())
    } else {
        Err(Rejection::NotPermitted {
            actor: actor.to_string(),
            action,
        })
    }
}

/// Leaders may run their own group's distribution; admins may run any.
pub(crate) fn require_leader_or_admin(
    world: &World,
    group: &Group,
    actor: &str,
    action: &'static str,
) -> std::result::Result<(), Rejection> {
    if group.is_leader(actor) {
        return Ok(());
    }
    require_admin(world, actor, action)
}
