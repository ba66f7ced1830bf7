use super::{require_admin, WorldStore};
use crate::application::eventbus::SharedEventBus;
use crate::application::subscription::WorldSubscription;
use crate::domain::error::{DomainError, Rejection};
use crate::domain::event::DomainEvent;
use crate::domain::model::{normalize_email, Membership, Player, User, World, WorldHeader};
use crate::domain::reconciler::Clock;
use crate::domain::repository::{Result, UserRepository, WorldNameRepository, WorldRepository};
use std::collections::BTreeSet;
use std::sync::Arc;
use ulid::Ulid;

/// A world as listed for one of its members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldEntry {
    pub world_id: String,
    pub header: WorldHeader,
}

/// World lifecycle, membership and announcements.
pub struct WorldService<W, U, N>
where
    W: WorldRepository,
    U: UserRepository,
    N: WorldNameRepository,
{
    store: WorldStore<W>,
    users: U,
    names: N,
    event_bus: SharedEventBus,
    clock: Arc<dyn Clock>,
}

impl<W, U, N> WorldService<W, U, N>
where
    W: WorldRepository,
    U: UserRepository,
    N: WorldNameRepository,
{
    pub fn new(
        worlds: W,
        users: U,
        names: N,
        event_bus: SharedEventBus,
        clock: Arc<dyn Clock>,
        max_attempts: u32,
    ) -> Self {
        Self {
            store: WorldStore::new(worlds, event_bus.clone(), max_attempts),
            users,
            names,
            event_bus,
            clock,
        }
    }

    pub fn user(&self, user_id: &str) -> Result<User> {
        self.users
            .find_by_id(user_id)?
            .ok_or_else(|| DomainError::NotFound(format!("User {}", user_id)))
    }

    /// Returns the user for `email`, creating it on first sign-up.
    pub fn register_user(&self, email: &str, name: &str) -> Result<User> {
        let id = normalize_email(email)?;
        if let Some(existing) = self.users.find_by_id(&id)? {
            return Ok(existing);
        }

        let mut user = User::from_email(email)?;
        if !name.trim().is_empty() {
            user.name = name.trim().to_string();
        }
        self.save_user(&user)?;
        tracing::info!("Registered user {}", user.id);
        Ok(user)
    }

    pub fn rename_user(&self, user_id: &str, name: &str) -> Result<User> {
        let mut user = self.user(user_id)?;
        user.name = name.trim().to_string();
        self.save_user(&user)?;
        Ok(user)
    }

    /// Creates a world administered by `actor` and selects it.
    pub fn create_world(&self, actor: &str, name: &str) -> Result<WorldEntry> {
        let mut user = self.user(actor)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Rejection::EmptyWorldName.into());
        }

        let lowered = name.to_lowercase();
        for entry in self.worlds_of(actor)? {
            if entry.header.name.to_lowercase() == lowered {
                return Err(Rejection::DuplicateWorldName(name.to_string()).into());
            }
        }

        let header = WorldHeader::new(name.to_string());
        self.names.save(&header)?;
        let world = self
            .store
            .insert(&World::new(Ulid::new().to_string(), user.id.clone()))?;

        user.join(Membership {
            header_id: header.id.clone(),
            world_id: world.id.clone(),
        });
        user.current_world = Some(world.id.clone());
        self.save_user(&user)?;

        tracing::info!("{} created world {} ({})", actor, header.name, world.id);
        Ok(WorldEntry {
            world_id: world.id,
            header,
        })
    }

    /// Leaves a world. An admin leaving deletes the world for every member.
    pub fn leave_world(&self, actor: &str, world_id: &str) -> Result<()> {
        let mut user = self.user(actor)?;
        let membership = user
            .membership(world_id)
            .cloned()
            .ok_or_else(|| Rejection::NotAMember(world_id.to_string()))?;

        let world = match self.store.repo().find_by_id(world_id)? {
            Some(world) => world,
            None => {
                // Dangling membership to a world deleted elsewhere.
                user.leave(world_id);
                return self.save_user(&user);
            }
        };

        if !world.is_admin(actor) {
            user.leave(world_id);
            self.save_user(&user)?;
            tracing::info!("{} left world {}", actor, world_id);
            return Ok(());
        }

        let members: BTreeSet<&str> = world
            .admins
            .iter()
            .map(String::as_str)
            .chain(world.pending_users.iter().map(|p| p.user_id.as_str()))
            .chain(world.all_players().map(|p| p.user_id.as_str()))
            .collect();

        self.store.delete(world_id)?;
        for member in members {
            match self.users.find_by_id(member) {
                Ok(Some(mut other)) => {
                    if other.leave(world_id).is_some() {
                        if let Err(e) = self.save_user(&other) {
                            tracing::warn!("Failed to drop {} from world {}: {}", member, world_id, e);
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Failed to load member {}: {}", member, e),
            }
        }
        self.names.delete(&membership.header_id)?;

        tracing::info!("{} deleted world {}", actor, world_id);
        Ok(())
    }

    /// Adds the user behind `email` to the world's pending pool, creating
    /// the user document when absent.
    pub fn invite_player(&self, actor: &str, world_id: &str, email: &str) -> Result<User> {
        let user_id = normalize_email(email)?;
        let header_id = self
            .user(actor)?
            .membership(world_id)
            .map(|m| m.header_id.clone())
            .ok_or_else(|| Rejection::NotAMember(world_id.to_string()))?;

        self.store.mutate(world_id, |world| {
            require_admin(world, actor, "invite players")?;
            world.invite(&user_id)
        })?;

        let mut invited = match self.users.find_by_id(&user_id)? {
            Some(user) => user,
            None => User::from_email(email)?,
        };
        invited.join(Membership {
            header_id,
            world_id: world_id.to_string(),
        });
        self.save_user(&invited)?;

        tracing::info!("{} invited {} to world {}", actor, user_id, world_id);
        Ok(invited)
    }

    pub fn remove_pending_user(&self, actor: &str, world_id: &str, user_id: &str) -> Result<Player> {
        let player = self.store.mutate(world_id, |world| {
            require_admin(world, actor, "remove pending users")?;
            world.remove_pending_user(user_id)
        })?;

        if let Some(mut user) = self.users.find_by_id(user_id)? {
            if user.leave(world_id).is_some() {
                self.save_user(&user)?;
            }
        }
        tracing::info!("{} removed pending user {} from world {}", actor, user_id, world_id);
        Ok(player)
    }

    pub fn post_announcement(&self, actor: &str, world_id: &str, message: &str) -> Result<()> {
        let now = self.clock.now();
        self.store.mutate(world_id, |world| {
            require_admin(world, actor, "post announcements")?;
            world.post_announcement(actor, message, now)
        })
    }

    /// Deletes announcements by position and returns how many went away.
    pub fn delete_announcements(&self, actor: &str, world_id: &str, positions: &[usize]) -> Result<usize> {
        self.store.mutate(world_id, |world| {
            require_admin(world, actor, "delete announcements")?;
            Ok(world.delete_announcements(positions))
        })
    }

    pub fn select_world(&self, user_id: &str, world_id: &str) -> Result<User> {
        let mut user = self.user(user_id)?;
        if !user.is_member(world_id) {
            return Err(Rejection::NotAMember(world_id.to_string()).into());
        }
        if user.current_world.as_deref() != Some(world_id) {
            user.current_world = Some(world_id.to_string());
            self.save_user(&user)?;
        }
        Ok(user)
    }

    /// Lists the worlds a user belongs to. Memberships whose header is gone
    /// are skipped.
    pub fn worlds_of(&self, user_id: &str) -> Result<Vec<WorldEntry>> {
        let user = self.user(user_id)?;
        let mut entries = Vec::with_capacity(user.worlds.len());
        for membership in user.worlds {
            match self.names.find_by_id(&membership.header_id)? {
                Some(header) => entries.push(WorldEntry {
                    world_id: membership.world_id,
                    header,
                }),
                None => tracing::debug!(
                    "Skipping world {} of {}: header {} missing",
                    membership.world_id,
                    user_id,
                    membership.header_id
                ),
            }
        }
        Ok(entries)
    }

    pub fn world(&self, world_id: &str) -> Result<World> {
        self.store.load(world_id)
    }

    /// Follows a world. The receiver is attached before the snapshot is
    /// read so no update in between is missed.
    pub fn subscribe(&self, world_id: &str) -> Result<WorldSubscription> {
        let rx = self.event_bus.subscribe();
        let world = self.store.load(world_id)?;
        Ok(WorldSubscription::new(world_id.to_string(), Some(world), rx))
    }

    fn save_user(&self, user: &User) -> Result<()> {
        self.users.save(user)?;
        self.event_bus.publish(DomainEvent::UserUpdated { user: user.clone() });
        Ok(())
    }
}
