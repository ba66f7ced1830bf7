use super::{require_admin, require_leader_or_admin, WorldStore};
use crate::application::eventbus::SharedEventBus;
use crate::domain::error::Rejection;
use crate::domain::event::DomainEvent;
use crate::domain::model::{Group, Player, World};
use crate::domain::reconciler::GroupScoreReconciler;
use crate::domain::repository::{Result, WorldRepository};
use chrono::{DateTime, Utc};

/// Group and score-bank operations on a world.
///
/// `actor` is the signed-in user performing the request. Every group
/// operation first evaluates the group, committing an expired bank; that
/// evaluation is saved even if the request itself is rejected.
pub struct GroupService<R: WorldRepository> {
    store: WorldStore<R>,
    reconciler: GroupScoreReconciler,
    event_bus: SharedEventBus,
}

impl<R: WorldRepository> GroupService<R> {
    pub fn new(
        repo: R,
        event_bus: SharedEventBus,
        reconciler: GroupScoreReconciler,
        max_attempts: u32,
    ) -> Self {
        Self {
            store: WorldStore::new(repo, event_bus.clone(), max_attempts),
            reconciler,
            event_bus,
        }
    }

    pub fn reconciler(&self) -> &GroupScoreReconciler {
        &self.reconciler
    }

    /// Current, evaluated view of a group. Nothing is written.
    pub fn group(&self, world_id: &str, group_id: &str) -> Result<Group> {
        let world = self.store.load(world_id)?;
        let group = world
            .group(group_id)
            .ok_or_else(|| Rejection::GroupNotFound(group_id.to_string()))?;
        Ok(self.reconciler.evaluate(group).group)
    }

    pub fn create_group(&self, actor: &str, world_id: &str, name: &str) -> Result<Group> {
        let group = self.store.mutate(world_id, |world| {
            require_admin(world, actor, "create groups")?;
            let id = world.create_group(name)?;
            world.group(&id).cloned().ok_or(Rejection::GroupNotFound(id))
        })?;
        tracing::info!("Created group {} ({}) in world {}", group.name, group.id, world_id);
        Ok(group)
    }

    /// Deletes a group; its players go back to the pending pool.
    pub fn delete_group(&self, actor: &str, world_id: &str, group_id: &str) -> Result<Group> {
        let removed = self.with_group(world_id, group_id, |world, _| {
            require_admin(world, actor, "delete groups")?;
            world.delete_group(group_id)
        })?;
        tracing::info!(
            "Deleted group {} in world {}, {} players returned to pool",
            group_id,
            world_id,
            removed.players.len()
        );
        Ok(removed)
    }

    pub fn assign_pending_user(
        &self,
        actor: &str,
        world_id: &str,
        user_id: &str,
        group_id: &str,
    ) -> Result<()> {
        self.store.mutate(world_id, |world| {
            require_admin(world, actor, "assign players")?;
            world.assign_pending_user(user_id, group_id)
        })?;
        tracing::info!("Assigned {} to group {} in world {}", user_id, group_id, world_id);
        Ok(())
    }

    pub fn set_bank(
        &self,
        actor: &str,
        world_id: &str,
        group_id: &str,
        amount: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Group> {
        self.with_group(world_id, group_id, |world, group| {
            require_admin(world, actor, "open a bank")?;
            let next = self.reconciler.set_bank(&group, amount, expires_at)?;
            world.replace_group(next.clone())?;
            Ok(next)
        })
    }

    pub fn adjust_pending_allocation(
        &self,
        actor: &str,
        world_id: &str,
        group_id: &str,
        user_id: &str,
        requested: u64,
    ) -> Result<Group> {
        self.with_group(world_id, group_id, |world, group| {
            require_leader_or_admin(world, &group, actor, "allocate bank score")?;
            let next = self.reconciler.adjust_pending_allocation(&group, user_id, requested)?;
            world.replace_group(next.clone())?;
            Ok(next)
        })
    }

    pub fn commit_bank(
        &self,
        actor: &str,
        world_id: &str,
        group_id: &str,
        clear_bank: bool,
    ) -> Result<Group> {
        let group = self.with_group(world_id, group_id, |world, group| {
            require_leader_or_admin(world, &group, actor, "commit the bank")?;
            let next = self.reconciler.commit_bank_to_players(&group, clear_bank)?;
            world.replace_group(next.clone())?;
            Ok(next)
        })?;
        tracing::info!("Committed bank of group {} in world {}", group_id, world_id);
        Ok(group)
    }

    pub fn set_player_score(
        &self,
        actor: &str,
        world_id: &str,
        group_id: &str,
        user_id: &str,
        score: &str,
    ) -> Result<Group> {
        self.with_group(world_id, group_id, |world, group| {
            require_admin(world, actor, "override scores")?;
            let next = self.reconciler.set_player_score(&group, user_id, score)?;
            world.replace_group(next.clone())?;
            Ok(next)
        })
    }

    pub fn transfer_leader(
        &self,
        actor: &str,
        world_id: &str,
        group_id: &str,
        user_id: &str,
    ) -> Result<Group> {
        self.with_group(world_id, group_id, |world, group| {
            require_admin(world, actor, "change the leader")?;
            let next = self.reconciler.transfer_leader(&group, user_id)?;
            world.replace_group(next.clone())?;
            Ok(next)
        })
    }

    pub fn clear_leader(&self, actor: &str, world_id: &str, group_id: &str) -> Result<Group> {
        self.with_group(world_id, group_id, |world, group| {
            require_admin(world, actor, "change the leader")?;
            let next = self.reconciler.clear_leader(&group);
            world.replace_group(next.clone())?;
            Ok(next)
        })
    }

    /// Removes a player from a group and returns it to the pending pool in
    /// the same world write.
    pub fn remove_player(
        &self,
        actor: &str,
        world_id: &str,
        group_id: &str,
        user_id: &str,
    ) -> Result<Player> {
        let player = self.with_group(world_id, group_id, |world, group| {
            require_admin(world, actor, "remove players")?;
            let removal = self.reconciler.remove_player(&group, user_id)?;
            world.replace_group(removal.group)?;
            world.return_to_pool(removal.returned_to_pool.clone());
            Ok(removal.returned_to_pool)
        })?;
        tracing::info!("Removed {} from group {} in world {}", user_id, group_id, world_id);
        Ok(player)
    }

    /// Commits and clears every expired bank of one world. Returns the ids
    /// of the groups whose bank expired.
    pub fn evaluate_world(&self, world_id: &str) -> Result<Vec<String>> {
        let expired = self.store.mutate(world_id, |world| Ok(self.evaluate_groups(world)))?;
        self.announce_expired(world_id, &expired);
        Ok(expired)
    }

    /// Runs [`Self::evaluate_world`] on every world holding an expired bank.
    /// Returns the number of banks cleared. Failing worlds are logged and
    /// skipped.
    pub fn sweep_expired_banks(&self) -> Result<usize> {
        let now = self.reconciler.now();
        let mut cleared = 0;
        for world in self.store.repo().find_all()? {
            let has_expired = world
                .groups
                .iter()
                .any(|g| g.bank.as_ref().is_some_and(|b| b.is_expired(now)));
            if !has_expired {
                continue;
            }

            match self.evaluate_world(&world.id) {
                Ok(groups) => cleared += groups.len(),
                Err(e) => tracing::warn!("Failed to expire banks of world {}: {}", world.id, e),
            }
        }

        if cleared > 0 {
            tracing::info!("Expiry sweep cleared {} banks", cleared);
        }
        Ok(cleared)
    }

    fn evaluate_groups(&self, world: &mut World) -> Vec<String> {
        let mut expired = Vec::new();
        for group in &mut world.groups {
            let evaluation = self.reconciler.evaluate(group);
            if evaluation.expired {
                expired.push(group.id.clone());
            }
            *group = evaluation.group;
        }
        expired
    }

    fn announce_expired(&self, world_id: &str, group_ids: &[String]) {
        for group_id in group_ids {
            tracing::info!("Bank of group {} in world {} expired", group_id, world_id);
            self.event_bus.publish(DomainEvent::BankExpired {
                world_id: world_id.to_string(),
                group_id: group_id.clone(),
            });
        }
    }

    /// Evaluates the group, writes the evaluation back into the world and
    /// then runs `op` on the evaluated group.
    fn with_group<T>(
        &self,
        world_id: &str,
        group_id: &str,
        op: impl Fn(&mut World, Group) -> std::result::Result<T, Rejection>,
    ) -> Result<T> {
        let mut expired = false;
        let result = self.store.mutate(world_id, |world| {
            let current = world
                .group(group_id)
                .ok_or_else(|| Rejection::GroupNotFound(group_id.to_string()))?;
            let evaluation = self.reconciler.evaluate(current);
            expired = evaluation.expired;
            world.replace_group(evaluation.group.clone())?;
            op(world, evaluation.group)
        });

        let persisted = match &result {
            Ok(_) => true,
            Err(e) => e.rejection().is_some(),
        };
        if expired && persisted {
            self.announce_expired(world_id, &[group_id.to_string()]);
        }
        result
    }
}
