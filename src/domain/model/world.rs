use super::group::{Group, Player};
use crate::domain::error::Rejection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum number of characters in a group name.
pub const MIN_GROUP_NAME_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub by: String,
    pub message: String,
    pub posted_at: DateTime<Utc>,
}

/// World entity - a tenant holding groups, admins, announcements and the
/// pool of users not yet assigned to a group.
///
/// `version` is the store revision this snapshot was read at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct World {
    pub id: String,
    pub version: u64,
    pub admins: Vec<String>,
    pub announcements: Vec<Announcement>,
    pub groups: Vec<Group>,
    pub pending_users: Vec<Player>,
}

impl World {
    pub fn new(id: String, admin: String) -> Self {
        Self {
            id,
            version: 0,
            admins: vec![admin],
            announcements: Vec::new(),
            groups: Vec::new(),
            pending_users: Vec::new(),
        }
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admins.iter().any(|a| a == user_id)
    }

    pub fn group(&self, group_id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == group_id)
    }

    /// Finds the group a user currently plays in.
    pub fn group_of(&self, user_id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.contains(user_id))
    }

    pub fn is_pending(&self, user_id: &str) -> bool {
        self.pending_users.iter().any(|p| p.user_id == user_id)
    }

    /// Every player across all groups.
    pub fn all_players(&self) -> impl Iterator<Item = &Player> {
        self.groups.iter().flat_map(|g| g.players.iter())
    }

    /// Writes `group` back over the stored group with the same id.
    pub fn replace_group(&mut self, group: Group) -> Result<(), Rejection> {
        let slot = self
            .groups
            .iter_mut()
            .find(|g| g.id == group.id)
            .ok_or_else(|| Rejection::GroupNotFound(group.id.clone()))?;
        *slot = group;
        Ok(())
    }

    /// Creates an empty group and returns its id.
    pub fn create_group(&mut self, name: &str) -> Result<String, Rejection> {
        let name = name.trim();
        if name.chars().count() < MIN_GROUP_NAME_LEN {
            return Err(Rejection::GroupNameTooShort);
        }
        if self.groups.iter().any(|g| g.name == name) {
            return Err(Rejection::DuplicateGroupName(name.to_string()));
        }

        let group = Group::new(name.to_string());
        let id = group.id.clone();
        self.groups.push(group);
        Ok(id)
    }

    /// Removes a group; its players return to the pending pool.
    pub fn delete_group(&mut self, group_id: &str) -> Result<Group, Rejection> {
        let index = self
            .groups
            .iter()
            .position(|g| g.id == group_id)
            .ok_or_else(|| Rejection::GroupNotFound(group_id.to_string()))?;

        let group = self.groups.remove(index);
        for player in &group.players {
            self.return_to_pool(player.clone());
        }
        Ok(group)
    }

    /// Adds a user to the pending pool with a zero score.
    pub fn invite(&mut self, user_id: &str) -> Result<(), Rejection> {
        if self.is_pending(user_id) {
            return Err(Rejection::AlreadyPending);
        }
        if self.group_of(user_id).is_some() {
            return Err(Rejection::AlreadyInGroup);
        }
        if self.is_admin(user_id) {
            return Err(Rejection::AdminCannotPlay);
        }

        self.pending_users.push(Player::new(user_id));
        Ok(())
    }

    /// Moves a pending user into a group.
    pub fn assign_pending_user(&mut self, user_id: &str, group_id: &str) -> Result<(), Rejection> {
        let target = self
            .groups
            .iter()
            .position(|g| g.id == group_id)
            .ok_or_else(|| Rejection::GroupNotFound(group_id.to_string()))?;
        if self.group_of(user_id).is_some() {
            return Err(Rejection::AlreadyInGroup);
        }

        let player = self.remove_pending_user(user_id)?;
        self.groups[target].players.push(player);
        Ok(())
    }

    pub fn remove_pending_user(&mut self, user_id: &str) -> Result<Player, Rejection> {
        let index = self
            .pending_users
            .iter()
            .position(|p| p.user_id == user_id)
            .ok_or_else(|| Rejection::PendingUserNotFound(user_id.to_string()))?;
        Ok(self.pending_users.remove(index))
    }

    /// Puts a player back into the pending pool without any pending allocation.
    pub fn return_to_pool(&mut self, mut player: Player) {
        player.pending = None;
        match self
            .pending_users
            .iter_mut()
            .find(|p| p.user_id == player.user_id)
        {
            Some(existing) => *existing = player,
            None => self.pending_users.push(player),
        }
    }

    pub fn post_announcement(
        &mut self,
        by: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<(), Rejection> {
        if message.trim().is_empty() {
            return Err(Rejection::EmptyMessage);
        }
        self.announcements.push(Announcement {
            by: by.to_string(),
            message: message.to_string(),
            posted_at: now,
        });
        Ok(())
    }

    /// Deletes the announcements at the given positions, returning how many
    /// were removed. Out-of-range positions are ignored.
    pub fn delete_announcements(&mut self, positions: &[usize]) -> usize {
        let before = self.announcements.len();
        let mut index = 0;
        self.announcements.retain(|_| {
            let keep = !positions.contains(&index);
            index += 1;
            keep
        });
        before - self.announcements.len()
    }
}
