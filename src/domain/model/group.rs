use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// A player's provisional claim against a group's bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAllocation {
    pub amount: u64,
    pub group_id: String,
}

/// Score an admin has opened for time-limited distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingBank {
    pub amount: u64,
    pub expires_at: DateTime<Utc>,
}

impl PendingBank {
    pub fn new(amount: u64, expires_at: DateTime<Utc>) -> Self {
        Self { amount, expires_at }
    }

    /// A bank whose expiration lies in the past is inert.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub user_id: String,
    pub score: u64,
    pub pending: Option<PendingAllocation>,
}

impl Player {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            score: 0,
            pending: None,
        }
    }

    /// Pending amount claimed against `group_id`; allocations held for any
    /// other group count as zero.
    pub fn allocation_in(&self, group_id: &str) -> u64 {
        match &self.pending {
            Some(pending) if pending.group_id == group_id => pending.amount,
            _ => 0,
        }
    }
}

/// Group entity - a named set of players with an optional leader and bank
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub leader: Option<String>,
    pub players: Vec<Player>,
    pub bank: Option<PendingBank>,
}

impl Group {
    pub fn new(name: String) -> Self {
        Self {
            id: Ulid::new().to_string(),
            name,
            leader: None,
            players: Vec::new(),
            bank: None,
        }
    }

    pub fn player(&self, user_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.user_id == user_id)
    }

    pub fn position(&self, user_id: &str) -> Option<usize> {
        self.players.iter().position(|p| p.user_id == user_id)
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.position(user_id).is_some()
    }

    pub fn is_leader(&self, user_id: &str) -> bool {
        self.leader.as_deref() == Some(user_id)
    }

    pub fn total_score(&self) -> u64 {
        self.players.iter().map(|p| p.score).sum()
    }

    /// Sum of the allocations currently claimed against this group's bank.
    pub fn total_pending(&self) -> u64 {
        self.players.iter().map(|p| p.allocation_in(&self.id)).sum()
    }

    /// Players ordered by committed score, highest first.
    pub fn standings(&self) -> Vec<&Player> {
        let mut ranked: Vec<&Player> = self.players.iter().collect();
        ranked.sort_by(|a, b| b.score.cmp(&a.score));
        ranked
    }
}
