//! Stored document shapes and their conversion into domain entities.
//!
//! Documents keep the store's field names (`docRef`, `scoreInBank`,
//! `pendingScoreGroup`, ...) and loose types. Converting a document into a
//! domain entity validates it: negative numbers, duplicate ids and dangling
//! leaders are rejected as malformed, while pending allocations that point
//! at another group are dropped.

use crate::domain::error::DomainError;
use crate::domain::model::{
    Announcement, Group, Membership, PendingAllocation, PendingBank, Player, User, World,
    WorldHeader,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub admins: Vec<String>,
    #[serde(default)]
    pub announcements: Vec<AnnouncementDocument>,
    #[serde(default)]
    pub groups: Vec<GroupDocument>,
    #[serde(default)]
    pub pending_users: Vec<PlayerDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDocument {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leader: Option<LeaderDocument>,
    #[serde(default)]
    pub players: Vec<PlayerDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_in_bank: Option<BankDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderDocument {
    pub doc_ref: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDocument {
    pub doc_ref: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_score_group: Option<PendingScoreDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingScoreDocument {
    pub score: i64,
    pub group_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankDocument {
    pub score: i64,
    pub expiration_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnouncementDocument {
    pub by: String,
    pub message: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub worlds: Vec<MembershipDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_world_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipDocument {
    pub small_data: String,
    pub big_data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldNameDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

fn non_negative(value: i64, what: &str, doc_id: &str) -> Result<u64, DomainError> {
    u64::try_from(value)
        .map_err(|_| DomainError::MalformedDocument(format!("{}: negative {} {}", doc_id, what, value)))
}

fn to_i64(value: u64, what: &str, doc_id: &str) -> Result<i64, DomainError> {
    i64::try_from(value).map_err(|_| {
        DomainError::Validation(format!("{}: {} {} exceeds the storable range", doc_id, what, value))
    })
}

impl PlayerDocument {
    fn into_player(self, world_id: &str, group_id: Option<&str>) -> Result<Player, DomainError> {
        let score = non_negative(self.score, "score", world_id)?;
        let pending = match (self.pending_score_group, group_id) {
            (Some(pending), Some(group_id)) if pending.group_id == group_id => Some(PendingAllocation {
                amount: non_negative(pending.score, "pending score", world_id)?,
                group_id: pending.group_id,
            }),
            (Some(pending), _) => {
                tracing::debug!(
                    "Dropping stale pending score of {} for group {} in world {}",
                    self.doc_ref,
                    pending.group_id,
                    world_id
                );
                None
            }
            (None, _) => None,
        };

        Ok(Player {
            user_id: self.doc_ref,
            score,
            pending,
        })
    }
}

impl PlayerDocument {
    fn from_player(player: &Player, world_id: &str) -> Result<Self, DomainError> {
        let pending_score_group = match &player.pending {
            Some(p) => Some(PendingScoreDocument {
                score: to_i64(p.amount, "pending score", world_id)?,
                group_id: p.group_id.clone(),
            }),
            None => None,
        };

        Ok(Self {
            doc_ref: player.user_id.clone(),
            score: to_i64(player.score, "score", world_id)?,
            pending_score_group,
        })
    }
}

impl GroupDocument {
    fn into_group(self, world_id: &str) -> Result<Group, DomainError> {
        let group_id = self.id;
        let mut seen = HashSet::new();
        let mut players = Vec::with_capacity(self.players.len());
        for doc in self.players {
            if !seen.insert(doc.doc_ref.clone()) {
                return Err(DomainError::MalformedDocument(format!(
                    "{}: player {} listed twice in group {}",
                    world_id, doc.doc_ref, group_id
                )));
            }
            players.push(doc.into_player(world_id, Some(&group_id))?);
        }

        let leader = self.leader.map(|l| l.doc_ref);
        if let Some(leader) = &leader {
            if !seen.contains(leader) {
                return Err(DomainError::MalformedDocument(format!(
                    "{}: leader {} is not a player of group {}",
                    world_id, leader, group_id
                )));
            }
        }

        let bank = match self.score_in_bank {
            Some(bank) => Some(PendingBank::new(
                non_negative(bank.score, "bank score", world_id)?,
                bank.expiration_date,
            )),
            None => None,
        };

        Ok(Group {
            id: group_id,
            name: self.name,
            leader,
            players,
            bank,
        })
    }
}

impl GroupDocument {
    fn from_group(group: &Group, world_id: &str) -> Result<Self, DomainError> {
        let score_in_bank = match &group.bank {
            Some(b) => Some(BankDocument {
                score: to_i64(b.amount, "bank score", world_id)?,
                expiration_date: b.expires_at,
            }),
            None => None,
        };

        Ok(Self {
            id: group.id.clone(),
            name: group.name.clone(),
            leader: group.leader.as_ref().map(|id| LeaderDocument { doc_ref: id.clone() }),
            players: group
                .players
                .iter()
                .map(|p| PlayerDocument::from_player(p, world_id))
                .collect::<Result<Vec<_>, DomainError>>()?,
            score_in_bank,
        })
    }
}

impl TryFrom<WorldDocument> for World {
    type Error = DomainError;

    fn try_from(doc: WorldDocument) -> Result<Self, Self::Error> {
        let id = doc.id;
        let version = non_negative(doc.version, "version", &id)?;

        let mut group_ids = HashSet::new();
        let mut groups = Vec::with_capacity(doc.groups.len());
        for group in doc.groups {
            if !group_ids.insert(group.id.clone()) {
                return Err(DomainError::MalformedDocument(format!(
                    "{}: duplicate group id {}",
                    id, group.id
                )));
            }
            groups.push(group.into_group(&id)?);
        }

        let pending_users = doc
            .pending_users
            .into_iter()
            .map(|p| p.into_player(&id, None))
            .collect::<Result<Vec<_>, _>>()?;

        let announcements = doc
            .announcements
            .into_iter()
            .map(|a| Announcement {
                by: a.by,
                message: a.message,
                posted_at: a.date,
            })
            .collect();

        Ok(World {
            id,
            version,
            admins: doc.admins,
            announcements,
            groups,
            pending_users,
        })
    }
}

/// Fails when a number does not fit the store's signed 64-bit fields.
impl TryFrom<&World> for WorldDocument {
    type Error = DomainError;

    fn try_from(world: &World) -> Result<Self, Self::Error> {
        let id = world.id.as_str();
        Ok(Self {
            id: world.id.clone(),
            version: to_i64(world.version, "version", id)?,
            admins: world.admins.clone(),
            announcements: world
                .announcements
                .iter()
                .map(|a| AnnouncementDocument {
                    by: a.by.clone(),
                    message: a.message.clone(),
                    date: a.posted_at,
                })
                .collect(),
            groups: world
                .groups
                .iter()
                .map(|g| GroupDocument::from_group(g, id))
                .collect::<Result<Vec<_>, DomainError>>()?,
            pending_users: world
                .pending_users
                .iter()
                .map(|p| PlayerDocument::from_player(p, id))
                .collect::<Result<Vec<_>, DomainError>>()?,
        })
    }
}

impl From<UserDocument> for User {
    fn from(doc: UserDocument) -> Self {
        Self {
            id: doc.id,
            name: doc.name,
            worlds: doc
                .worlds
                .into_iter()
                .map(|m| Membership {
                    header_id: m.small_data,
                    world_id: m.big_data,
                })
                .collect(),
            current_world: doc.current_world_ref,
            image: doc.image,
        }
    }
}

impl From<&User> for UserDocument {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            worlds: user
                .worlds
                .iter()
                .map(|m| MembershipDocument {
                    small_data: m.header_id.clone(),
                    big_data: m.world_id.clone(),
                })
                .collect(),
            current_world_ref: user.current_world.clone(),
            image: user.image.clone(),
        }
    }
}

impl From<WorldNameDocument> for WorldHeader {
    fn from(doc: WorldNameDocument) -> Self {
        Self {
            id: doc.id,
            name: doc.name,
            image: doc.image,
        }
    }
}

impl From<&WorldHeader> for WorldNameDocument {
    fn from(header: &WorldHeader) -> Self {
        Self {
            id: header.id.clone(),
            name: header.name.clone(),
            image: header.image.clone(),
        }
    }
}
