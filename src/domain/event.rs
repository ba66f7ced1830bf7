use super::model::{User, World};
use serde::{Deserialize, Serialize};

/// Domain events that represent state changes in the system
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    /// A world document was written; carries the full new snapshot
    WorldUpdated { world: World },

    /// A world document was deleted
    WorldDeleted { world_id: String },

    /// An expired bank was committed and cleared
    BankExpired { world_id: String, group_id: String },

    /// A user document was written
    UserUpdated { user: User },
}

impl DomainEvent {
    /// Get the world ID associated with this event
    pub fn world_id(&self) -> Option<&str> {
        match self {
            Self::WorldUpdated { world } => Some(&world.id),
            Self::WorldDeleted { world_id } => Some(world_id),
            Self::BankExpired { world_id, .. } => Some(world_id),
            Self::UserUpdated { .. } => None,
        }
    }

    /// Get the event type name for log and listener routing
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::WorldUpdated { .. } => "world_updated",
            Self::WorldDeleted { .. } => "world_deleted",
            Self::BankExpired { .. } => "bank_expired",
            Self::UserUpdated { .. } => "user_updated",
        }
    }
}
