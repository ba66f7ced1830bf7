use chrono::{DateTime, Utc};
use thiserror::Error;

/// Why a domain operation refused to run.
///
/// Every reconciler and world operation reports its failed precondition
/// through this type instead of silently doing nothing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("Invalid amount: {0:?}")]
    InvalidAmount(String),

    #[error("Invalid score: {0:?}")]
    InvalidScore(String),

    #[error("Expiration date must be in the future")]
    InvalidExpiration,

    #[error("Group has no open bank")]
    NoOpenBank,

    #[error("Bank expired at {0}")]
    BankExpired(DateTime<Utc>),

    #[error("Bank is exhausted")]
    BankExhausted,

    #[error("Bank holds {available}, cannot allocate {requested} more")]
    InsufficientBank { available: u64, requested: u64 },

    #[error("Adding {delta} to {current} exceeds the largest storable amount")]
    AmountOverflow { current: u64, delta: u64 },

    #[error("Pending allocation is already {0}")]
    Unchanged(u64),

    #[error("Player not found: {0}")]
    PlayerNotFound(String),

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Pending user not found: {0}")]
    PendingUserNotFound(String),

    #[error("Group name is too short")]
    GroupNameTooShort,

    #[error("Group name already exists: {0}")]
    DuplicateGroupName(String),

    #[error("World name is empty")]
    EmptyWorldName,

    #[error("World name already exists: {0}")]
    DuplicateWorldName(String),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Pending user already exists")]
    AlreadyPending,

    #[error("Player already exists in one of the groups")]
    AlreadyInGroup,

    #[error("Admins can't be in any group")]
    AdminCannotPlay,

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Not a member of world {0}")]
    NotAMember(String),

    #[error("{actor} is not permitted to {action}")]
    NotPermitted { actor: String, action: &'static str },
}

/// Coarse classification of a [`Rejection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// Malformed user input. Surfaced to the user as a transient notice.
    Validation,
    /// The current state does not allow the operation.
    Precondition,
}

impl Rejection {
    pub fn kind(&self) -> RejectionKind {
        match self {
            Self::InvalidAmount(_)
            | Self::InvalidScore(_)
            | Self::InvalidExpiration
            | Self::GroupNameTooShort
            | Self::DuplicateGroupName(_)
            | Self::EmptyWorldName
            | Self::DuplicateWorldName(_)
            | Self::InvalidEmail(_)
            | Self::AlreadyPending
            | Self::AlreadyInGroup
            | Self::AdminCannotPlay
            | Self::EmptyMessage => RejectionKind::Validation,
            _ => RejectionKind::Precondition,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == RejectionKind::Validation
    }
}

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error("Stale write to {collection}/{id}: expected version {expected}, found {found}")]
    StaleWrite {
        collection: &'static str,
        id: String,
        expected: u64,
        found: u64,
    },

    #[error("Malformed document {0}")]
    MalformedDocument(String),
}

impl DomainError {
    /// Returns the rejection if this error wraps one.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }

    pub fn is_stale_write(&self) -> bool {
        matches!(self, Self::StaleWrite { .. })
    }
}

impl From<rusqlite::Error> for DomainError {
    fn from(err: rusqlite::Error) -> Self {
        DomainError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Database(err.to_string())
    }
}

impl From<mongodb::error::Error> for DomainError {
    fn from(err: mongodb::error::Error) -> Self {
        DomainError::Database(err.to_string())
    }
}
