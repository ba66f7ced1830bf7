//! MongoDB persistence implementation

mod connection;
mod user_repo;
mod world_repo;

pub use connection::{init_mongodb, MongoConnection};
pub use user_repo::{MongoUserRepository, MongoWorldNameRepository};
pub use world_repo::MongoWorldRepository;

/// Collection names shared with the other clients of the store.
pub const WORLDS: &str = "Worlds";
pub const USERS: &str = "Users";
pub const WORLDS_NAMES: &str = "WorldsNames";
