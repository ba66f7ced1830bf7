mod group;
mod user;
mod world;

pub use group::{Group, PendingAllocation, PendingBank, Player};
pub use user::{normalize_email, Membership, User, WorldHeader};
pub use world::{Announcement, World, MIN_GROUP_NAME_LEN};
