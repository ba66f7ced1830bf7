use crate::domain::error::DomainError;
use crate::domain::model::{User, World, WorldHeader};
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, DomainError>;

/// Repository trait for World documents.
///
/// Worlds are versioned: `save` only replaces the stored document when its
/// version still equals the snapshot's `version`, and fails with
/// [`DomainError::StaleWrite`] otherwise.
pub trait WorldRepository: Send + Sync {
    fn find_by_id(&self, id: &str) -> Result<Option<World>>;
    /// Every readable world. Documents that fail to convert are logged and
    /// left out so one bad world cannot hide the others.
    fn find_all(&self) -> Result<Vec<World>>;
    /// Stores a new world at version 1 and returns the stored snapshot.
    fn insert(&self, world: &World) -> Result<World>;
    /// Replaces the stored world and returns it with its bumped version.
    fn save(&self, world: &World) -> Result<World>;
    fn delete(&self, id: &str) -> Result<()>;
}

/// Repository trait for User documents (last write wins)
pub trait UserRepository: Send + Sync {
    fn find_by_id(&self, id: &str) -> Result<Option<User>>;
    fn save(&self, user: &User) -> Result<()>;
    fn delete(&self, id: &str) -> Result<()>;
}

/// Repository trait for world headers (last write wins)
pub trait WorldNameRepository: Send + Sync {
    fn find_by_id(&self, id: &str) -> Result<Option<WorldHeader>>;
    fn save(&self, header: &WorldHeader) -> Result<()>;
    fn delete(&self, id: &str) -> Result<()>;
}

// Implement WorldRepository for Arc<dyn WorldRepository> to allow dynamic dispatch
impl WorldRepository for Arc<dyn WorldRepository> {
    fn find_by_id(&self, id: &str) -> Result<Option<World>> {
        (**self).find_by_id(id)
    }

    fn find_all(&self) -> Result<Vec<World>> {
        (**self).find_all()
    }

    fn insert(&self, world: &World) -> Result<World> {
        (**self).insert(world)
    }

    fn save(&self, world: &World) -> Result<World> {
        (**self).save(world)
    }

    fn delete(&self, id: &str) -> Result<()> {
        (**self).delete(id)
    }
}

impl UserRepository for Arc<dyn UserRepository> {
    fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        (**self).find_by_id(id)
    }

    fn save(&self, user: &User) -> Result<()> {
        (**self).save(user)
    }

    fn delete(&self, id: &str) -> Result<()> {
        (**self).delete(id)
    }
}

impl WorldNameRepository for Arc<dyn WorldNameRepository> {
    fn find_by_id(&self, id: &str) -> Result<Option<WorldHeader>> {
        (**self).find_by_id(id)
    }

    fn save(&self, header: &WorldHeader) -> Result<()> {
        (**self).save(header)
    }

    fn delete(&self, id: &str) -> Result<()> {
        (**self).delete(id)
    }
}
