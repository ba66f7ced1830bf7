use super::DbConnection;
use crate::domain::error::DomainError;
use crate::domain::model::World;
use crate::domain::repository::{Result, WorldRepository};
use crate::infrastructure::persistence::document::WorldDocument;
use rusqlite::{params, OptionalExtension};

pub struct SqliteWorldRepository {
    conn: DbConnection,
}

impl SqliteWorldRepository {
    pub fn new(conn: DbConnection) -> Self {
        Self { conn }
    }

    fn decode(body: &str) -> Result<World> {
        let doc: WorldDocument = serde_json::from_str(body)?;
        World::try_from(doc)
    }

    fn encode(world: &World, version: u64) -> Result<String> {
        let mut doc = WorldDocument::try_from(world)?;
        doc.version = i64::try_from(version).map_err(|e| DomainError::Database(e.to_string()))?;
        Ok(serde_json::to_string(&doc)?)
    }
}

impl WorldRepository for SqliteWorldRepository {
    fn find_by_id(&self, id: &str) -> Result<Option<World>> {
        let conn = self.conn.lock().map_err(|e| DomainError::Database(e.to_string()))?;

        let body: Option<String> = conn
            .query_row("SELECT body FROM worlds WHERE id = ?", params![id], |row| row.get(0))
            .optional()?;

        body.map(|b| Self::decode(&b)).transpose()
    }

    fn find_all(&self) -> Result<Vec<World>> {
        let conn = self.conn.lock().map_err(|e| DomainError::Database(e.to_string()))?;

        let mut stmt = conn.prepare("SELECT id, body FROM worlds ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let mut worlds = Vec::new();
        for row in rows {
            let (id, body) = row?;
            match Self::decode(&body) {
                Ok(world) => worlds.push(world),
                Err(e) => tracing::warn!("Skipping unreadable world {}: {}", id, e),
            }
        }

        Ok(worlds)
    }

    fn insert(&self, world: &World) -> Result<World> {
        let conn = self.conn.lock().map_err(|e| DomainError::Database(e.to_string()))?;

        let body = Self::encode(world, 1)?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO worlds (id, version, body) VALUES (?, 1, ?)",
            params![world.id, body],
        )?;
        if inserted == 0 {
            return Err(DomainError::Validation(format!("World {} already exists", world.id)));
        }

        Ok(World {
            version: 1,
            ..world.clone()
        })
    }

    fn save(&self, world: &World) -> Result<World> {
        let conn = self.conn.lock().map_err(|e| DomainError::Database(e.to_string()))?;

        let next_version = world.version + 1;
        let body = Self::encode(world, next_version)?;
        let updated = conn.execute(
            "UPDATE worlds SET version = ?, body = ? WHERE id = ? AND version = ?",
            params![next_version as i64, body, world.id, world.version as i64],
        )?;

        if updated == 0 {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT version FROM worlds WHERE id = ?",
                    params![world.id],
                    |row| row.get(0),
                )
                .optional()?;

            return Err(match found {
                Some(found) => DomainError::StaleWrite {
                    collection: "Worlds",
                    id: world.id.clone(),
                    expected: world.version,
                    found: found.max(0) as u64,
                },
                None => DomainError::NotFound(format!("World {}", world.id)),
            });
        }

        Ok(World {
            version: next_version,
            ..world.clone()
        })
    }

    fn delete(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| DomainError::Database(e.to_string()))?;

        conn.execute("DELETE FROM worlds WHERE id = ?", params![id])?;

        Ok(())
    }
}
