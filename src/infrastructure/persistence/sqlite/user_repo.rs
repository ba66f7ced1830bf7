use super::DbConnection;
use crate::domain::error::DomainError;
use crate::domain::model::{User, WorldHeader};
use crate::domain::repository::{Result, UserRepository, WorldNameRepository};
use crate::infrastructure::persistence::document::UserDocument;
use rusqlite::{params, OptionalExtension};

pub struct SqliteUserRepository {
    conn: DbConnection,
}

impl SqliteUserRepository {
    pub fn new(conn: DbConnection) -> Self {
        Self { conn }
    }
}

impl UserRepository for SqliteUserRepository {
    fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().map_err(|e| DomainError::Database(e.to_string()))?;

        let body: Option<String> = conn
            .query_row("SELECT body FROM users WHERE id = ?", params![id], |row| row.get(0))
            .optional()?;

        match body {
            Some(body) => {
                let doc: UserDocument = serde_json::from_str(&body)?;
                Ok(Some(User::from(doc)))
            }
            None => Ok(None),
        }
    }

    fn save(&self, user: &User) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| DomainError::Database(e.to_string()))?;

        let body = serde_json::to_string(&UserDocument::from(user))?;
        conn.execute(
            "INSERT OR REPLACE INTO users (id, body) VALUES (?, ?)",
            params![user.id, body],
        )?;

        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| DomainError::Database(e.to_string()))?;

        conn.execute("DELETE FROM users WHERE id = ?", params![id])?;

        Ok(())
    }
}

pub struct SqliteWorldNameRepository {
    conn: DbConnection,
}

impl SqliteWorldNameRepository {
    pub fn new(conn: DbConnection) -> Self {
        Self { conn }
    }
}

impl WorldNameRepository for SqliteWorldNameRepository {
    fn find_by_id(&self, id: &str) -> Result<Option<WorldHeader>> {
        let conn = self.conn.lock().map_err(|e| DomainError::Database(e.to_string()))?;

        let header = conn
            .query_row(
                "SELECT id, name, image FROM world_names WHERE id = ?",
                params![id],
                |row| {
                    Ok(WorldHeader {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        image: row.get(2)?,
                    })
                },
            )
            .optional()?;

        Ok(header)
    }

    fn save(&self, header: &WorldHeader) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| DomainError::Database(e.to_string()))?;

        conn.execute(
            "INSERT OR REPLACE INTO world_names (id, name, image) VALUES (?, ?, ?)",
            params![header.id, header.name, header.image],
        )?;

        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| DomainError::Database(e.to_string()))?;

        conn.execute("DELETE FROM world_names WHERE id = ?", params![id])?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Membership;
    use crate::infrastructure::persistence::sqlite::open_in_memory;

    #[test]
    fn test_user_upsert() {
        let repo = SqliteUserRepository::new(open_in_memory().unwrap());
        let mut user = User::new("a@x.io".into(), "a".into());
        repo.save(&user).unwrap();

        user.join(Membership {
            header_id: "h1".into(),
            world_id: "w1".into(),
        });
        repo.save(&user).unwrap();

        assert_eq!(repo.find_by_id("a@x.io").unwrap(), Some(user));
        repo.delete("a@x.io").unwrap();
        assert_eq!(repo.find_by_id("a@x.io").unwrap(), None);
    }

    #[test]
    fn test_world_name_upsert() {
        let repo = SqliteWorldNameRepository::new(open_in_memory().unwrap());
        let mut header = WorldHeader::new("League".into());
        repo.save(&header).unwrap();

        header.image = Some("league.png".into());
        repo.save(&header).unwrap();

        assert_eq!(repo.find_by_id(&header.id).unwrap(), Some(header));
    }
}
