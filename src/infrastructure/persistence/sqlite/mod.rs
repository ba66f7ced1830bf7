mod user_repo;
mod world_repo;

pub use user_repo::{SqliteUserRepository, SqliteWorldNameRepository};
pub use world_repo::SqliteWorldRepository;

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub type DbConnection = Arc<Mutex<Connection>>;

/// Initialize the SQLite database at `db_path`
pub fn init_database(db_path: &Path) -> anyhow::Result<DbConnection> {
    // Ensure directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!("Initializing database at {:?}", db_path);

    let conn = Connection::open(db_path)?;
    create_tables(&conn)?;

    tracing::info!("Database initialized successfully");

    Ok(Arc::new(Mutex::new(conn)))
}

/// Open a private in-memory database with the schema applied
pub fn open_in_memory() -> anyhow::Result<DbConnection> {
    let conn = Connection::open_in_memory()?;
    create_tables(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

fn create_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS worlds (
            id TEXT PRIMARY KEY,
            version INTEGER NOT NULL,
            body TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            body TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS world_names (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            image TEXT
        )",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_database_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.db");

        let conn = init_database(&path).unwrap();
        assert!(path.exists());

        // Re-running the schema is harmless
        let conn = conn.lock().unwrap();
        create_tables(&conn).unwrap();
    }
}
