pub mod application;
pub mod domain;
pub mod infrastructure;

use application::eventbus::create_event_bus;
use application::service::run_expiry_sweeper;
use application::state::{AppState, DynUserRepository, DynWorldNameRepository, DynWorldRepository};
use infrastructure::config::{self, AppConfig, StorageType};
use infrastructure::logging;
use infrastructure::persistence;
use std::sync::Arc;
use tokio::sync::watch;

/// Storage backend holder
struct StorageBackend {
    worlds: DynWorldRepository,
    users: DynUserRepository,
    names: DynWorldNameRepository,
}

/// Initialize storage based on configuration
async fn init_storage(app_config: &AppConfig) -> anyhow::Result<StorageBackend> {
    match app_config.storage.storage_type {
        StorageType::Sqlite => {
            tracing::info!("Using SQLite storage backend");
            let db = persistence::sqlite::init_database(&app_config.storage.sqlite.effective_path())?;

            use persistence::sqlite::{SqliteUserRepository, SqliteWorldNameRepository, SqliteWorldRepository};

            Ok(StorageBackend {
                worlds: Arc::new(SqliteWorldRepository::new(db.clone())),
                users: Arc::new(SqliteUserRepository::new(db.clone())),
                names: Arc::new(SqliteWorldNameRepository::new(db)),
            })
        }
        StorageType::Mongodb => {
            tracing::info!("Using MongoDB storage backend");

            let conn = persistence::mongodb::init_mongodb(&app_config.storage.mongodb).await?;
            let runtime = tokio::runtime::Handle::current();

            use persistence::mongodb::{MongoUserRepository, MongoWorldNameRepository, MongoWorldRepository};

            Ok(StorageBackend {
                worlds: Arc::new(MongoWorldRepository::new(conn.clone(), runtime.clone())),
                users: Arc::new(MongoUserRepository::new(conn.clone(), runtime.clone())),
                names: Arc::new(MongoWorldNameRepository::new(conn, runtime)),
            })
        }
    }
}

/// Runs the bank expiry daemon until Ctrl-C.
pub fn run() -> anyhow::Result<()> {
    logging::setup(!cfg!(debug_assertions));

    let app_config = config::load();

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;

    runtime.block_on(async {
        let storage = init_storage(&app_config).await?;
        let state = Arc::new(AppState::new(
            storage.worlds,
            storage.users,
            storage.names,
            create_event_bus(),
            &app_config,
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sweeper = tokio::spawn(run_expiry_sweeper(
            Arc::clone(&state.group_service),
            state.sweep_interval(),
            shutdown_rx,
        ));

        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown requested");
        let _ = shutdown_tx.send(true);
        sweeper.await?;

        tracing::info!("Application shutdown complete");
        Ok::<_, anyhow::Error>(())
    })
}
