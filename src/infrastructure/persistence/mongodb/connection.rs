//! MongoDB client setup and typed access to the three collections.

use crate::infrastructure::config::MongoDbConfig;
use crate::infrastructure::persistence::document::{UserDocument, WorldDocument, WorldNameDocument};
use mongodb::bson::doc;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use std::sync::Arc;
use std::time::Duration;

use super::{USERS, WORLDS, WORLDS_NAMES};

/// Applies to the initial connect and to server selection.
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(3);

pub struct MongoConnection {
    database: Database,
}

impl MongoConnection {
    /// Connects and pings the server so a bad URI fails at startup rather
    /// than on the first write.
    pub async fn connect(config: &MongoDbConfig) -> anyhow::Result<Self> {
        let mut options = ClientOptions::parse(&config.uri).await?;
        options.connect_timeout = Some(CONNECTION_TIMEOUT);
        options.server_selection_timeout = Some(CONNECTION_TIMEOUT);
        options.app_name = Some("scoreworld".to_string());

        let database = Client::with_options(options)?.database(&config.database);
        database.run_command(doc! { "ping": 1 }).await?;

        tracing::info!("Connected to MongoDB database {}", config.database);
        Ok(Self { database })
    }

    pub fn worlds(&self) -> Collection<WorldDocument> {
        self.database.collection(WORLDS)
    }

    pub fn users(&self) -> Collection<UserDocument> {
        self.database.collection(USERS)
    }

    pub fn world_names(&self) -> Collection<WorldNameDocument> {
        self.database.collection(WORLDS_NAMES)
    }
}

pub async fn init_mongodb(config: &MongoDbConfig) -> anyhow::Result<Arc<MongoConnection>> {
    Ok(Arc::new(MongoConnection::connect(config).await?))
}
