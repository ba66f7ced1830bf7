//! MongoDB World Repository implementation
//!
//! Worlds are stored with `_id` as primary key and an integer `version`
//! field; replacements filter on both so a concurrent writer is detected
//! instead of silently overwritten.

use crate::domain::error::DomainError;
use crate::domain::model::World;
use crate::domain::repository::{Result, WorldRepository};
use crate::infrastructure::persistence::document::WorldDocument;
use mongodb::bson::{doc, Document};
use mongodb::options::FindOptions;
use mongodb::Collection;
use std::sync::Arc;
use tokio::runtime::Handle;

use super::{MongoConnection, WORLDS};

pub struct MongoWorldRepository {
    collection: Collection<WorldDocument>,
    /// Tokio runtime handle captured at creation time.
    /// This allows sync methods to block on async operations
    /// even when called from non-Tokio threads.
    runtime: Handle,
}

impl MongoWorldRepository {
    pub fn new(conn: Arc<MongoConnection>, runtime: Handle) -> Self {
        Self {
            collection: conn.worlds(),
            runtime,
        }
    }
}

impl WorldRepository for MongoWorldRepository {
    fn find_by_id(&self, id: &str) -> Result<Option<World>> {
        let collection = self.collection.clone();
        let id = id.to_string();
        let runtime = self.runtime.clone();

        // block_in_place keeps block_on from deadlocking inside the runtime.
        tokio::task::block_in_place(|| {
            runtime.block_on(async move {
                let doc = collection.find_one(doc! { "_id": id }).await?;
                doc.map(World::try_from).transpose()
            })
        })
    }

    fn find_all(&self) -> Result<Vec<World>> {
        // Raw documents, so a single undecodable world does not fail the cursor.
        let collection = self.collection.clone_with_type::<Document>();
        let runtime = self.runtime.clone();

        tokio::task::block_in_place(|| {
            runtime.block_on(async move {
                use futures::TryStreamExt;

                let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();

                let cursor = collection.find(doc! {}).with_options(options).await?;
                let raw: Vec<Document> = cursor.try_collect().await?;

                let mut worlds = Vec::with_capacity(raw.len());
                for doc in raw {
                    let id = doc.get_str("_id").unwrap_or("?").to_string();
                    let world = mongodb::bson::from_document::<WorldDocument>(doc)
                        .map_err(|e| DomainError::MalformedDocument(format!("{}: {}", id, e)))
                        .and_then(World::try_from);
                    match world {
                        Ok(world) => worlds.push(world),
                        Err(e) => tracing::warn!("Skipping unreadable world {}: {}", id, e),
                    }
                }
                Ok(worlds)
            })
        })
    }

    fn insert(&self, world: &World) -> Result<World> {
        let collection = self.collection.clone();
        let stored = World {
            version: 1,
            ..world.clone()
        };
        let doc = WorldDocument::try_from(&stored)?;
        let runtime = self.runtime.clone();

        tokio::task::block_in_place(|| {
            runtime.block_on(async move {
                collection.insert_one(&doc).await?;
                Ok(stored)
            })
        })
    }

    fn save(&self, world: &World) -> Result<World> {
        let collection = self.collection.clone();
        let expected = world.version;
        let stored = World {
            version: expected + 1,
            ..world.clone()
        };
        let doc = WorldDocument::try_from(&stored)?;
        let runtime = self.runtime.clone();

        tokio::task::block_in_place(|| {
            runtime.block_on(async move {
                let result = collection
                    .replace_one(doc! { "_id": &doc.id, "version": expected as i64 }, &doc)
                    .await?;

                if result.matched_count == 0 {
                    let current = collection.find_one(doc! { "_id": &doc.id }).await?;
                    return Err(match current {
                        Some(current) => DomainError::StaleWrite {
                            collection: WORLDS,
                            id: doc.id.clone(),
                            expected,
                            found: current.version.max(0) as u64,
                        },
                        None => DomainError::NotFound(format!("World {}", doc.id)),
                    });
                }

                Ok(stored)
            })
        })
    }

    fn delete(&self, id: &str) -> Result<()> {
        let collection = self.collection.clone();
        let id = id.to_string();
        let runtime = self.runtime.clone();

        tokio::task::block_in_place(|| {
            runtime.block_on(async move {
                collection.delete_one(doc! { "_id": id }).await?;
                Ok(())
            })
        })
    }
}
