//! MongoDB User and WorldsNames repositories (whole-document upserts)

use crate::domain::model::{User, WorldHeader};
use crate::domain::repository::{Result, UserRepository, WorldNameRepository};
use crate::infrastructure::persistence::document::{UserDocument, WorldNameDocument};
use mongodb::bson::doc;
use mongodb::options::ReplaceOptions;
use mongodb::Collection;
use std::sync::Arc;
use tokio::runtime::Handle;

use super::MongoConnection;

pub struct MongoUserRepository {
    collection: Collection<UserDocument>,
    runtime: Handle,
}

impl MongoUserRepository {
    pub fn new(conn: Arc<MongoConnection>, runtime: Handle) -> Self {
        Self {
            collection: conn.users(),
            runtime,
        }
    }
}

impl UserRepository for MongoUserRepository {
    fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        let collection = self.collection.clone();
        let id = id.to_string();
        let runtime = self.runtime.clone();

        tokio::task::block_in_place(|| {
            runtime.block_on(async move {
                let doc = collection.find_one(doc! { "_id": id }).await?;
                Ok(doc.map(User::from))
            })
        })
    }

    fn save(&self, user: &User) -> Result<()> {
        let collection = self.collection.clone();
        let doc = UserDocument::from(user);
        let runtime = self.runtime.clone();

        tokio::task::block_in_place(|| {
            runtime.block_on(async move {
                let options = ReplaceOptions::builder().upsert(true).build();

                collection
                    .replace_one(doc! { "_id": &doc.id }, &doc)
                    .with_options(options)
                    .await?;

                Ok(())
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

pub struct MongoWorldNameRepository {
    collection: Collection<WorldNameDocument>,
    runtime: Handle,
}

impl MongoWorldNameRepository {
    pub fn new(conn: Arc<MongoConnection>, runtime: Handle) -> Self {
        Self {
            collection: conn.world_names(),
            runtime,
        }
    }
}

impl WorldNameRepository for MongoWorldNameRepository {
    fn find_by_id(&self, id: &str) -> Result<Option<WorldHeader>> {
        let collection = self.collection.clone();
        let id = id.to_string();
        let runtime = self.runtime.clone();

        tokio::task::block_in_place(|| {
            runtime.block_on(async move {
                let doc = collection.find_one(doc! { "_id": id }).await?;
                Ok(doc.map(WorldHeader::from))
            })
        })
    }

    fn save(&self, header: &WorldHeader) -> Result<()> {
        let collection = self.collection.clone();
        let doc = WorldNameDocument::from(header);
        let runtime = self.runtime.clone();

        tokio::task::block_in_place(|| {
            runtime.block_on(async move {
                let options = ReplaceOptions::builder().upsert(true).build();

                collection
                    .replace_one(doc! { "_id": &doc.id }, &doc)
                    .with_options(options)
                    .await?;

                Ok(())
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
