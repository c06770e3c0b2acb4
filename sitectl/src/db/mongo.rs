//! MongoDB-backed [`DocumentStore`].
//!
//! This is the production driver binding. Every driver failure is translated
//! through [`DbError::from_driver`] before it leaves this module; nothing
//! above the store seam sees a `mongodb::error::Error`.

use crate::config::DatabaseConfig;
use crate::db::errors::{DbError, Result};
use crate::db::store::{DocumentStore, FindOptions};
use futures::TryStreamExt;
use mongodb::bson::{Document, doc};
use mongodb::options::ReturnDocument;
use mongodb::{Client, Collection, Database, IndexModel};
use tracing::debug;

pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Connect to the configured deployment. The client holds a long-lived
    /// connection pool shared by every store call for the process lifetime.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        // No collection is in play yet; the sentinel keeps the context field honest
        let client = Client::with_uri_str(&config.url)
            .await
            .map_err(|e| DbError::from_driver(e, "(connect)"))?;
        debug!(database = %config.name, "connected to MongoDB");
        Ok(Self {
            db: client.database(&config.name),
        })
    }

    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection::<Document>(name)
    }
}

#[async_trait::async_trait]
impl DocumentStore for MongoStore {
    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>> {
        self.collection(collection)
            .find_one(filter)
            .await
            .map_err(|e| DbError::from_driver(e, collection))
    }

    async fn find(&self, collection: &str, filter: Document, options: FindOptions) -> Result<Vec<Document>> {
        let driver_options = mongodb::options::FindOptions::builder()
            .sort(options.sort)
            .skip(options.skip)
            .limit(options.limit)
            .build();
        let cursor = self
            .collection(collection)
            .find(filter)
            .with_options(driver_options)
            .await
            .map_err(|e| DbError::from_driver(e, collection))?;
        cursor.try_collect().await.map_err(|e| DbError::from_driver(e, collection))
    }

    async fn insert_one(&self, collection: &str, mut document: Document) -> Result<Document> {
        let result = self
            .collection(collection)
            .insert_one(document.clone())
            .await
            .map_err(|e| DbError::from_driver(e, collection))?;
        if !document.contains_key("_id") {
            document.insert("_id", result.inserted_id);
        }
        Ok(document)
    }

    async fn update_one(&self, collection: &str, filter: Document, update: Document) -> Result<Option<Document>> {
        let options = mongodb::options::FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.collection(collection)
            .find_one_and_update(filter, update)
            .with_options(options)
            .await
            .map_err(|e| DbError::from_driver(e, collection))
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<bool> {
        let result = self
            .collection(collection)
            .delete_one(filter)
            .await
            .map_err(|e| DbError::from_driver(e, collection))?;
        Ok(result.deleted_count > 0)
    }

    async fn count(&self, collection: &str, filter: Document) -> Result<u64> {
        self.collection(collection)
            .count_documents(filter)
            .await
            .map_err(|e| DbError::from_driver(e, collection))
    }

    async fn ensure_unique_index(&self, collection: &str, field: &str) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { field: 1 })
            .options(mongodb::options::IndexOptions::builder().unique(true).build())
            .build();
        self.collection(collection)
            .create_index(index)
            .await
            .map_err(|e| DbError::from_driver(e, collection))?;
        Ok(())
    }

    async fn drop_unique_index(&self, collection: &str, field: &str) -> Result<()> {
        // Single-field indexes get the conventional `<field>_1` name
        self.collection(collection)
            .drop_index(format!("{field}_1"))
            .await
            .map_err(|e| DbError::from_driver(e, collection))?;
        Ok(())
    }
}
