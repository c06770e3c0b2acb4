//! Unique indexes the application relies on from day one.

use crate::db::store::DocumentStore;
use crate::migrate::Migration;
use anyhow::Result;
use async_trait::async_trait;

pub struct InitialIndexes;

#[async_trait]
impl Migration for InitialIndexes {
    fn version(&self) -> i64 {
        1
    }

    fn name(&self) -> &'static str {
        "initial_indexes"
    }

    async fn up(&self, store: &dyn DocumentStore) -> Result<()> {
        store.ensure_unique_index("users", "email").await?;
        store.ensure_unique_index("profiles", "slug").await?;
        store.ensure_unique_index("categories", "slug").await?;
        Ok(())
    }

    async fn down(&self, store: &dyn DocumentStore) -> Result<()> {
        store.drop_unique_index("categories", "slug").await?;
        store.drop_unique_index("profiles", "slug").await?;
        store.drop_unique_index("users", "email").await?;
        Ok(())
    }
}
