//! Starter categories so a fresh site is not empty.

use crate::db::store::DocumentStore;
use crate::migrate::Migration;
use anyhow::Result;
use async_trait::async_trait;
use mongodb::bson::doc;

const STARTER_CATEGORIES: &[(&str, &str)] = &[
    ("general", "General"),
    ("projects", "Projects"),
    ("writing", "Writing"),
];

pub struct SeedCategories;

#[async_trait]
impl Migration for SeedCategories {
    fn version(&self) -> i64 {
        2
    }

    fn name(&self) -> &'static str {
        "seed_categories"
    }

    async fn up(&self, store: &dyn DocumentStore) -> Result<()> {
        for (slug, title) in STARTER_CATEGORIES {
            // Skip rather than fail if an operator already created one
            let existing = store.find_one("categories", doc! { "slug": *slug }).await?;
            if existing.is_none() {
                store
                    .insert_one("categories", doc! { "slug": *slug, "title": *title, "builtin": true })
                    .await?;
            }
        }
        Ok(())
    }

    async fn down(&self, store: &dyn DocumentStore) -> Result<()> {
        for (slug, _) in STARTER_CATEGORIES {
            // Only remove the seeded rows, and only if still present
            store.delete_one("categories", doc! { "slug": *slug, "builtin": true }).await?;
        }
        Ok(())
    }
}
