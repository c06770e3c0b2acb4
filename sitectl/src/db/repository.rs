//! Generic typed repository over a [`DocumentStore`].
//!
//! One `Repository<T>` per collection/entity pair is the entire data-access
//! surface the domain modules (profiles, categories, users) consume. The
//! repository owns the contract-level semantics the store deliberately does
//! not: raising [`DbError::NotFound`] where a match was required, normalizing
//! plain field-map updates into `$set` form, and round-tripping entities
//! through BSON.

use crate::db::errors::{DbError, Result};
use crate::db::store::{DocumentStore, FindOptions, normalize_update};
use mongodb::bson::{self, Document};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;

pub struct Repository<T> {
    store: Arc<dyn DocumentStore>,
    collection: String,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            collection: self.collection.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T> Repository<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            _entity: PhantomData,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Find the first document matching `filter`; fails with `NotFound` if
    /// nothing matches.
    pub async fn find_one(&self, filter: Document) -> Result<T> {
        self.find_one_optional(filter.clone()).await?.ok_or_else(|| DbError::NotFound {
            collection: self.collection.clone(),
            filter: filter.to_string(),
        })
    }

    /// Like [`find_one`](Self::find_one) but absence is a `None`, never an error.
    pub async fn find_one_optional(&self, filter: Document) -> Result<Option<T>> {
        match self.store.find_one(&self.collection, filter).await? {
            Some(document) => Ok(Some(self.decode(document)?)),
            None => Ok(None),
        }
    }

    /// Find all matches as a materialized, ordered sequence.
    pub async fn find(&self, filter: Document, options: FindOptions) -> Result<Vec<T>> {
        self.store
            .find(&self.collection, filter, options)
            .await?
            .into_iter()
            .map(|document| self.decode(document))
            .collect()
    }

    /// Insert an entity, returning it with its generated identifier; fails
    /// with `Duplicate` if a unique index is violated.
    pub async fn insert_one(&self, entity: &T) -> Result<T> {
        let document = self.encode(entity)?;
        let inserted = self.store.insert_one(&self.collection, document).await?;
        self.decode(inserted)
    }

    /// Update the first match and return the updated entity.
    ///
    /// `update` may be operator-style (`{"$set": {...}}`) or a plain field
    /// map; a plain map sets exactly those fields and never replaces the
    /// whole document. Fails with `NotFound` if the filter matches nothing.
    pub async fn update_one(&self, filter: Document, update: Document) -> Result<T> {
        let update = normalize_update(update);
        match self.store.update_one(&self.collection, filter.clone(), update).await? {
            Some(document) => self.decode(document),
            None => Err(DbError::NotFound {
                collection: self.collection.clone(),
                filter: filter.to_string(),
            }),
        }
    }

    /// Delete the first match; fails with `NotFound` if the filter matches
    /// nothing, returns `true` otherwise.
    pub async fn delete_one(&self, filter: Document) -> Result<bool> {
        if self.store.delete_one(&self.collection, filter.clone()).await? {
            Ok(true)
        } else {
            Err(DbError::NotFound {
                collection: self.collection.clone(),
                filter: filter.to_string(),
            })
        }
    }

    /// Count matching documents; zero is a valid result, never `NotFound`.
    pub async fn count(&self, filter: Document) -> Result<u64> {
        self.store.count(&self.collection, filter).await
    }

    fn encode(&self, entity: &T) -> Result<Document> {
        bson::to_document(entity)
            .map_err(|e| DbError::Other(anyhow::Error::new(e).context(format!("failed to encode entity for '{}'", self.collection))))
    }

    fn decode(&self, document: Document) -> Result<T> {
        bson::from_document(document)
            .map_err(|e| DbError::Other(anyhow::Error::new(e).context(format!("failed to decode document from '{}'", self.collection))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use mongodb::bson::{doc, oid::ObjectId};
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Profile {
        #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
        id: Option<ObjectId>,
        slug: String,
        bio: String,
        views: i64,
    }

    fn profile(slug: &str, bio: &str) -> Profile {
        Profile {
            id: None,
            slug: slug.to_string(),
            bio: bio.to_string(),
            views: 0,
        }
    }

    fn repository() -> Repository<Profile> {
        Repository::new(Arc::new(MemoryStore::new()), "profiles")
    }

    #[test_log::test(tokio::test)]
    async fn insert_returns_entity_with_generated_id() {
        let repo = repository();
        let created = repo.insert_one(&profile("ada", "mathematician")).await.unwrap();
        assert!(created.id.is_some());
        assert_eq!(created.slug, "ada");
    }

    #[test_log::test(tokio::test)]
    async fn find_one_raises_not_found_but_optional_does_not() {
        let repo = repository();

        let err = repo.find_one(doc! { "slug": "missing" }).await.unwrap_err();
        match &err {
            DbError::NotFound { collection, filter } => {
                assert_eq!(collection, "profiles");
                assert!(filter.contains("missing"));
            }
            other => panic!("expected NotFound, got {other:?}"),
        }

        let found = repo.find_one_optional(doc! { "slug": "missing" }).await.unwrap();
        assert!(found.is_none());
    }

    #[test_log::test(tokio::test)]
    async fn plain_field_map_update_equals_explicit_set() {
        let repo = repository();
        repo.insert_one(&profile("ada", "old")).await.unwrap();
        repo.insert_one(&profile("alan", "old")).await.unwrap();

        let via_map = repo.update_one(doc! { "slug": "ada" }, doc! { "bio": "new" }).await.unwrap();
        let via_set = repo
            .update_one(doc! { "slug": "alan" }, doc! { "$set": { "bio": "new" } })
            .await
            .unwrap();

        assert_eq!(via_map.bio, "new");
        assert_eq!(via_set.bio, "new");
        // A plain map must not replace the document wholesale
        assert_eq!(via_map.slug, "ada");
        assert_eq!(via_map.views, 0);
    }

    #[test_log::test(tokio::test)]
    async fn update_one_raises_not_found_when_filter_misses() {
        let repo = repository();
        let err = repo.update_one(doc! { "slug": "missing" }, doc! { "bio": "x" }).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[test_log::test(tokio::test)]
    async fn duplicate_insert_carries_collection_and_field() {
        let store = Arc::new(MemoryStore::new());
        store.ensure_unique_index("profiles", "slug").await.unwrap();
        let repo: Repository<Profile> = Repository::new(store, "profiles");

        repo.insert_one(&profile("ada", "first")).await.unwrap();
        let err = repo.insert_one(&profile("ada", "second")).await.unwrap_err();
        match err {
            DbError::Duplicate { collection, field, value } => {
                assert_eq!(collection, "profiles");
                assert_eq!(field, "slug");
                assert_eq!(value, "ada");
            }
            other => panic!("expected Duplicate, got {other:?}"),
        }
    }

    #[test_log::test(tokio::test)]
    async fn delete_one_raises_not_found_on_miss_and_true_on_hit() {
        let repo = repository();
        repo.insert_one(&profile("ada", "bio")).await.unwrap();

        assert!(repo.delete_one(doc! { "slug": "ada" }).await.unwrap());
        let err = repo.delete_one(doc! { "slug": "ada" }).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[test_log::test(tokio::test)]
    async fn count_of_zero_is_not_an_error() {
        let repo = repository();
        assert_eq!(repo.count(doc! { "slug": "missing" }).await.unwrap(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn find_returns_ordered_page() {
        let repo = repository();
        for (slug, views) in [("a", 3), ("b", 1), ("c", 2)] {
            let mut p = profile(slug, "bio");
            p.views = views;
            repo.insert_one(&p).await.unwrap();
        }

        let options = FindOptions {
            sort: Some(doc! { "views": -1 }),
            skip: None,
            limit: Some(2),
        };
        let top = repo.find(doc! {}, options).await.unwrap();
        let slugs: Vec<&str> = top.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["a", "c"]);
    }
}
