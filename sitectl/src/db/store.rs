//! Driver seam for document persistence.
//!
//! [`DocumentStore`] is the narrow contract everything above the driver is
//! written against: the repository, the migration runner, and the migration
//! scripts themselves. Two implementations exist - [`crate::db::mongo::MongoStore`]
//! for real deployments and [`crate::db::memory::MemoryStore`] for development
//! and tests.

use crate::db::errors::Result;
use mongodb::bson::{Document, doc};

/// Options for multi-document reads. All fields optional; `sort` is a
/// `{field: 1 | -1}` document in driver convention.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
}

impl FindOptions {
    /// Ascending single-field sort, the common case
    pub fn sorted_by(field: &str) -> Self {
        Self {
            sort: Some(doc! { field: 1 }),
            ..Default::default()
        }
    }
}

/// Low-level document persistence operations over named collections.
///
/// Implementations translate their native failures into
/// [`crate::db::errors::DbError`] before returning; no driver error type
/// crosses this boundary. Absence is reported structurally (`Option`, `bool`,
/// `0`) - raising `NotFound` where the contract demands it is the
/// repository's job, not the store's.
///
/// `update_one` expects an operator-style update document (`$set`, `$unset`,
/// `$inc`, ...); callers holding a plain field map go through
/// [`normalize_update`] first.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Find the first document matching `filter`
    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>>;

    /// Find all documents matching `filter`, materialized (not a cursor)
    async fn find(&self, collection: &str, filter: Document, options: FindOptions) -> Result<Vec<Document>>;

    /// Insert a document, returning it with its generated `_id`
    async fn insert_one(&self, collection: &str, document: Document) -> Result<Document>;

    /// Apply an operator-style update to the first match, returning the
    /// updated document, or `None` if the filter matched nothing
    async fn update_one(&self, collection: &str, filter: Document, update: Document) -> Result<Option<Document>>;

    /// Delete the first match; `false` if the filter matched nothing
    async fn delete_one(&self, collection: &str, filter: Document) -> Result<bool>;

    /// Count matching documents; zero is a valid result
    async fn count(&self, collection: &str, filter: Document) -> Result<u64>;

    /// Create a unique index on a single field if it does not already exist
    async fn ensure_unique_index(&self, collection: &str, field: &str) -> Result<()>;

    /// Drop the unique index on `field` if present (used by `down()` scripts)
    async fn drop_unique_index(&self, collection: &str, field: &str) -> Result<()>;
}

/// Normalize an update document to operator form.
///
/// A plain field map (no `$`-prefixed top-level key) is equivalent to setting
/// exactly those fields, so it is wrapped in `$set` - never treated as a
/// full-document replacement. Operator-style updates pass through unchanged.
pub fn normalize_update(update: Document) -> Document {
    let is_operator_form = update.keys().next().is_some_and(|key| key.starts_with('$'));
    if is_operator_form {
        update
    } else {
        doc! { "$set": update }
    }
}
