//! Embedded in-process document store.
//!
//! Serves the role the embedded database plays in larger deployments: a
//! zero-dependency backend for local development and for tests, behind the
//! same [`DocumentStore`] seam as the real driver. It supports the subset of
//! semantics the rest of the crate relies on: equality filters, single- and
//! multi-field sorts, `$set` / `$unset` / `$inc` updates, and single-field
//! unique indexes that fail inserts with a real [`DbError::Duplicate`]. As on
//! a real server, a document missing the indexed field indexes as null, so
//! two such documents collide.

use crate::db::errors::{DbError, Result};
use crate::db::store::{DocumentStore, FindOptions};
use mongodb::bson::{Bson, Document, oid::ObjectId};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct CollectionState {
    documents: Vec<Document>,
    unique_indexes: BTreeSet<String>,
}

/// In-memory [`DocumentStore`] implementation. Cheap to construct, one
/// independent universe of collections per instance.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, CollectionState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>> {
        let collections = self.collections.lock().expect("memory store lock poisoned");
        Ok(collections
            .get(collection)
            .and_then(|state| state.documents.iter().find(|doc| matches(doc, &filter)).cloned()))
    }

    async fn find(&self, collection: &str, filter: Document, options: FindOptions) -> Result<Vec<Document>> {
        let collections = self.collections.lock().expect("memory store lock poisoned");
        let mut results: Vec<Document> = collections
            .get(collection)
            .map(|state| state.documents.iter().filter(|doc| matches(doc, &filter)).cloned().collect())
            .unwrap_or_default();

        if let Some(sort) = &options.sort {
            results.sort_by(|a, b| compare_by_sort_spec(a, b, sort));
        }
        let skip = options.skip.unwrap_or(0) as usize;
        let results = results.into_iter().skip(skip);
        let results = match options.limit {
            Some(limit) if limit >= 0 => results.take(limit as usize).collect(),
            _ => results.collect(),
        };
        Ok(results)
    }

    async fn insert_one(&self, collection: &str, mut document: Document) -> Result<Document> {
        if !document.contains_key("_id") {
            document.insert("_id", ObjectId::new());
        }
        let mut collections = self.collections.lock().expect("memory store lock poisoned");
        let state = collections.entry(collection.to_string()).or_default();
        check_unique(collection, state, &document, None)?;
        state.documents.push(document.clone());
        Ok(document)
    }

    async fn update_one(&self, collection: &str, filter: Document, update: Document) -> Result<Option<Document>> {
        let mut collections = self.collections.lock().expect("memory store lock poisoned");
        let Some(state) = collections.get_mut(collection) else {
            return Ok(None);
        };
        let Some(position) = state.documents.iter().position(|doc| matches(doc, &filter)) else {
            return Ok(None);
        };
        let mut updated = state.documents[position].clone();
        apply_update(&mut updated, &update)?;
        check_unique(collection, state, &updated, Some(position))?;
        state.documents[position] = updated.clone();
        Ok(Some(updated))
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<bool> {
        let mut collections = self.collections.lock().expect("memory store lock poisoned");
        let Some(state) = collections.get_mut(collection) else {
            return Ok(false);
        };
        match state.documents.iter().position(|doc| matches(doc, &filter)) {
            Some(position) => {
                state.documents.remove(position);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count(&self, collection: &str, filter: Document) -> Result<u64> {
        let collections = self.collections.lock().expect("memory store lock poisoned");
        Ok(collections
            .get(collection)
            .map(|state| state.documents.iter().filter(|doc| matches(doc, &filter)).count() as u64)
            .unwrap_or(0))
    }

    async fn ensure_unique_index(&self, collection: &str, field: &str) -> Result<()> {
        let mut collections = self.collections.lock().expect("memory store lock poisoned");
        let state = collections.entry(collection.to_string()).or_default();
        // Creating a unique index over existing duplicates fails, as on a real server
        let null = Bson::Null;
        let mut seen: Vec<&Bson> = Vec::new();
        for document in &state.documents {
            let value = document.get(field).unwrap_or(&null);
            if seen.iter().any(|existing| bson_eq(existing, value)) {
                return Err(DbError::Duplicate {
                    collection: collection.to_string(),
                    field: field.to_string(),
                    value: plain_string(value),
                });
            }
            seen.push(value);
        }
        state.unique_indexes.insert(field.to_string());
        Ok(())
    }

    async fn drop_unique_index(&self, collection: &str, field: &str) -> Result<()> {
        let mut collections = self.collections.lock().expect("memory store lock poisoned");
        if let Some(state) = collections.get_mut(collection) {
            state.unique_indexes.remove(field);
        }
        Ok(())
    }
}

/// Reject a write that would put two documents with the same indexed value in
/// `state`. A missing field indexes as null. `exclude` skips the document
/// being replaced during an update.
fn check_unique(collection: &str, state: &CollectionState, candidate: &Document, exclude: Option<usize>) -> Result<()> {
    let null = Bson::Null;
    for field in &state.unique_indexes {
        let value = candidate.get(field).unwrap_or(&null);
        let conflict = state
            .documents
            .iter()
            .enumerate()
            .filter(|(index, _)| Some(*index) != exclude)
            .any(|(_, existing)| bson_eq(existing.get(field).unwrap_or(&null), value));
        if conflict {
            return Err(DbError::Duplicate {
                collection: collection.to_string(),
                field: field.clone(),
                value: plain_string(value),
            });
        }
    }
    Ok(())
}

/// Equality filter match on top-level fields
fn matches(document: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(field, expected)| document.get(field).is_some_and(|actual| bson_eq(actual, expected)))
}

/// BSON equality with numeric coercion (Int32(2) matches Int64(2))
fn bson_eq(a: &Bson, b: &Bson) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(*n as f64),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn compare_by_sort_spec(a: &Document, b: &Document, sort: &Document) -> Ordering {
    for (field, direction) in sort {
        let ordering = compare_values(a.get(field), b.get(field));
        let descending = matches!(direction, Bson::Int32(n) if *n < 0) || matches!(direction, Bson::Int64(n) if *n < 0);
        let ordering = if descending { ordering.reverse() } else { ordering };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compare_values(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => match (a, b) {
                (Bson::String(x), Bson::String(y)) => x.cmp(y),
                (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
                (Bson::ObjectId(x), Bson::ObjectId(y)) => x.cmp(y),
                (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
                _ => Ordering::Equal,
            },
        },
    }
}

fn apply_update(document: &mut Document, update: &Document) -> Result<()> {
    for (operator, operand) in update {
        let fields = operand.as_document().ok_or_else(|| DbError::Validation {
            message: format!("update operator '{operator}' requires a document operand"),
        })?;
        match operator.as_str() {
            "$set" => {
                for (field, value) in fields {
                    document.insert(field.clone(), value.clone());
                }
            }
            "$unset" => {
                for (field, _) in fields {
                    document.remove(field);
                }
            }
            "$inc" => {
                for (field, amount) in fields {
                    let current = document.get(field).and_then(as_f64).unwrap_or(0.0);
                    let amount = as_f64(amount).ok_or_else(|| DbError::Validation {
                        message: format!("$inc amount for '{field}' must be numeric"),
                    })?;
                    let result = current + amount;
                    // Stay integral when both sides were integral
                    if result.fract() == 0.0 && !matches!(document.get(field), Some(Bson::Double(_))) && amount.fract() == 0.0 {
                        document.insert(field.clone(), Bson::Int64(result as i64));
                    } else {
                        document.insert(field.clone(), Bson::Double(result));
                    }
                }
            }
            other => {
                return Err(DbError::Validation {
                    message: format!("unsupported update operator '{other}'"),
                });
            }
        }
    }
    Ok(())
}

fn plain_string(value: &Bson) -> String {
    match value {
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test_log::test(tokio::test)]
    async fn insert_assigns_an_id() {
        let store = MemoryStore::new();
        let inserted = store.insert_one("profiles", doc! { "slug": "ada" }).await.unwrap();
        assert!(inserted.get_object_id("_id").is_ok());
    }

    #[test_log::test(tokio::test)]
    async fn find_applies_sort_skip_and_limit() {
        let store = MemoryStore::new();
        for views in [30, 10, 20, 40] {
            store.insert_one("profiles", doc! { "views": views }).await.unwrap();
        }
        let options = FindOptions {
            sort: Some(doc! { "views": 1 }),
            skip: Some(1),
            limit: Some(2),
        };
        let found = store.find("profiles", doc! {}, options).await.unwrap();
        let views: Vec<i32> = found.iter().map(|d| d.get_i32("views").unwrap()).collect();
        assert_eq!(views, vec![20, 30]);
    }

    #[test_log::test(tokio::test)]
    async fn unique_index_rejects_colliding_insert() {
        let store = MemoryStore::new();
        store.ensure_unique_index("users", "email").await.unwrap();
        store.insert_one("users", doc! { "email": "a@example.com" }).await.unwrap();

        let err = store.insert_one("users", doc! { "email": "a@example.com" }).await.unwrap_err();
        match err {
            DbError::Duplicate { collection, field, value } => {
                assert_eq!(collection, "users");
                assert_eq!(field, "email");
                assert_eq!(value, "a@example.com");
            }
            other => panic!("expected Duplicate, got {other:?}"),
        }
    }

    #[test_log::test(tokio::test)]
    async fn unique_index_treats_missing_fields_as_null() {
        let store = MemoryStore::new();
        store.ensure_unique_index("users", "email").await.unwrap();
        store.insert_one("users", doc! { "name": "a" }).await.unwrap();

        let err = store.insert_one("users", doc! { "name": "b" }).await.unwrap_err();
        assert!(matches!(err, DbError::Duplicate { field, .. } if field == "email"));
    }

    #[test_log::test(tokio::test)]
    async fn unique_index_rejects_colliding_update() {
        let store = MemoryStore::new();
        store.ensure_unique_index("users", "email").await.unwrap();
        store.insert_one("users", doc! { "email": "a@example.com" }).await.unwrap();
        store.insert_one("users", doc! { "email": "b@example.com" }).await.unwrap();

        let err = store
            .update_one(
                "users",
                doc! { "email": "b@example.com" },
                doc! { "$set": { "email": "a@example.com" } },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Duplicate { .. }));
    }

    #[test_log::test(tokio::test)]
    async fn update_supports_set_unset_and_inc() {
        let store = MemoryStore::new();
        store
            .insert_one("profiles", doc! { "slug": "ada", "bio": "old", "views": 1, "draft": true })
            .await
            .unwrap();

        let updated = store
            .update_one(
                "profiles",
                doc! { "slug": "ada" },
                doc! { "$set": { "bio": "new" }, "$unset": { "draft": "" }, "$inc": { "views": 2 } },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.get_str("bio").unwrap(), "new");
        assert!(updated.get("draft").is_none());
        assert_eq!(updated.get_i64("views").unwrap(), 3);
    }

    #[test_log::test(tokio::test)]
    async fn unknown_operator_is_a_validation_error() {
        let store = MemoryStore::new();
        store.insert_one("profiles", doc! { "slug": "ada" }).await.unwrap();
        let err = store
            .update_one("profiles", doc! { "slug": "ada" }, doc! { "$rename": { "slug": "name" } })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation { .. }));
    }

    #[test_log::test(tokio::test)]
    async fn delete_and_count_report_absence_structurally() {
        let store = MemoryStore::new();
        assert!(!store.delete_one("profiles", doc! { "slug": "nope" }).await.unwrap());
        assert_eq!(store.count("profiles", doc! {}).await.unwrap(), 0);
    }
}
