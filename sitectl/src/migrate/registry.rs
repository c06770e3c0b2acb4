//! Compiled-in migration registry.
//!
//! Migrations are explicit, ordered units of schema change registered at
//! build time - there is no runtime filesystem discovery in a compiled
//! binary. Script files keep the `m<version>_<snake_name>.rs` naming
//! convention and each exports one [`Migration`] implementation; the
//! application assembles them in [`crate::migrations::registry`].

use crate::db::errors::{DbError, Result};
use crate::db::store::DocumentStore;
use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Name of the tracking collection holding one record per applied migration
pub const TRACKING_COLLECTION: &str = "migrations";

/// A versioned, ordered unit of schema/data change with a forward and a
/// reverse procedure. Versions must be unique across the registry; the
/// runner applies them in strictly ascending order.
#[async_trait::async_trait]
pub trait Migration: Send + Sync {
    fn version(&self) -> i64;

    fn name(&self) -> &'static str;

    /// Forward change. Must have durably committed its effects when it
    /// returns `Ok`.
    async fn up(&self, store: &dyn DocumentStore) -> anyhow::Result<()>;

    /// Reverse change, undoing exactly what `up` did.
    async fn down(&self, store: &dyn DocumentStore) -> anyhow::Result<()>;
}

/// Row persisted in [`TRACKING_COLLECTION`] for each applied migration.
/// Created on successful apply, deleted on successful rollback. The unique
/// index on `version` is the sole guard against double application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied: DateTime,
}

/// The available set: every migration the binary knows about, held in
/// ascending version order.
pub struct MigrationRegistry {
    migrations: Vec<Arc<dyn Migration>>,
}

impl std::fmt::Debug for MigrationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.migrations.iter().map(|m| (m.version(), m.name())))
            .finish()
    }
}

impl MigrationRegistry {
    /// Build a registry, sorting by version. Duplicate versions are a fatal
    /// `Validation` error at registration time rather than a latent ordering
    /// hazard at run time.
    pub fn new(mut migrations: Vec<Arc<dyn Migration>>) -> Result<Self> {
        migrations.sort_by_key(|m| m.version());
        for pair in migrations.windows(2) {
            if pair[0].version() == pair[1].version() {
                return Err(DbError::Validation {
                    message: format!(
                        "duplicate migration version {}: '{}' and '{}'",
                        pair[0].version(),
                        pair[0].name(),
                        pair[1].name()
                    ),
                });
            }
        }
        Ok(Self { migrations })
    }

    /// All registered migrations in ascending version order
    pub fn ordered(&self) -> &[Arc<dyn Migration>] {
        &self.migrations
    }

    pub fn get(&self, version: i64) -> Option<&Arc<dyn Migration>> {
        self.migrations.iter().find(|m| m.version() == version)
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop {
        version: i64,
        name: &'static str,
    }

    #[async_trait::async_trait]
    impl Migration for Noop {
        fn version(&self) -> i64 {
            self.version
        }

        fn name(&self) -> &'static str {
            self.name
        }

        async fn up(&self, _store: &dyn DocumentStore) -> anyhow::Result<()> {
            Ok(())
        }

        async fn down(&self, _store: &dyn DocumentStore) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn registry_sorts_by_version() {
        let registry = MigrationRegistry::new(vec![
            Arc::new(Noop { version: 3, name: "c" }),
            Arc::new(Noop { version: 1, name: "a" }),
            Arc::new(Noop { version: 2, name: "b" }),
        ])
        .unwrap();
        let versions: Vec<i64> = registry.ordered().iter().map(|m| m.version()).collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[test]
    fn duplicate_versions_are_rejected_at_registration() {
        let err = MigrationRegistry::new(vec![
            Arc::new(Noop { version: 1, name: "a" }),
            Arc::new(Noop { version: 1, name: "b" }),
        ])
        .unwrap_err();
        match err {
            DbError::Validation { message } => {
                assert!(message.contains("duplicate migration version 1"));
                assert!(message.contains("'a'"));
                assert!(message.contains("'b'"));
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }
}
