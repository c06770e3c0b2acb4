//! Migration runner: applies pending migrations and rolls back the most
//! recent one.
//!
//! Execution is strictly sequential - each migration's `up()` fully
//! completes before the next begins, because later migrations may assume the
//! schema state left by earlier ones. There is no distributed lock around a
//! run: the unique index on `version` in the tracking collection is the only
//! guard against two runner processes double-applying, and it detects the
//! race only at record-insert time, after the loser's `up()` has already
//! run. Multi-instance deployments must serialize runner invocations
//! externally.

use crate::db::errors::{DbError, ErrorExposure};
use crate::db::store::{DocumentStore, FindOptions};
use crate::migrate::registry::{Migration, MigrationRecord, MigrationRegistry, TRACKING_COLLECTION};
use mongodb::bson::{self, DateTime, doc};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// A migration run failure, annotated with the identity of the migration
/// that caused it. The underlying classified error stays on the source chain.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// `up()` failed; no tracking record was written, the migration remains
    /// pending, and everything applied before it stays committed.
    #[error("migration {version} ({name}) failed to apply")]
    Apply {
        version: i64,
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// `up()` succeeded but the tracking record could not be inserted. A
    /// `Duplicate` here means a concurrent runner won the race and this
    /// migration has now run twice.
    #[error("migration {version} ({name}) ran but could not be recorded; a concurrent runner may have applied it first")]
    Record {
        version: i64,
        name: String,
        #[source]
        source: DbError,
    },

    /// `down()` failed; the tracking record is left in place and the schema
    /// is in an ambiguous state requiring operator inspection.
    #[error("migration {version} ({name}) failed to roll back; its tracking record was left in place")]
    Rollback {
        version: i64,
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// A tracking-collection operation failed outside any single migration
    #[error(transparent)]
    Store(#[from] DbError),
}

impl MigrateError {
    /// Format for an external surface. The migration identity is always
    /// safe to show; the cause chain only under `Full`.
    pub fn render(&self, exposure: ErrorExposure) -> String {
        match (self, exposure) {
            (MigrateError::Store(db_error), _) => db_error.render(exposure),
            (_, ErrorExposure::Redacted) => self.to_string(),
            (_, ErrorExposure::Full) => {
                let mut message = self.to_string();
                let mut source = std::error::Error::source(self);
                while let Some(cause) = source {
                    message = format!("{message}: {cause}");
                    source = cause.source();
                }
                message
            }
        }
    }
}

/// Identity of one migration acted on during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationAction {
    pub version: i64,
    pub name: String,
}

/// Outcome of a successful `apply()` or `rollback()` call
#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    /// Migrations applied (or rolled back), in execution order
    pub actions: Vec<MigrationAction>,
    /// Migrations that were already in the desired state and were skipped
    pub skipped: usize,
}

pub struct MigrationRunner {
    registry: MigrationRegistry,
    store: Arc<dyn DocumentStore>,
}

impl MigrationRunner {
    pub fn new(registry: MigrationRegistry, store: Arc<dyn DocumentStore>) -> Self {
        Self { registry, store }
    }

    /// Apply every pending migration in ascending version order.
    ///
    /// The first failure halts the run immediately; migrations applied
    /// before it remain committed and recorded, leaving a well-defined (if
    /// incomplete) schema state.
    #[instrument(skip_all)]
    pub async fn apply(&self) -> Result<MigrationReport, MigrateError> {
        self.store.ensure_unique_index(TRACKING_COLLECTION, "version").await?;

        let applied = self.applied_records().await?;
        let applied_versions: HashSet<i64> = applied.iter().map(|record| record.version).collect();

        let pending: Vec<&Arc<dyn Migration>> = self
            .registry
            .ordered()
            .iter()
            .filter(|migration| !applied_versions.contains(&migration.version()))
            .collect();

        if pending.is_empty() {
            info!(applied = applied_versions.len(), "no pending migrations");
            return Ok(MigrationReport {
                actions: Vec::new(),
                skipped: applied_versions.len(),
            });
        }

        let mut actions = Vec::new();
        for migration in pending {
            let version = migration.version();
            let name = migration.name();
            info!(version, name, "applying migration");

            migration.up(self.store.as_ref()).await.map_err(|source| MigrateError::Apply {
                version,
                name: name.to_string(),
                source,
            })?;

            let record = MigrationRecord {
                version,
                name: name.to_string(),
                applied: DateTime::now(),
            };
            let document = bson::to_document(&record)
                .map_err(|e| MigrateError::Store(DbError::Other(anyhow::Error::new(e).context("failed to encode migration record"))))?;
            self.store
                .insert_one(TRACKING_COLLECTION, document)
                .await
                .map_err(|source| MigrateError::Record {
                    version,
                    name: name.to_string(),
                    source,
                })?;

            actions.push(MigrationAction {
                version,
                name: name.to_string(),
            });
        }

        info!(count = actions.len(), "migrations applied");
        Ok(MigrationReport {
            actions,
            skipped: applied_versions.len(),
        })
    }

    /// Roll back the single most recently applied migration.
    ///
    /// The tracking record is deleted only after `down()` succeeds; on
    /// failure it stays in place, because `down()` may have partially
    /// executed and the schema now needs operator inspection.
    #[instrument(skip_all)]
    pub async fn rollback(&self) -> Result<MigrationReport, MigrateError> {
        let mut applied = self.applied_records().await?;
        let Some(latest) = applied.pop() else {
            info!("nothing to roll back");
            return Ok(MigrationReport::default());
        };

        let migration = self.registry.get(latest.version).ok_or_else(|| {
            MigrateError::Store(DbError::Validation {
                message: format!(
                    "applied migration {} ({}) is not registered in this binary; cannot roll back",
                    latest.version, latest.name
                ),
            })
        })?;

        info!(version = latest.version, name = latest.name, "rolling back migration");
        migration
            .down(self.store.as_ref())
            .await
            .map_err(|source| MigrateError::Rollback {
                version: latest.version,
                name: latest.name.clone(),
                source,
            })?;

        let deleted = self
            .store
            .delete_one(TRACKING_COLLECTION, doc! { "version": latest.version })
            .await?;
        if !deleted {
            warn!(version = latest.version, "tracking record disappeared during rollback");
        }

        Ok(MigrationReport {
            actions: vec![MigrationAction {
                version: latest.version,
                name: latest.name,
            }],
            skipped: applied.len(),
        })
    }

    /// The applied set, ascending by version
    async fn applied_records(&self) -> Result<Vec<MigrationRecord>, DbError> {
        self.store
            .find(TRACKING_COLLECTION, doc! {}, FindOptions::sorted_by("version"))
            .await?
            .into_iter()
            .map(|document| {
                bson::from_document(document)
                    .map_err(|e| DbError::Other(anyhow::Error::new(e).context("failed to decode migration record")))
            })
            .collect()
    }
}
