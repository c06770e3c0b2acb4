//! This application's migration scripts.
//!
//! Each script lives in its own `m<version>_<snake_name>.rs` file and is
//! registered here explicitly - the compiled binary is the single source of
//! truth for the available set. New scripts come from
//! `sitectl migrate create <name>` and must be added to [`registry`] by hand.

pub mod m0001_initial_indexes;
pub mod m0002_seed_categories;

use crate::db::errors::Result;
use crate::migrate::MigrationRegistry;
use std::sync::Arc;

/// Assemble the registry of every migration this binary knows about
pub fn registry() -> Result<MigrationRegistry> {
    MigrationRegistry::new(vec![
        Arc::new(m0001_initial_indexes::InitialIndexes),
        Arc::new(m0002_seed_categories::SeedCategories),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::db::store::DocumentStore;
    use crate::migrate::MigrationRunner;
    use mongodb::bson::doc;

    #[test]
    fn registry_assembles_without_version_conflicts() {
        let registry = registry().unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test_log::test(tokio::test)]
    async fn shipped_migrations_apply_and_roll_back_cleanly() {
        let store = Arc::new(MemoryStore::new());
        let runner = MigrationRunner::new(registry().unwrap(), store.clone());

        let report = runner.apply().await.unwrap();
        assert_eq!(report.actions.len(), 2);
        assert!(store.count("categories", doc! {}).await.unwrap() > 0);

        runner.rollback().await.unwrap();
        assert_eq!(store.count("categories", doc! {}).await.unwrap(), 0);
    }
}
