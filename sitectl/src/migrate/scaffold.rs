//! Scaffold generator for new migration scripts.
//!
//! `create` writes a stub script following the `m<version>_<snake_name>.rs`
//! convention into the configured migrations directory. It touches only the
//! filesystem - never the database or the tracking collection. The new
//! script still has to be registered in [`crate::migrations::registry`] by
//! hand, since the registry is assembled at compile time.

use crate::db::errors::{DbError, Result};
use anyhow::Context;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};

/// Create a new migration stub named after `name` and return its path.
///
/// The version is the current Unix time in milliseconds - coarse, but
/// monotonic under normal clock behavior and unique enough for a manual
/// workflow. The name is slugged to lowercase with non-alphanumeric runs
/// collapsed to single underscores.
pub fn create(directory: &Path, name: &str) -> Result<PathBuf> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(DbError::Validation {
            message: "migration name must contain at least one alphanumeric character".to_string(),
        });
    }

    let version = Utc::now().timestamp_millis();
    let path = directory.join(format!("m{version}_{slug}.rs"));

    fs::create_dir_all(directory)
        .with_context(|| format!("failed to create migrations directory {}", directory.display()))
        .map_err(DbError::Other)?;
    fs::write(&path, stub(version, &slug))
        .with_context(|| format!("failed to write migration stub {}", path.display()))
        .map_err(DbError::Other)?;

    Ok(path)
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for character in name.chars() {
        if character.is_ascii_alphanumeric() {
            slug.push(character.to_ascii_lowercase());
        } else if !slug.ends_with('_') && !slug.is_empty() {
            slug.push('_');
        }
    }
    slug.trim_end_matches('_').to_string()
}

fn stub(version: i64, slug: &str) -> String {
    let type_name = camel_case(slug);
    format!(
        r#"use crate::db::store::DocumentStore;
use crate::migrate::Migration;
use anyhow::Result;
use async_trait::async_trait;

pub struct {type_name};

#[async_trait]
impl Migration for {type_name} {{
    fn version(&self) -> i64 {{
        {version}
    }}

    fn name(&self) -> &'static str {{
        "{slug}"
    }}

    async fn up(&self, _store: &dyn DocumentStore) -> Result<()> {{
        Ok(())
    }}

    async fn down(&self, _store: &dyn DocumentStore) -> Result<()> {{
        Ok(())
    }}
}}
"#
    )
}

fn camel_case(slug: &str) -> String {
    slug.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_lowercased_with_collapsed_separators() {
        assert_eq!(slugify("Add user bio"), "add_user_bio");
        assert_eq!(slugify("  weird -- name!! "), "weird_name");
        assert_eq!(slugify("already_snake"), "already_snake");
    }

    #[test]
    fn empty_or_symbolic_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["", "   ", "!!!"] {
            let err = create(dir.path(), name).unwrap_err();
            assert!(matches!(err, DbError::Validation { .. }), "name {name:?} should be rejected");
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn create_writes_a_stub_with_the_naming_convention() {
        let dir = tempfile::tempdir().unwrap();
        let path = create(dir.path(), "Add user bio").unwrap();

        let filename = path.file_name().unwrap().to_str().unwrap();
        assert!(filename.ends_with("_add_user_bio.rs"), "unexpected filename {filename}");
        let version_part = filename.strip_prefix('m').unwrap().split('_').next().unwrap();
        let version: i64 = version_part.parse().unwrap();
        assert!(version > 1_600_000_000_000, "version should be a millisecond timestamp");

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("pub struct AddUserBio;"));
        assert!(contents.contains("impl Migration for AddUserBio"));
        assert!(contents.contains("\"add_user_bio\""));
        assert!(contents.contains(&version.to_string()));

        // No other side effects
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
