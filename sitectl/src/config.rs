//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable
//! overrides. The file path defaults to `config.yaml` but can be specified
//! via the `-f` flag or the `SITECTL_CONFIG` environment variable.
//!
//! ## Loading Priority
//!
//! Sources are merged in order (later sources override earlier ones):
//!
//! 1. **YAML config file** - base configuration (default: `config.yaml`)
//! 2. **Environment variables** - `SITECTL_`-prefixed variables, with `__`
//!    separating nested fields (`SITECTL_DATABASE__NAME=sitectl`)
//! 3. **DATABASE_URL** - special case: overrides `database.url` if set
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Point at a real deployment
//! DATABASE_URL="mongodb://db.internal:27017"
//! SITECTL_DATABASE__NAME="sitectl_prod"
//!
//! # Redact error detail on external surfaces
//! SITECTL_ENVIRONMENT=production
//! ```

use crate::db::errors::{DbError, ErrorExposure};
use clap::{Parser, Subcommand};
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// CLI surface: config file selection plus the migration commands
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "SITECTL_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without doing anything else.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage schema migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum MigrateAction {
    /// Apply all pending migrations in version order
    Up,
    /// Roll back the single most recently applied migration
    Down,
    /// Generate a new migration stub file
    Create {
        /// Human-readable migration name, slugged into the filename
        name: String,
    },
}

/// Main application configuration.
///
/// Loaded from YAML and environment variables; all fields have defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Special-case override for `database.url` (conventional DATABASE_URL)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// MongoDB connection settings
    pub database: DatabaseConfig,
    /// Deployment environment; decides how much error detail external
    /// surfaces may see
    pub environment: Environment,
    /// Directory `migrate create` writes new scripts into
    pub migrations_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Connection string (`mongodb://` or `mongodb+srv://`)
    pub url: String,
    /// Database name within the deployment
    pub name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "mongodb://localhost:27017".to_string(),
            name: "sitectl".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            database: DatabaseConfig::default(),
            environment: Environment::Development,
            migrations_dir: PathBuf::from("sitectl/src/migrations"),
        }
    }
}

/// Deployment environment, an explicit policy value rather than ad-hoc
/// env-var sniffing at the formatting site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Error detail policy for external surfaces in this environment
    pub fn exposure(self) -> ErrorExposure {
        match self {
            Environment::Development => ErrorExposure::Full,
            Environment::Production => ErrorExposure::Redacted,
        }
    }
}

impl Config {
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        // if DATABASE_URL is set, it wins over database.url
        if let Some(url) = config.database_url.take() {
            config.database.url = url;
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("SITECTL_").split("__"))
            // Common DATABASE_URL pattern
            .merge(Env::raw().only(&["DATABASE_URL"]))
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), DbError> {
        let url = Url::parse(&self.database.url).map_err(|e| DbError::Validation {
            message: format!("database.url is not a valid URL: {e}"),
        })?;
        if !matches!(url.scheme(), "mongodb" | "mongodb+srv") {
            return Err(DbError::Validation {
                message: format!("database.url must use the mongodb:// or mongodb+srv:// scheme, got '{}'", url.scheme()),
            });
        }
        if self.database.name.trim().is_empty() {
            return Err(DbError::Validation {
                message: "database.name must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn args_for(config_path: &str) -> Args {
        Args {
            config: config_path.to_string(),
            validate: false,
            command: None,
        }
    }

    #[test]
    fn defaults_are_valid() {
        Jail::expect_with(|_jail| {
            let config = Config::load(&args_for("missing.yaml")).expect("defaults should load");
            assert_eq!(config.database.url, "mongodb://localhost:27017");
            assert_eq!(config.database.name, "sitectl");
            assert_eq!(config.environment, Environment::Development);
            Ok(())
        });
    }

    #[test]
    fn yaml_and_env_override_in_order() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
                database:
                  url: "mongodb://yaml-host:27017"
                  name: "from_yaml"
                environment: production
                "#,
            )?;
            jail.set_env("SITECTL_DATABASE__NAME", "from_env");

            let config = Config::load(&args_for("config.yaml")).expect("config should load");
            assert_eq!(config.database.url, "mongodb://yaml-host:27017");
            assert_eq!(config.database.name, "from_env");
            assert_eq!(config.environment, Environment::Production);
            Ok(())
        });
    }

    #[test]
    fn database_url_env_var_wins() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "database:\n  url: \"mongodb://yaml-host:27017\"\n")?;
            jail.set_env("DATABASE_URL", "mongodb://env-host:27017");

            let config = Config::load(&args_for("config.yaml")).expect("config should load");
            assert_eq!(config.database.url, "mongodb://env-host:27017");
            Ok(())
        });
    }

    #[test]
    fn non_mongodb_scheme_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "database:\n  url: \"postgres://nope:5432\"\n")?;
            let err = Config::load(&args_for("config.yaml")).expect_err("should reject scheme");
            assert!(err.to_string().contains("mongodb://"));
            Ok(())
        });
    }

    #[test]
    fn production_redacts_and_development_does_not() {
        assert_eq!(Environment::Production.exposure(), ErrorExposure::Redacted);
        assert_eq!(Environment::Development.exposure(), ErrorExposure::Full);
    }
}
