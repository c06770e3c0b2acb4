//! # sitectl: backend control for the sitectl profile platform
//!
//! `sitectl` is the data-access substrate shared by every feature of the
//! profile platform: a generic typed repository over MongoDB, a taxonomy of
//! persistence errors, and a versioned schema-migration engine with
//! apply/rollback semantics. Domain features (profile editors, category
//! pages, auth) are CRUD glue over this layer and talk to it exclusively
//! through [`db::Repository`] and [`db::DbError`].
//!
//! ## Architecture
//!
//! The **database layer** ([`db`]) wraps the MongoDB driver behind the
//! [`db::DocumentStore`] seam and translates every driver failure into one
//! of five typed error kinds - `NotFound`, `Duplicate`, `Connection`,
//! `Validation`, or the generic fallback - with structured context attached
//! and an explicit redaction policy ([`db::ErrorExposure`]) for what leaves
//! the process. An embedded in-memory store backs development and tests.
//!
//! The **migration engine** ([`migrate`]) holds a compiled-in registry of
//! versioned migrations, applies pending ones strictly in ascending version
//! order against a tracking collection (unique index on `version`), rolls
//! back the most recent one on request, and scaffolds new script files. The
//! scripts this application ships live in [`migrations`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use sitectl::config::{Args, Config};
//!
//! # fn main() -> anyhow::Result<()> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//! sitectl::telemetry::init_telemetry()?;
//! # Ok(())
//! # }
//! ```
//!
//! Migrations run from the CLI: `sitectl migrate up`, `sitectl migrate
//! down`, `sitectl migrate create <name>`.

pub mod config;
pub mod db;
pub mod migrate;
pub mod migrations;
pub mod telemetry;

pub use config::Config;
