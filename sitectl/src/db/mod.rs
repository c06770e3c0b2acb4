//! Database layer for data persistence and access.
//!
//! This module implements the data access layer over MongoDB. It follows the
//! Repository pattern to provide typed abstractions over document collections.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ Domain modules  │  (profiles, categories, users - API handlers)
//! └────────┬────────┘
//!          │
//!          ↓
//! ┌─────────────────┐
//! │ Repository<T>   │  (db::repository - typed CRUD, NotFound/update semantics)
//! └────────┬────────┘
//!          │
//!          ↓
//! ┌─────────────────┐
//! │ DocumentStore   │  (db::store - driver seam, classified errors)
//! └────────┬────────┘
//!          │
//!          ↓
//! ┌─────────────────┐
//! │ mongo / memory  │  (db::mongo in production, db::memory for dev & tests)
//! └─────────────────┘
//! ```
//!
//! # Error handling
//!
//! Every failure crossing this layer is a [`errors::DbError`] - the driver's
//! native error type never leaks. Callers either propagate the typed error to
//! the API boundary for status-code mapping ([`errors::DbError::kind`]), or,
//! for non-critical side effects like view counters, log and swallow it so
//! the primary result is not blocked. What leaves the process is controlled
//! by [`errors::ErrorExposure`].
//!
//! # Migrations
//!
//! Schema migrations live in [`crate::migrate`] and run through the same
//! [`store::DocumentStore`] seam; see [`crate::migrations`] for this
//! application's registered scripts.

pub mod errors;
pub mod memory;
pub mod mongo;
pub mod repository;
pub mod store;

pub use errors::{DbError, DbErrorKind, ErrorExposure, Result};
pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use repository::Repository;
pub use store::{DocumentStore, FindOptions};
