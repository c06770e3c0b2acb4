//! Schema migration lifecycle: a compiled-in registry of versioned
//! migrations, a sequential apply/rollback runner over the tracking
//! collection, and a scaffold generator for new scripts.
//!
//! State machine per migration:
//!
//! ```text
//! Pending ──up() ok──▶ Applied ──down() ok──▶ Pending
//!    │                    │
//!    │ up() fails:        │ down() fails: record kept,
//!    │ no record written, │ schema ambiguous, operator
//!    ▼ still pending      ▼ intervention required
//!  (run halts)          (run halts)
//! ```
//!
//! Applying always proceeds in strictly ascending version order, so the
//! applied set recoverable from the tracking collection is a
//! prefix-consistent subset of the registered set.

pub mod registry;
pub mod runner;
pub mod scaffold;

pub use registry::{Migration, MigrationRecord, MigrationRegistry, TRACKING_COLLECTION};
pub use runner::{MigrateError, MigrationAction, MigrationReport, MigrationRunner};
