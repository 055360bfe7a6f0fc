//! Declared migrations and the ledger records that track them.
//!
//! A [`Migration`] is process-local code: a version, a label and a pair of
//! forward/backward bodies. A [`MigrationRecord`] is the persisted trace left
//! in the ledger once a migration has been applied. The [`MigrationSet`] is
//! the version-sorted catalog of every migration the process knows about,
//! always headed by the implicit root (version 0).

#[allow(clippy::module_inception)]
mod migration;
mod migration_set;
mod record;

pub use migration::{Migration, MigrationFn, ROOT_MIGRATION_NAME};
pub use migration_set::{MigrationSet, MigrationSetBuilder};
pub use record::{MigrationRecord, RecordId};
