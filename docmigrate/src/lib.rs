//! # docmigrate - Versioned Migrations for Document Databases
//!
//! docmigrate keeps a ledger of applied migrations inside a document database
//! and reconciles it with the migrations declared in code. It can apply the
//! missing ones, roll back, reset to the root, report the current version and
//! forcibly stamp the ledger to a declared version.
//!
//! ## Key Features
//!
//! - **Explicit catalog**: migrations are declared once as a [`migration::MigrationSet`], no global registry
//! - **Pure reconciliation**: [`reconcile::merge`] and [`reconcile::correlate`] never touch a store
//! - **Narrow store contract**: any document store implementing [`store::LedgerStoreProvider`] can hold the ledger
//! - **Resumable**: every completed step is recorded, a failed run resumes where it stopped
//! - **Cancellable**: long runs stop between steps through a [`migrator::CancelToken`]
//!
//! ## Quick Start
//!
//! ```rust
//! use docmigrate::migration::{Migration, MigrationSet};
//! use docmigrate::migrator::Migrator;
//! use docmigrate::store::{InMemoryLedgerStore, LedgerStore};
//!
//! # fn main() -> docmigrate::errors::MigrateResult<()> {
//! struct Client;
//!
//! let migrations = MigrationSet::builder()
//!     .add(Migration::new(
//!         1,
//!         "create_users",
//!         |_: &Client, prefix| {
//!             println!("create {}_users", prefix);
//!             Ok(())
//!         },
//!         |_: &Client, prefix| {
//!             println!("drop {}_users", prefix);
//!             Ok(())
//!         },
//!     ))
//!     .build()?;
//!
//! let migrator = Migrator::builder()
//!     .store(LedgerStore::new(InMemoryLedgerStore::new()))
//!     .migrations(migrations)
//!     .build()?;
//!
//! migrator.run(&Client, "shop", &["init"])?;
//! migrator.run(&Client, "shop", &["up"])?;
//! assert_eq!(migrator.run(&Client, "shop", &["version"])?.new_version, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`errors`] - Error types and result definitions
//! - [`migration`] - Declared migrations, the migration set and ledger records
//! - [`reconcile`] - Merge and correlate algorithms
//! - [`store`] - Ledger store abstractions and the in-memory adapter
//! - [`migrator`] - The six commands, command parsing and configuration

pub mod errors;
pub mod migration;
pub mod migrator;
pub mod reconcile;
pub mod store;

/// Version of the implicit root migration.
pub const ROOT_VERSION: i64 = 0;

/// Version reported when the ledger holds no record at all.
pub const NO_VERSION: i64 = -1;
