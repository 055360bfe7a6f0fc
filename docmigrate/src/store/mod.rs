//! Ledger storage abstractions.
//!
//! The migrator keeps its ledger, one document per applied migration, in a
//! collection of a document database. This module defines the narrow set of
//! capabilities it needs from that database ([`LedgerStoreProvider`]), the
//! query vocabulary ([`VersionFilter`], [`FindOptions`]) and an in-memory
//! adapter. Persistent adapters live in their own crates.

mod cursor;
mod find_options;
mod ledger_store;
pub mod memory;
mod revision;

pub use cursor::RecordCursor;
pub use find_options::*;
pub use ledger_store::{LedgerStore, LedgerStoreProvider};
pub use memory::InMemoryLedgerStore;
pub use revision::Revision;
