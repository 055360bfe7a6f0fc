//! The migrator and its command surface.
//!
//! [`Migrator`] runs the six commands (`init`, `up`, `down`, `reset`,
//! `version`, `set_version`) against a ledger. [`Command`] parses them from
//! their textual form, [`MigratorConfig`] names the ledger and
//! [`CancelToken`] stops long runs between steps.

mod cancel;
mod command;
mod config;
#[allow(clippy::module_inception)]
mod migrator;
mod outcome;

pub use cancel::CancelToken;
pub use command::Command;
pub use config::{MigratorConfig, DEFAULT_LEDGER_SUFFIX, DEFAULT_VERSION_FIELD};
pub use migrator::{Migrator, MigratorBuilder};
pub use outcome::{into_triple, VersionChange};
