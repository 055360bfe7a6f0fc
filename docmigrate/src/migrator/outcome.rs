use crate::errors::{MigrateError, MigrateResult};
use crate::NO_VERSION;
use std::fmt::{Display, Formatter};

/// Ledger versions before and after a command.
///
/// Both are the highest applied version: `0` when only the root is present,
/// [`NO_VERSION`] when the ledger holds nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionChange {
    pub old_version: i64,
    pub new_version: i64,
}

impl VersionChange {
    pub fn new(old_version: i64, new_version: i64) -> VersionChange {
        VersionChange {
            old_version,
            new_version,
        }
    }

    /// A change that leaves the ledger where it was.
    pub fn unchanged(version: i64) -> VersionChange {
        VersionChange::new(version, version)
    }

    pub fn is_noop(&self) -> bool {
        self.old_version == self.new_version
    }
}

/// Splits a command result into `(old version, new version, error)`.
///
/// Errors raised before any version was read report [`NO_VERSION`] for both.
///
/// # Examples
///
/// ```rust
/// use docmigrate::errors::{ErrorKind, MigrateError};
/// use docmigrate::migrator::{into_triple, VersionChange};
///
/// let (old, new, err) = into_triple(Ok(VersionChange::new(0, 2)));
/// assert_eq!((old, new), (0, 2));
/// assert!(err.is_none());
///
/// let failed = MigrateError::new("boom", ErrorKind::MigrationFailed)
///     .with_progress(VersionChange::new(0, 1));
/// let (old, new, err) = into_triple(Err(failed));
/// assert_eq!((old, new), (0, 1));
/// assert!(err.is_some());
/// ```
pub fn into_triple(result: MigrateResult<VersionChange>) -> (i64, i64, Option<MigrateError>) {
    match result {
        Ok(change) => (change.old_version, change.new_version, None),
        Err(err) => {
            let change = err.progress().unwrap_or_default();
            (change.old_version, change.new_version, Some(err))
        }
    }
}

impl Default for VersionChange {
    fn default() -> Self {
        VersionChange::unchanged(NO_VERSION)
    }
}

impl Display for VersionChange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.old_version, self.new_version)
    }
}
