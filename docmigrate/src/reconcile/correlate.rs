use crate::errors::{ErrorKind, MigrateError, MigrateResult};
use crate::migration::{Migration, MigrationRecord};
use std::cmp::Ordering;

/// An applied record paired with the declaration that can roll it back.
pub struct Matched<'a, C> {
    pub record: &'a MigrationRecord,
    pub migration: &'a Migration<C>,
}

impl<C> Clone for Matched<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Matched<'_, C> {}

/// One element of a correlation.
pub enum Correlated<'a, C> {
    /// The record has a declaration with the same version.
    Matched(Matched<'a, C>),
    /// The record has no declaration; its rollback semantics are unknown.
    Missing(&'a MigrationRecord),
}

impl<C> Correlated<'_, C> {
    pub fn version(&self) -> i64 {
        match self {
            Correlated::Matched(matched) => matched.record.version(),
            Correlated::Missing(record) => record.version(),
        }
    }
}

/// Result of aligning the applied history with the declared migrations.
///
/// Ascending by version. When a gap was found the walk stopped there and the
/// offending record is the last entry.
pub struct Correlation<'a, C> {
    entries: Vec<Correlated<'a, C>>,
}

impl<'a, C> Correlation<'a, C> {
    pub fn entries(&self) -> &[Correlated<'a, C>] {
        &self.entries
    }

    /// The applied record with no declaration, if one was found.
    pub fn gap(&self) -> Option<&'a MigrationRecord> {
        match self.entries.last() {
            Some(Correlated::Missing(record)) => Some(*record),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.gap().is_none()
    }

    /// The matched pairs, or a `MigrationsAbsent` error naming the gap.
    pub fn into_matched(self) -> MigrateResult<Vec<Matched<'a, C>>> {
        if let Some(record) = self.gap() {
            log::error!(
                "Applied migration {} ({}) is not declared",
                record.version(),
                record.name()
            );
            return Err(MigrateError::new(
                &format!(
                    "Applied migration {} ({}) is not declared, cannot roll it back",
                    record.version(),
                    record.name()
                ),
                ErrorKind::MigrationsAbsent,
            ));
        }

        Ok(self
            .entries
            .into_iter()
            .filter_map(|entry| match entry {
                Correlated::Matched(matched) => Some(matched),
                Correlated::Missing(_) => None,
            })
            .collect())
    }
}

/// Aligns applied records with their declarations.
///
/// Both inputs must be ascending by version. Declared migrations that were
/// never applied are skipped. The walk stops at the first applied record
/// without a declaration, including records left over once the declarations
/// run out.
///
/// # Examples
///
/// ```rust
/// use docmigrate::migration::{Migration, MigrationRecord, MigrationSet};
/// use docmigrate::reconcile::correlate;
///
/// let set = MigrationSet::<()>::new(vec![Migration::forward_only(1, "one", |_, _| Ok(()))]).unwrap();
/// let applied = vec![MigrationRecord::new(0, "-"), MigrationRecord::new(1, "one"), MigrationRecord::new(5, "five")];
///
/// let correlation = correlate(&applied, set.as_slice());
/// assert_eq!(correlation.gap().map(|r| r.version()), Some(5));
/// ```
pub fn correlate<'a, C>(
    applied: &'a [MigrationRecord],
    declared: &'a [Migration<C>],
) -> Correlation<'a, C> {
    let mut entries = Vec::with_capacity(applied.len());
    let mut i = 0;
    let mut j = 0;

    while i < applied.len() && j < declared.len() {
        match applied[i].version().cmp(&declared[j].version()) {
            Ordering::Less => {
                entries.push(Correlated::Missing(&applied[i]));
                return Correlation { entries };
            }
            Ordering::Greater => {
                // declared but never applied, nothing to roll back
                j += 1;
            }
            Ordering::Equal => {
                entries.push(Correlated::Matched(Matched {
                    record: &applied[i],
                    migration: &declared[j],
                }));
                i += 1;
                j += 1;
            }
        }
    }

    if i < applied.len() {
        entries.push(Correlated::Missing(&applied[i]));
    }

    Correlation { entries }
}
