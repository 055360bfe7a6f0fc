use crate::migration::{Migration, MigrationRecord};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

/// How far `up` should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
    /// Up to and including the highest declared migration
    #[default]
    Latest,
    /// Up to and including this version
    Version(i64),
}

impl Target {
    /// Exclusive upper bound on declared versions allowed into a plan.
    fn ceiling<C>(&self, declared: &[Migration<C>]) -> Option<i64> {
        match self {
            Target::Latest => declared.last().map(|m| m.version().saturating_add(1)),
            Target::Version(version) => Some(version.saturating_add(1)),
        }
    }
}

impl From<Option<i64>> for Target {
    fn from(version: Option<i64>) -> Self {
        version.map_or(Target::Latest, Target::Version)
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Latest => write!(f, "latest"),
            Target::Version(version) => write!(f, "{}", version),
        }
    }
}

/// One step of a merge plan.
pub enum PlanEntry<'a, C> {
    /// Already recorded in the ledger; nothing to do.
    Applied(&'a MigrationRecord),
    /// Declared but not applied yet; `up` runs it.
    Pending(&'a Migration<C>),
}

impl<'a, C> PlanEntry<'a, C> {
    pub fn version(&self) -> i64 {
        match self {
            PlanEntry::Applied(record) => record.version(),
            PlanEntry::Pending(migration) => migration.version(),
        }
    }

    pub fn name(&self) -> &'a str {
        match *self {
            PlanEntry::Applied(record) => record.name(),
            PlanEntry::Pending(migration) => migration.name(),
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, PlanEntry::Applied(_))
    }

    /// The migration to run, `None` for already applied entries.
    pub fn pending(&self) -> Option<&'a Migration<C>> {
        match *self {
            PlanEntry::Applied(_) => None,
            PlanEntry::Pending(migration) => Some(migration),
        }
    }
}

impl<C> Clone for PlanEntry<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for PlanEntry<'_, C> {}

impl<C> std::fmt::Debug for PlanEntry<'_, C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanEntry::Applied(record) => write!(f, "Applied({})", record.version()),
            PlanEntry::Pending(migration) => write!(f, "Pending({})", migration.version()),
        }
    }
}

/// Merges the applied history with the declared migrations into an apply plan.
///
/// Both inputs must be ascending by version. Declared migrations at or above
/// the target's ceiling are left out entirely; applied records are always kept.
/// When both sides hold the same version the applied record wins. The plan is
/// ascending by version and its pending entries are exactly what `up` runs.
///
/// # Examples
///
/// ```rust
/// use docmigrate::migration::{MigrationRecord, MigrationSet, Migration};
/// use docmigrate::reconcile::{merge, Target};
///
/// let set = MigrationSet::<()>::new(vec![
///     Migration::forward_only(1, "one", |_, _| Ok(())),
///     Migration::forward_only(2, "two", |_, _| Ok(())),
///     Migration::forward_only(3, "three", |_, _| Ok(())),
/// ])
/// .unwrap();
/// let applied = vec![MigrationRecord::new(0, "-"), MigrationRecord::new(1, "one")];
///
/// let plan = merge(&applied, set.as_slice(), Target::Version(2));
/// let pending: Vec<i64> = plan.iter().filter_map(|e| e.pending()).map(|m| m.version()).collect();
/// assert_eq!(pending, vec![2]);
/// ```
pub fn merge<'a, C>(
    applied: &'a [MigrationRecord],
    declared: &'a [Migration<C>],
    target: Target,
) -> Vec<PlanEntry<'a, C>> {
    let ceiling = target.ceiling(declared).unwrap_or(i64::MIN);
    let below_ceiling = |migration: &Migration<C>| migration.version() < ceiling;

    let mut merged = Vec::with_capacity(applied.len() + declared.len());
    let mut i = 0;
    let mut j = 0;

    while i < applied.len() && j < declared.len() && below_ceiling(&declared[j]) {
        match applied[i].version().cmp(&declared[j].version()) {
            Ordering::Less => {
                merged.push(PlanEntry::Applied(&applied[i]));
                i += 1;
            }
            Ordering::Greater => {
                merged.push(PlanEntry::Pending(&declared[j]));
                j += 1;
            }
            Ordering::Equal => {
                merged.push(PlanEntry::Applied(&applied[i]));
                i += 1;
                j += 1;
            }
        }
    }

    merged.extend(applied[i..].iter().map(PlanEntry::Applied));
    merged.extend(
        declared[j..]
            .iter()
            .take_while(|m| below_ceiling(*m))
            .map(PlanEntry::Pending),
    );

    merged
}
