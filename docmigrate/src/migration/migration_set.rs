use super::migration::{Migration, ROOT_MIGRATION_NAME};
use crate::errors::{ErrorKind, MigrateError, MigrateResult};
use crate::ROOT_VERSION;
use itertools::Itertools;
use std::sync::Arc;

/// The catalog of declared migrations known to the running process.
///
/// Always starts with the root migration (version 0), followed by the
/// caller's migrations in ascending version order. Built once and read-only
/// afterwards; clones share the same catalog.
///
/// # Examples
///
/// ```rust
/// use docmigrate::migration::{Migration, MigrationSet};
///
/// struct Client;
///
/// let set = MigrationSet::<Client>::builder()
///     .add(Migration::forward_only(2, "seed", |_, _| Ok(())))
///     .add(Migration::forward_only(1, "create", |_, _| Ok(())))
///     .build()
///     .unwrap();
///
/// let versions: Vec<i64> = set.iter().map(|m| m.version()).collect();
/// assert_eq!(versions, vec![0, 1, 2]);
/// ```
pub struct MigrationSet<C> {
    migrations: Arc<Vec<Migration<C>>>,
}

impl<C: 'static> MigrationSet<C> {
    /// Builds a set from the caller's migrations, adding the root.
    ///
    /// # Errors
    ///
    /// `InvalidMigrationSet` if a version is negative, equal to the root
    /// version, or declared twice.
    pub fn new(migrations: Vec<Migration<C>>) -> MigrateResult<MigrationSet<C>> {
        Self::with_root(Migration::root(), migrations)
    }

    pub fn builder() -> MigrationSetBuilder<C> {
        MigrationSetBuilder::new()
    }

    fn with_root(
        root: Migration<C>,
        migrations: Vec<Migration<C>>,
    ) -> MigrateResult<MigrationSet<C>> {
        if let Some(migration) = migrations.iter().find(|m| m.version() <= ROOT_VERSION) {
            log::error!(
                "Migration {} ({}) uses a reserved version",
                migration.version(),
                migration.name()
            );
            return Err(MigrateError::new(
                &format!(
                    "Migration version {} ({}) is reserved, versions must be greater than {}",
                    migration.version(),
                    migration.name(),
                    ROOT_VERSION
                ),
                ErrorKind::InvalidMigrationSet,
            ));
        }

        let mut all = Vec::with_capacity(migrations.len() + 1);
        all.push(root);
        all.extend(migrations);
        all.sort_by_key(|m| m.version());

        if let Some((first, second)) = all
            .iter()
            .tuple_windows()
            .find(|(a, b)| a.version() == b.version())
        {
            log::error!(
                "Duplicate migration version {} declared by {} and {}",
                first.version(),
                first.name(),
                second.name()
            );
            return Err(MigrateError::new(
                &format!(
                    "Duplicate migration version {} declared by {} and {}",
                    first.version(),
                    first.name(),
                    second.name()
                ),
                ErrorKind::InvalidMigrationSet,
            ));
        }

        Ok(MigrationSet {
            migrations: Arc::new(all),
        })
    }
}

impl<C> MigrationSet<C> {
    /// All migrations, root first, ascending by version.
    pub fn as_slice(&self) -> &[Migration<C>] {
        &self.migrations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Migration<C>> {
        self.migrations.iter()
    }

    /// Number of migrations including the root.
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    /// Never true, the root is always present.
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Index of the migration with `version`, if declared.
    pub fn position(&self, version: i64) -> Option<usize> {
        self.migrations
            .binary_search_by_key(&version, |m| m.version())
            .ok()
    }

    pub fn get(&self, version: i64) -> Option<&Migration<C>> {
        self.position(version).map(|index| &self.migrations[index])
    }

    pub fn contains(&self, version: i64) -> bool {
        self.position(version).is_some()
    }

    pub fn root(&self) -> &Migration<C> {
        &self.migrations[0]
    }

    /// The highest declared migration (the root when nothing else is declared).
    pub fn latest(&self) -> &Migration<C> {
        &self.migrations[self.migrations.len() - 1]
    }

    /// The migrations from the root up to and including `version`.
    pub fn up_to(&self, version: i64) -> Option<&[Migration<C>]> {
        self.position(version)
            .map(|index| &self.migrations[..=index])
    }
}

impl<C> Clone for MigrationSet<C> {
    fn clone(&self) -> Self {
        MigrationSet {
            migrations: self.migrations.clone(),
        }
    }
}

impl<C> std::fmt::Debug for MigrationSet<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.migrations.iter()).finish()
    }
}

impl<'a, C> IntoIterator for &'a MigrationSet<C> {
    type Item = &'a Migration<C>;
    type IntoIter = std::slice::Iter<'a, Migration<C>>;

    fn into_iter(self) -> Self::IntoIter {
        self.migrations.iter()
    }
}

/// Collects migrations before validating them into a [`MigrationSet`].
pub struct MigrationSetBuilder<C> {
    root_name: String,
    migrations: Vec<Migration<C>>,
}

impl<C: 'static> MigrationSetBuilder<C> {
    pub fn new() -> MigrationSetBuilder<C> {
        MigrationSetBuilder {
            root_name: ROOT_MIGRATION_NAME.to_string(),
            migrations: Vec::new(),
        }
    }

    /// Overrides the name recorded for the root migration.
    pub fn root_name(mut self, name: &str) -> Self {
        self.root_name = name.to_string();
        self
    }

    pub fn add(mut self, migration: Migration<C>) -> Self {
        self.migrations.push(migration);
        self
    }

    pub fn add_all(mut self, migrations: impl IntoIterator<Item = Migration<C>>) -> Self {
        self.migrations.extend(migrations);
        self
    }

    pub fn build(self) -> MigrateResult<MigrationSet<C>> {
        MigrationSet::with_root(Migration::root_named(&self.root_name), self.migrations)
    }
}

impl<C: 'static> Default for MigrationSetBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}
