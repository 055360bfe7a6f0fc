use super::cancel::CancelToken;
use super::command::Command;
use super::config::MigratorConfig;
use super::outcome::VersionChange;
use crate::errors::{ErrorKind, MigrateError, MigrateResult};
use crate::migration::{Migration, MigrationRecord, MigrationSet};
use crate::reconcile::{correlate, merge, Target};
use crate::store::{order_by, FindOptions, LedgerStore, SortOrder, VersionFilter};
use crate::{NO_VERSION, ROOT_VERSION};
use std::sync::Arc;

/// Applies, rolls back and inspects migrations recorded in a ledger.
///
/// # Purpose
/// Combines the declared [`MigrationSet`], a [`LedgerStore`] and the
/// reconciliation functions into the six migrator commands. The migrator
/// itself holds no mutable state, the ledger is the single source of truth.
///
/// # Ledger
/// Every namespace prefix has its own ledger collection, named
/// `<prefix><ledger suffix>`, holding one record per applied migration.
///
/// # Results
/// Every command returns the [`VersionChange`] it made. Failures that happen
/// after the current version is known carry the position reached in
/// [`MigrateError::progress`]; steps committed before the failure stay in the
/// ledger and a later run resumes from there.
///
/// # Concurrency
/// Commands run sequentially on the calling thread. Nothing guards against
/// two processes driving the same ledger.
///
/// # Examples
///
/// ```rust
/// use docmigrate::migration::{Migration, MigrationSet};
/// use docmigrate::migrator::Migrator;
/// use docmigrate::store::{InMemoryLedgerStore, LedgerStore};
///
/// struct Client;
///
/// let migrations = MigrationSet::new(vec![
///     Migration::forward_only(1, "create_users", |_: &Client, _| Ok(())),
///     Migration::forward_only(2, "seed_users", |_: &Client, _| Ok(())),
/// ])
/// .unwrap();
///
/// let migrator = Migrator::new(LedgerStore::new(InMemoryLedgerStore::new()), migrations);
///
/// migrator.run(&Client, "shop", &["init"]).unwrap();
/// let change = migrator.run(&Client, "shop", &["up"]).unwrap();
/// assert_eq!((change.old_version, change.new_version), (0, 2));
/// ```
pub struct Migrator<C> {
    inner: Arc<MigratorInner<C>>,
}

impl<C> Clone for Migrator<C> {
    fn clone(&self) -> Self {
        Migrator {
            inner: self.inner.clone(),
        }
    }
}

impl<C: 'static> Migrator<C> {
    /// Creates a migrator with the default configuration.
    pub fn new(store: LedgerStore, migrations: MigrationSet<C>) -> Migrator<C> {
        Migrator {
            inner: Arc::new(MigratorInner {
                store,
                migrations,
                config: MigratorConfig::default(),
                cancel_token: None,
            }),
        }
    }

    pub fn builder() -> MigratorBuilder<C> {
        MigratorBuilder::new()
    }
}

impl<C> Migrator<C> {
    pub fn store(&self) -> &LedgerStore {
        &self.inner.store
    }

    pub fn migrations(&self) -> &MigrationSet<C> {
        &self.inner.migrations
    }

    pub fn config(&self) -> &MigratorConfig {
        &self.inner.config
    }

    /// Name of the ledger collection for a namespace prefix.
    pub fn ledger_name(&self, prefix: &str) -> String {
        self.inner.config.ledger_name(prefix)
    }

    /// Parses `args` as a command and executes it.
    ///
    /// # Errors
    ///
    /// Usage errors from [`Command::parse`] before anything is read, then
    /// whatever the command itself reports.
    pub fn run<S: AsRef<str>>(
        &self,
        client: &C,
        prefix: &str,
        args: &[S],
    ) -> MigrateResult<VersionChange> {
        let command = Command::parse(args)?;
        self.execute(client, prefix, command)
    }

    /// Executes an already parsed command.
    pub fn execute(&self, client: &C, prefix: &str, command: Command) -> MigrateResult<VersionChange> {
        log::info!("Running '{}' on {}", command, self.ledger_name(prefix));
        let result = match command {
            Command::Init => self.init(prefix),
            Command::Up(target) => self.up(client, prefix, target),
            Command::Down => self.down(client, prefix),
            Command::Reset => self.reset(client, prefix),
            Command::Version => self.version(prefix),
            Command::SetVersion(target) => self.set_version(prefix, target),
        };

        match &result {
            Ok(change) => log::info!("'{}' finished: {}", command, change),
            Err(err) => match err.progress() {
                Some(change) => log::debug!("'{}' stopped at {}: {}", command, change, err),
                None => log::debug!("'{}' stopped: {}", command, err),
            },
        }
        result
    }

    /// Creates the ledger collection and its version index if absent, then
    /// records the root migration.
    ///
    /// # Errors
    ///
    /// `LedgerAlreadyInitialized` if the ledger already holds a root record.
    pub fn init(&self, prefix: &str) -> MigrateResult<VersionChange> {
        let ledger = self.ledger_name(prefix);
        let store = &self.inner.store;

        if store.create_collection(&ledger)? {
            log::debug!("Created ledger collection {}", ledger);
        }
        store.create_index(&ledger, self.inner.config.version_field())?;

        let root = store.find_one(&ledger, VersionFilter::Eq(ROOT_VERSION), FindOptions::new())?;
        let old_version = self.head_version(&ledger)?;
        if root.is_some() {
            log::error!("Ledger {} is already initialized", ledger);
            return Err(MigrateError::new(
                &format!("Ledger {} is already initialized", ledger),
                ErrorKind::LedgerAlreadyInitialized,
            )
            .with_progress(VersionChange::unchanged(old_version)));
        }

        store.insert(&ledger, &self.inner.migrations.root().to_record())?;
        Ok(VersionChange::new(old_version, old_version.max(ROOT_VERSION)))
    }

    /// Applies every declared migration missing from the ledger up to `target`,
    /// in ascending order.
    ///
    /// Each migration is recorded right after its body succeeds. The first
    /// failure stops the run; `progress().new_version` is then the version
    /// that failed.
    pub fn up(&self, client: &C, prefix: &str, target: Target) -> MigrateResult<VersionChange> {
        let ledger = self.ledger_name(prefix);
        let history = self.history(&ledger)?;
        let old_version = history.last().map_or(NO_VERSION, |r| r.version());
        let mut change = VersionChange::unchanged(old_version);

        let plan = merge(&history, self.inner.migrations.as_slice(), target);
        log::debug!("Plan for {} up to {}: {:?}", ledger, target, plan);

        for migration in plan.iter().filter_map(|entry| entry.pending()) {
            self.check_cancelled(change)?;
            change.new_version = migration.version();
            self.apply(client, prefix, &ledger, migration)
                .map_err(|err| err.with_progress(change))?;
        }

        // a late declaration below the head does not lower the head
        change.new_version = change.new_version.max(old_version);
        Ok(change)
    }

    /// Rolls back the highest applied migration.
    ///
    /// Does nothing when only the root is applied. The new version is the
    /// declared migration just below the rolled back one.
    ///
    /// # Errors
    ///
    /// * `NoMigrations` - the ledger is empty
    /// * `MigrationsAbsent` - the highest record has no declaration
    /// * `MigrationFailed` - the down body or the purge failed
    pub fn down(&self, client: &C, prefix: &str) -> MigrateResult<VersionChange> {
        let ledger = self.ledger_name(prefix);
        let head = self.head(&ledger)?.ok_or_else(|| no_migrations(&ledger))?;
        let old_version = head.version();
        let migrations = self.inner.migrations.as_slice();

        let Some(position) = self.inner.migrations.position(old_version) else {
            log::error!(
                "Applied migration {} ({}) is not declared",
                old_version,
                head.name()
            );
            return Err(MigrateError::new(
                &format!(
                    "Applied migration {} ({}) is not declared, cannot roll it back",
                    old_version,
                    head.name()
                ),
                ErrorKind::MigrationsAbsent,
            )
            .with_progress(VersionChange::unchanged(old_version)));
        };

        if position == 0 {
            log::warn!("Ledger {} is at the root, nothing to roll back", ledger);
            return Ok(VersionChange::unchanged(old_version));
        }

        let change = VersionChange::new(old_version, migrations[position - 1].version());
        self.rollback(client, prefix, &ledger, &migrations[position], &head)
            .map_err(|err| err.with_progress(change))?;
        Ok(change)
    }

    /// Rolls back every applied migration, highest first, down to the root.
    ///
    /// The whole history is checked against the declarations before anything
    /// runs. The root record is kept.
    ///
    /// # Errors
    ///
    /// * `MigrationsAbsent` - an applied record has no declaration; nothing is touched
    /// * `MigrationFailed` - a down body or a purge failed
    /// * `Cancelled` - the cancel token was set between two steps
    pub fn reset(&self, client: &C, prefix: &str) -> MigrateResult<VersionChange> {
        let ledger = self.ledger_name(prefix);
        let history = self.history(&ledger)?;
        let Some(last) = history.last() else {
            log::warn!("Ledger {} is empty, nothing to reset", ledger);
            return Ok(VersionChange::unchanged(NO_VERSION));
        };
        let mut change = VersionChange::unchanged(last.version());

        let matched = correlate(&history, self.inner.migrations.as_slice())
            .into_matched()
            .map_err(|err| err.with_progress(change))?;

        for (index, step) in matched.iter().enumerate().rev() {
            if step.record.version() <= ROOT_VERSION {
                continue;
            }

            self.check_cancelled(change)?;
            // a ledger stamped without its root ends up empty
            change.new_version = match index {
                0 => NO_VERSION,
                _ => matched[index - 1].record.version(),
            };
            self.rollback(client, prefix, &ledger, step.migration, step.record)
                .map_err(|err| err.with_progress(change))?;
        }

        Ok(change)
    }

    /// Reports the highest applied version without changing anything.
    ///
    /// # Errors
    ///
    /// `NoMigrations` if the ledger is empty.
    pub fn version(&self, prefix: &str) -> MigrateResult<VersionChange> {
        let ledger = self.ledger_name(prefix);
        let head = self.head(&ledger)?.ok_or_else(|| no_migrations(&ledger))?;
        Ok(VersionChange::unchanged(head.version()))
    }

    /// Stamps the ledger to `target` without running any migration body.
    ///
    /// Unless the ledger is already at `target`, every record is purged, the
    /// root included, then one record per declared migration from the root
    /// up to `target` is written in a single bulk insert.
    ///
    /// # Errors
    ///
    /// * `TargetVersionNotFound` - `target` is not declared; nothing is touched
    /// * `MigrationFailed` - a purge or the bulk insert failed; the progress
    ///   then carries the head left in the ledger, `-1` once it is emptied
    pub fn set_version(&self, prefix: &str, target: i64) -> MigrateResult<VersionChange> {
        let ledger = self.ledger_name(prefix);
        let Some(stamped) = self.inner.migrations.up_to(target) else {
            log::error!("Version {} is not declared", target);
            return Err(MigrateError::new(
                &format!("Version {} is not among the declared migrations", target),
                ErrorKind::TargetVersionNotFound,
            ));
        };

        let old_version = self.head_version(&ledger)?;
        if old_version == target {
            log::info!("Ledger {} is already at version {}", ledger, target);
            return Ok(VersionChange::unchanged(old_version));
        }
        let change = VersionChange::new(old_version, target);
        let stamp_failed = |err: MigrateError| {
            log::error!("Failed to stamp ledger {} to version {}: {}", ledger, target, err);
            // the ledger may be partly purged, report what it holds now
            let reached = self.head_version(&ledger).unwrap_or(old_version);
            MigrateError::new_with_cause(
                &format!("Failed to stamp ledger {} to version {}", ledger, target),
                ErrorKind::MigrationFailed,
                err,
            )
            .with_progress(VersionChange::new(old_version, reached))
        };

        let store = &self.inner.store;
        let existing = store
            .find(&ledger, VersionFilter::All, &FindOptions::new())
            .and_then(|cursor| cursor.collect_records())
            .map_err(|err| err.with_progress(VersionChange::unchanged(old_version)))?;

        for record in &existing {
            record_id(record)
                .and_then(|id| store.purge(&ledger, id))
                .map_err(stamp_failed)?;
        }

        let records: Vec<MigrationRecord> = stamped.iter().map(|m| m.to_record()).collect();
        store.insert_many(&ledger, &records).map_err(stamp_failed)?;

        log::debug!(
            "Stamped ledger {} with {} records, replacing {}",
            ledger,
            records.len(),
            existing.len()
        );
        Ok(change)
    }

    /// The applied history, ascending by version.
    fn history(&self, ledger: &str) -> MigrateResult<Vec<MigrationRecord>> {
        self.inner
            .store
            .find(
                ledger,
                VersionFilter::GreaterThan(NO_VERSION),
                &order_by(SortOrder::Ascending),
            )?
            .collect_records()
    }

    /// The highest applied record.
    fn head(&self, ledger: &str) -> MigrateResult<Option<MigrationRecord>> {
        self.inner.store.find_one(
            ledger,
            VersionFilter::GreaterThan(NO_VERSION),
            order_by(SortOrder::Descending),
        )
    }

    fn head_version(&self, ledger: &str) -> MigrateResult<i64> {
        Ok(self.head(ledger)?.map_or(NO_VERSION, |r| r.version()))
    }

    fn apply(
        &self,
        client: &C,
        prefix: &str,
        ledger: &str,
        migration: &Migration<C>,
    ) -> MigrateResult<()> {
        log::info!(
            "Applying migration {} ({})",
            migration.version(),
            migration.name()
        );
        migration
            .up(client, prefix)
            .map_err(|err| body_failed("Migration", migration, err))?;

        self.inner
            .store
            .insert(ledger, &migration.to_record())
            .map_err(|err| not_recorded("applied", migration, err))?;
        Ok(())
    }

    fn rollback(
        &self,
        client: &C,
        prefix: &str,
        ledger: &str,
        migration: &Migration<C>,
        record: &MigrationRecord,
    ) -> MigrateResult<()> {
        log::info!(
            "Rolling back migration {} ({})",
            migration.version(),
            migration.name()
        );
        migration
            .down(client, prefix)
            .map_err(|err| body_failed("Rollback of migration", migration, err))?;

        record_id(record)
            .and_then(|id| self.inner.store.purge(ledger, id))
            .map_err(|err| not_recorded("rolled back", migration, err))?;
        Ok(())
    }

    fn check_cancelled(&self, change: VersionChange) -> MigrateResult<()> {
        match &self.inner.cancel_token {
            Some(token) if token.is_cancelled() => {
                log::warn!("Run cancelled at {}", change);
                Err(MigrateError::new("Run cancelled", ErrorKind::Cancelled).with_progress(change))
            }
            _ => Ok(()),
        }
    }
}

struct MigratorInner<C> {
    store: LedgerStore,
    migrations: MigrationSet<C>,
    config: MigratorConfig,
    cancel_token: Option<CancelToken>,
}

/// Fluent construction of a [`Migrator`].
///
/// Invalid settings are remembered and reported by [`MigratorBuilder::build`].
///
/// # Examples
///
/// ```rust
/// use docmigrate::migration::MigrationSet;
/// use docmigrate::migrator::{CancelToken, Migrator};
/// use docmigrate::store::{InMemoryLedgerStore, LedgerStore};
///
/// let migrator = Migrator::<()>::builder()
///     .store(LedgerStore::new(InMemoryLedgerStore::new()))
///     .migrations(MigrationSet::new(vec![]).unwrap())
///     .ledger_suffix("_ledger")
///     .cancel_token(CancelToken::new())
///     .build()
///     .unwrap();
/// assert_eq!(migrator.ledger_name("app"), "app_ledger");
/// ```
pub struct MigratorBuilder<C> {
    store: Option<LedgerStore>,
    migrations: Option<MigrationSet<C>>,
    ledger_suffix: Option<String>,
    version_field: Option<String>,
    config: Option<MigratorConfig>,
    cancel_token: Option<CancelToken>,
}

impl<C: 'static> MigratorBuilder<C> {
    pub fn new() -> MigratorBuilder<C> {
        MigratorBuilder {
            store: None,
            migrations: None,
            ledger_suffix: None,
            version_field: None,
            config: None,
            cancel_token: None,
        }
    }

    pub fn store(mut self, store: LedgerStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn migrations(mut self, migrations: MigrationSet<C>) -> Self {
        self.migrations = Some(migrations);
        self
    }

    /// Uses `config` as the base; explicit suffix or field settings still win.
    pub fn config(mut self, config: MigratorConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn ledger_suffix(mut self, suffix: &str) -> Self {
        self.ledger_suffix = Some(suffix.to_string());
        self
    }

    pub fn version_field(mut self, field: &str) -> Self {
        self.version_field = Some(field.to_string());
        self
    }

    /// Lets `up` and `reset` be stopped between two steps.
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// # Errors
    ///
    /// `InvalidOperation` if the store or the migrations are missing, or a
    /// configured name is empty.
    pub fn build(self) -> MigrateResult<Migrator<C>> {
        let store = self.store.ok_or_else(|| missing("ledger store"))?;
        let migrations = self.migrations.ok_or_else(|| missing("migration set"))?;

        let base = self.config.unwrap_or_default();
        let config = match (self.ledger_suffix, self.version_field) {
            (None, None) => base,
            (suffix, field) => MigratorConfig::new(
                suffix.as_deref().unwrap_or(base.ledger_suffix()),
                field.as_deref().unwrap_or(base.version_field()),
            )?,
        };

        Ok(Migrator {
            inner: Arc::new(MigratorInner {
                store,
                migrations,
                config,
                cancel_token: self.cancel_token,
            }),
        })
    }
}

impl<C: 'static> Default for MigratorBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

fn missing(what: &str) -> MigrateError {
    log::error!("Cannot build a migrator without a {}", what);
    MigrateError::new(
        &format!("Cannot build a migrator without a {}", what),
        ErrorKind::InvalidOperation,
    )
}

fn no_migrations(ledger: &str) -> MigrateError {
    log::error!("Ledger {} holds no applied migrations", ledger);
    MigrateError::new(
        &format!("Ledger {} holds no applied migrations", ledger),
        ErrorKind::NoMigrations,
    )
    .with_progress(VersionChange::default())
}

fn record_id(record: &MigrationRecord) -> MigrateResult<&crate::migration::RecordId> {
    record.id().ok_or_else(|| {
        log::error!("Ledger record {} has no id", record.version());
        MigrateError::new(
            &format!("Ledger record {} has no id", record.version()),
            ErrorKind::InternalError,
        )
    })
}

fn body_failed<C>(what: &str, migration: &Migration<C>, err: anyhow::Error) -> MigrateError {
    log::error!(
        "{} {} ({}) failed: {:#}",
        what,
        migration.version(),
        migration.name(),
        err
    );
    MigrateError::new_with_cause(
        &format!(
            "{} {} ({}) failed",
            what,
            migration.version(),
            migration.name()
        ),
        ErrorKind::MigrationFailed,
        MigrateError::from(err),
    )
}

fn not_recorded<C>(done: &str, migration: &Migration<C>, err: MigrateError) -> MigrateError {
    log::error!(
        "Migration {} ({}) was {} but the ledger was not updated: {}",
        migration.version(),
        migration.name(),
        done,
        err
    );
    MigrateError::new_with_cause(
        &format!(
            "Migration {} ({}) was {} but the ledger was not updated",
            migration.version(),
            migration.name(),
            done
        ),
        ErrorKind::MigrationFailed,
        err,
    )
}
