use crate::migration::MigrationRecord;
use crate::ROOT_VERSION;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Name stored for the implicit version-0 migration.
pub const ROOT_MIGRATION_NAME: &str = "-";

/// A forward or backward migration body.
///
/// Receives the target-database handle and the namespace prefix the command
/// was run with. Bodies are arbitrary user code, hence the `anyhow` result.
pub type MigrationFn<C> = Arc<dyn Fn(&C, &str) -> anyhow::Result<()> + Send + Sync>;

/// A declared, versioned pair of forward/backward operations.
///
/// # Characteristics
/// - Immutable after construction
/// - Cheap to clone, the bodies are shared through `Arc`
/// - Generic over `C`, the handle of the database being migrated
///
/// # Examples
///
/// ```rust
/// use docmigrate::migration::Migration;
///
/// struct Client;
///
/// let migration: Migration<Client> = Migration::new(
///     1,
///     "create_users",
///     |_client, prefix| {
///         println!("creating {}_users", prefix);
///         Ok(())
///     },
///     |_client, prefix| {
///         println!("dropping {}_users", prefix);
///         Ok(())
///     },
/// );
/// assert_eq!(migration.version(), 1);
/// ```
pub struct Migration<C> {
    version: i64,
    name: String,
    up: MigrationFn<C>,
    down: MigrationFn<C>,
}

impl<C: 'static> Migration<C> {
    /// Creates a migration from its version, a label and both bodies.
    pub fn new<U, D>(version: i64, name: &str, up: U, down: D) -> Migration<C>
    where
        U: Fn(&C, &str) -> anyhow::Result<()> + Send + Sync + 'static,
        D: Fn(&C, &str) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Migration {
            version,
            name: name.to_string(),
            up: Arc::new(up),
            down: Arc::new(down),
        }
    }

    /// Creates a migration that cannot be rolled back by side effects; its `down` is a no-op.
    pub fn forward_only<U>(version: i64, name: &str, up: U) -> Migration<C>
    where
        U: Fn(&C, &str) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Migration::new(version, name, up, noop)
    }

    /// The implicit version-0 migration. Both bodies are no-ops.
    pub fn root() -> Migration<C> {
        Self::root_named(ROOT_MIGRATION_NAME)
    }

    pub(crate) fn root_named(name: &str) -> Migration<C> {
        Migration::new(ROOT_VERSION, name, noop, noop)
    }
}

impl<C> Migration<C> {
    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_root(&self) -> bool {
        self.version == ROOT_VERSION
    }

    /// Runs the forward body.
    pub fn up(&self, client: &C, prefix: &str) -> anyhow::Result<()> {
        (self.up)(client, prefix)
    }

    /// Runs the backward body.
    pub fn down(&self, client: &C, prefix: &str) -> anyhow::Result<()> {
        (self.down)(client, prefix)
    }

    /// Builds the ledger record written once this migration has been applied.
    pub fn to_record(&self) -> MigrationRecord {
        MigrationRecord::new(self.version, &self.name)
    }
}

impl<C> Clone for Migration<C> {
    fn clone(&self) -> Self {
        Migration {
            version: self.version,
            name: self.name.clone(),
            up: self.up.clone(),
            down: self.down.clone(),
        }
    }
}

impl<C> Debug for Migration<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.version)
            .field("name", &self.name)
            .field("up", &"<fn>")
            .field("down", &"<fn>")
            .finish()
    }
}

fn noop<C>(_client: &C, _prefix: &str) -> anyhow::Result<()> {
    Ok(())
}
