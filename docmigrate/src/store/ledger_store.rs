use crate::errors::MigrateResult;
use crate::migration::{MigrationRecord, RecordId};
use crate::store::{FindOptions, RecordCursor, Revision, VersionFilter};
use std::ops::Deref;
use std::sync::Arc;

/// Capabilities the migrator needs from the document database holding the ledger.
///
/// # Purpose
/// Narrow contract implemented by store adapters. The migrator never builds
/// store-specific queries; it only filters on the version field, sorts by
/// version and limits.
///
/// # Atomicity
/// Each call must either take full effect or none at all. Nothing spans two
/// calls: running a migration and recording it are separate steps, and the
/// migrator is written so the ledger is always a valid resume point.
///
/// # Implementations
/// - `InMemoryLedgerStore`: in-process store for tests and dry runs
/// - `FjallLedgerStore` (in `docmigrate-fjall-adapter`): persistent store
pub trait LedgerStoreProvider: Send + Sync {
    /// Checks if the collection exists.
    fn has_collection(&self, collection: &str) -> MigrateResult<bool>;

    /// Creates the collection if it is absent.
    ///
    /// # Returns
    /// * `Ok(true)` if the collection was created
    /// * `Ok(false)` if it already existed
    fn create_collection(&self, collection: &str) -> MigrateResult<bool>;

    /// Creates an index on `field`; does nothing if the index already exists.
    fn create_index(&self, collection: &str, field: &str) -> MigrateResult<()>;

    /// Queries records matching `filter`.
    ///
    /// # Errors
    /// `CollectionNotFound` if the collection does not exist.
    fn find(
        &self,
        collection: &str,
        filter: VersionFilter,
        options: &FindOptions,
    ) -> MigrateResult<RecordCursor>;

    /// Inserts one record and returns the id the store assigned to it.
    fn insert(&self, collection: &str, record: &MigrationRecord) -> MigrateResult<RecordId>;

    /// Inserts all records in one call, all or nothing.
    fn insert_many(
        &self,
        collection: &str,
        records: &[MigrationRecord],
    ) -> MigrateResult<Vec<RecordId>>;

    /// Fetches the revision history of a document, newest first.
    ///
    /// # Errors
    /// `NotFound` if no document has this id.
    fn revisions(&self, collection: &str, id: &RecordId) -> MigrateResult<Vec<Revision>>;

    /// Permanently removes the listed revisions of a document. The document
    /// disappears once no revision is left.
    fn purge_revisions(
        &self,
        collection: &str,
        id: &RecordId,
        revisions: &[Revision],
    ) -> MigrateResult<()>;

    /// Hard-deletes a document together with its whole revision history.
    fn purge(&self, collection: &str, id: &RecordId) -> MigrateResult<()> {
        let revisions = self.revisions(collection, id)?;
        self.purge_revisions(collection, id, &revisions)
    }

    /// Returns the first record of the query, if any.
    fn find_one(
        &self,
        collection: &str,
        filter: VersionFilter,
        options: FindOptions,
    ) -> MigrateResult<Option<MigrationRecord>> {
        let mut cursor = self.find(collection, filter, &options.limit(1))?;
        cursor.next().transpose()
    }
}

/// Shared handle to a ledger store adapter.
///
/// Cloning is cheap, every clone points at the same adapter. Dereferences to
/// the provider so its methods can be called directly.
///
/// # Examples
///
/// ```rust
/// use docmigrate::store::{InMemoryLedgerStore, LedgerStore};
///
/// let store = LedgerStore::new(InMemoryLedgerStore::new());
/// assert!(store.create_collection("app_migrations").unwrap());
/// assert!(store.has_collection("app_migrations").unwrap());
/// ```
#[derive(Clone)]
pub struct LedgerStore {
    inner: Arc<dyn LedgerStoreProvider>,
}

impl LedgerStore {
    pub fn new<T: LedgerStoreProvider + 'static>(inner: T) -> Self {
        LedgerStore {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for LedgerStore {
    type Target = Arc<dyn LedgerStoreProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
