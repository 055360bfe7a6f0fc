use crate::errors::{ErrorKind, MigrateError, MigrateResult};
use crate::migration::{MigrationRecord, RecordId};
use crate::store::{
    FindOptions, LedgerStoreProvider, RecordCursor, Revision, SortOrder, VersionFilter,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// In-memory implementation of a ledger store.
///
/// # Purpose
/// Keeps ledger collections in process memory. Suitable for tests, dry runs
/// and embedding; all data is lost when the last handle is dropped.
///
/// # Characteristics
/// - **Thread-Safe**: collections live in a concurrent map, documents behind a read-write lock
/// - **Revision History**: every document carries its revisions, purge drops them all
/// - **Snapshot Queries**: a cursor sees the collection as it was when the query ran
///
/// # Usage
/// ```rust
/// use docmigrate::migration::MigrationRecord;
/// use docmigrate::store::{InMemoryLedgerStore, LedgerStoreProvider};
///
/// let store = InMemoryLedgerStore::new();
/// store.create_collection("app_migrations").unwrap();
/// let id = store.insert("app_migrations", &MigrationRecord::new(0, "-")).unwrap();
/// store.purge("app_migrations", &id).unwrap();
/// assert_eq!(store.len("app_migrations").unwrap(), 0);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryLedgerStore {
    inner: Arc<InMemoryLedgerStoreInner>,
}

impl InMemoryLedgerStore {
    pub fn new() -> InMemoryLedgerStore {
        InMemoryLedgerStore {
            inner: Arc::new(InMemoryLedgerStoreInner::new()),
        }
    }

    /// Number of live documents in the collection.
    pub fn len(&self, collection: &str) -> MigrateResult<usize> {
        let collection = self.inner.collection(collection)?;
        let size = collection.documents.read().len();
        Ok(size)
    }

    /// Whether an index on `field` exists in the collection.
    pub fn has_index(&self, collection: &str, field: &str) -> MigrateResult<bool> {
        let collection = self.inner.collection(collection)?;
        let exists = collection.indexes.read().contains(field);
        Ok(exists)
    }
}

impl LedgerStoreProvider for InMemoryLedgerStore {
    fn has_collection(&self, collection: &str) -> MigrateResult<bool> {
        Ok(self.inner.collections.contains_key(collection))
    }

    fn create_collection(&self, collection: &str) -> MigrateResult<bool> {
        self.inner.create_collection(collection)
    }

    fn create_index(&self, collection: &str, field: &str) -> MigrateResult<()> {
        let collection = self.inner.collection(collection)?;
        collection.indexes.write().insert(field.to_string());
        Ok(())
    }

    fn find(
        &self,
        collection: &str,
        filter: VersionFilter,
        options: &FindOptions,
    ) -> MigrateResult<RecordCursor> {
        let collection = self.inner.collection(collection)?;
        Ok(collection.find(filter, options))
    }

    fn insert(&self, collection: &str, record: &MigrationRecord) -> MigrateResult<RecordId> {
        let collection = self.inner.collection(collection)?;
        let mut documents = collection.documents.write();
        Ok(InMemoryCollection::insert_into(&mut documents, record))
    }

    fn insert_many(
        &self,
        collection: &str,
        records: &[MigrationRecord],
    ) -> MigrateResult<Vec<RecordId>> {
        let collection = self.inner.collection(collection)?;
        let mut documents = collection.documents.write();
        let ids = records
            .iter()
            .map(|record| InMemoryCollection::insert_into(&mut documents, record))
            .collect();
        Ok(ids)
    }

    fn revisions(&self, collection: &str, id: &RecordId) -> MigrateResult<Vec<Revision>> {
        let collection = self.inner.collection(collection)?;
        let documents = collection.documents.read();
        documents
            .get(id)
            .map(|document| document.revisions.clone())
            .ok_or_else(|| document_not_found(id))
    }

    fn purge_revisions(
        &self,
        collection: &str,
        id: &RecordId,
        revisions: &[Revision],
    ) -> MigrateResult<()> {
        let collection = self.inner.collection(collection)?;
        let mut documents = collection.documents.write();

        let document = documents.get_mut(id).ok_or_else(|| document_not_found(id))?;
        document.revisions.retain(|rev| !revisions.contains(rev));
        if document.revisions.is_empty() {
            documents.remove(id);
            log::debug!("Purged document {} and its history", id);
        }
        Ok(())
    }
}

#[derive(Default)]
struct InMemoryLedgerStoreInner {
    collections: DashMap<String, Arc<InMemoryCollection>>,
}

impl InMemoryLedgerStoreInner {
    fn new() -> InMemoryLedgerStoreInner {
        InMemoryLedgerStoreInner {
            collections: DashMap::new(),
        }
    }

    fn create_collection(&self, name: &str) -> MigrateResult<bool> {
        match self.collections.entry(name.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(InMemoryCollection::default()));
                Ok(true)
            }
        }
    }

    fn collection(&self, name: &str) -> MigrateResult<Arc<InMemoryCollection>> {
        match self.collections.get(name) {
            Some(collection) => Ok(collection.value().clone()),
            None => {
                log::error!("Ledger collection {} does not exist", name);
                Err(MigrateError::new(
                    &format!("Ledger collection {} does not exist", name),
                    ErrorKind::CollectionNotFound,
                ))
            }
        }
    }
}

struct StoredDocument {
    record: MigrationRecord,
    // newest first
    revisions: Vec<Revision>,
}

#[derive(Default)]
struct InMemoryCollection {
    documents: RwLock<BTreeMap<RecordId, StoredDocument>>,
    indexes: RwLock<HashSet<String>>,
}

impl InMemoryCollection {
    fn insert_into(
        documents: &mut BTreeMap<RecordId, StoredDocument>,
        record: &MigrationRecord,
    ) -> RecordId {
        let id = RecordId::new();
        documents.insert(
            id.clone(),
            StoredDocument {
                record: record.clone().with_id(id.clone()),
                revisions: vec![Revision::first()],
            },
        );
        id
    }

    fn find(&self, filter: VersionFilter, options: &FindOptions) -> RecordCursor {
        let mut records: Vec<MigrationRecord> = self
            .documents
            .read()
            .values()
            .filter(|document| filter.matches(document.record.version()))
            .map(|document| document.record.clone())
            .collect();

        match options.sort_order() {
            Some(SortOrder::Ascending) => records.sort_by_key(|r| r.version()),
            Some(SortOrder::Descending) => {
                records.sort_by_key(|r| std::cmp::Reverse(r.version()))
            }
            None => {}
        }

        if let Some(limit) = options.limit_count() {
            records.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }

        RecordCursor::from_records(records)
    }
}

fn document_not_found(id: &RecordId) -> MigrateError {
    log::error!("Document {} not found", id);
    MigrateError::new(
        &format!("Document {} not found", id),
        ErrorKind::NotFound,
    )
}
