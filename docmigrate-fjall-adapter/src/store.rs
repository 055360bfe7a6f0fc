use crate::builder::FjallLedgerStoreBuilder;
use crate::codec::{decode_index_key, index_key, to_migrate_error, version_prefix, StoredDocument};
use crate::config::FjallLedgerConfig;
use dashmap::DashMap;
use docmigrate::errors::{ErrorKind, MigrateError, MigrateResult};
use docmigrate::migration::{MigrationRecord, RecordId};
use docmigrate::store::{
    FindOptions, LedgerStoreProvider, RecordCursor, Revision, SortOrder, VersionFilter,
};
use fjall::{Keyspace, PartitionHandle, PersistMode};
use parking_lot::RwLock;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const INDEX_SEPARATOR: char = '#';
const MAX_PARTITION_NAME: usize = 255;
const INDEX_VALUE: &[u8] = &[];

/// Fjall-based ledger store.
///
/// A persistent, thread-safe ledger store backed by the fjall LSM engine.
/// Uses PIMPL pattern with `Arc<FjallLedgerStoreInner>` so clones share one
/// keyspace.
///
/// Layout:
/// - one keyspace per `db_path`
/// - one partition per ledger collection, keyed by document id
/// - one partition per index, named `<collection>#<field>`, keyed by the
///   order-preserving version bytes followed by the document id
///
/// Characteristics:
/// - Thread-safe (Arc-based, cloneable across threads)
/// - Persistent (journal synced after every write unless configured otherwise)
/// - Atomic writes (a document and its index entries go into one write batch)
/// - Revision history (purge removes the document once no revision is left)
///
/// Usage: created via `FjallLedgerStore::with_config()`, wrapped in a
/// `LedgerStore` and handed to the migrator.
#[derive(Clone)]
pub struct FjallLedgerStore {
    inner: Arc<FjallLedgerStoreInner>,
}

impl FjallLedgerStore {
    /// Creates a new builder for configuring a fjall ledger store.
    #[inline]
    pub fn with_config() -> FjallLedgerStoreBuilder {
        FjallLedgerStoreBuilder::new()
    }

    pub(crate) fn open(config: FjallLedgerConfig) -> MigrateResult<FjallLedgerStore> {
        let keyspace = Keyspace::open(config.keyspace_config()).map_err(|err| {
            log::error!("Failed to open keyspace at {}: {}", config.db_path(), err);
            to_migrate_error(err)
        })?;
        log::debug!("Opened fjall ledger keyspace at {}", config.db_path());

        Ok(FjallLedgerStore {
            inner: Arc::new(FjallLedgerStoreInner {
                keyspace,
                config,
                closed: AtomicBool::new(false),
                collections: DashMap::new(),
            }),
        })
    }

    /// Returns the store configuration.
    #[inline]
    pub fn config(&self) -> &FjallLedgerConfig {
        &self.inner.config
    }

    /// Flushes the journal and fsyncs it.
    pub fn commit(&self) -> MigrateResult<()> {
        self.inner.commit()
    }

    /// Commits and refuses every later call. Other clones see the store closed.
    pub fn close(&self) -> MigrateResult<()> {
        if self.inner.closed.swap(true, Ordering::Relaxed) {
            return Ok(());
        }
        let result = self.inner.commit();
        self.inner.collections.clear();
        result
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Relaxed)
    }

    /// Number of live documents in the collection.
    pub fn len(&self, collection: &str) -> MigrateResult<usize> {
        let partitions = self.inner.collection(collection)?;
        let mut count = 0;
        for entry in partitions.documents.iter() {
            entry.map_err(to_migrate_error)?;
            count += 1;
        }
        Ok(count)
    }

    /// Whether an index on `field` exists in the collection.
    pub fn has_index(&self, collection: &str, field: &str) -> MigrateResult<bool> {
        let partitions = self.inner.collection(collection)?;
        let exists = partitions
            .indexes
            .read()
            .iter()
            .any(|(name, _)| name == field);
        Ok(exists)
    }
}

impl LedgerStoreProvider for FjallLedgerStore {
    fn has_collection(&self, collection: &str) -> MigrateResult<bool> {
        self.inner.ensure_open()?;
        Ok(self.inner.collections.contains_key(collection)
            || self.inner.keyspace.partition_exists(collection))
    }

    fn create_collection(&self, collection: &str) -> MigrateResult<bool> {
        self.inner.create_collection(collection)
    }

    fn create_index(&self, collection: &str, field: &str) -> MigrateResult<()> {
        self.inner.create_index(collection, field)
    }

    fn find(
        &self,
        collection: &str,
        filter: VersionFilter,
        options: &FindOptions,
    ) -> MigrateResult<RecordCursor> {
        let partitions = self.inner.collection(collection)?;
        partitions.find(filter, options)
    }

    fn insert(&self, collection: &str, record: &MigrationRecord) -> MigrateResult<RecordId> {
        let mut ids = self.insert_many(collection, std::slice::from_ref(record))?;
        ids.pop().ok_or_else(|| {
            MigrateError::new("Insert returned no document id", ErrorKind::InternalError)
        })
    }

    fn insert_many(
        &self,
        collection: &str,
        records: &[MigrationRecord],
    ) -> MigrateResult<Vec<RecordId>> {
        let partitions = self.inner.collection(collection)?;
        let indexes = partitions.indexes.read();
        let mut batch = self.inner.keyspace.batch();
        let mut ids = Vec::with_capacity(records.len());

        for record in records {
            let id = RecordId::new();
            let document = StoredDocument::new(record.clone().with_id(id.clone()));
            batch.insert(&partitions.documents, id.as_str(), document.encode()?);
            for (_, index) in indexes.iter() {
                batch.insert(index, index_key(record.version(), &id), INDEX_VALUE);
            }
            ids.push(id);
        }

        batch.commit().map_err(|err| {
            log::error!("Failed to write ledger batch to {}: {}", collection, err);
            to_migrate_error(err)
        })?;
        self.inner.persist_if_configured()?;
        Ok(ids)
    }

    fn revisions(&self, collection: &str, id: &RecordId) -> MigrateResult<Vec<Revision>> {
        let partitions = self.inner.collection(collection)?;
        let document = partitions.document(id)?.ok_or_else(|| document_not_found(id))?;
        Ok(document.revisions)
    }

    fn purge_revisions(
        &self,
        collection: &str,
        id: &RecordId,
        revisions: &[Revision],
    ) -> MigrateResult<()> {
        let partitions = self.inner.collection(collection)?;
        let mut document = partitions.document(id)?.ok_or_else(|| document_not_found(id))?;
        document.revisions.retain(|rev| !revisions.contains(rev));

        let mut batch = self.inner.keyspace.batch();
        if document.revisions.is_empty() {
            batch.remove(&partitions.documents, id.as_str());
            for (_, index) in partitions.indexes.read().iter() {
                batch.remove(index, index_key(document.record.version(), id));
            }
        } else {
            batch.insert(&partitions.documents, id.as_str(), document.encode()?);
        }

        batch.commit().map_err(|err| {
            log::error!("Failed to purge document {} from {}: {}", id, collection, err);
            to_migrate_error(err)
        })?;
        self.inner.persist_if_configured()?;

        if document.revisions.is_empty() {
            log::debug!("Purged document {} and its history", id);
        }
        Ok(())
    }
}

struct FjallLedgerStoreInner {
    keyspace: Keyspace,
    config: FjallLedgerConfig,
    closed: AtomicBool,
    collections: DashMap<String, Arc<LedgerPartitions>>,
}

impl FjallLedgerStoreInner {
    fn ensure_open(&self) -> MigrateResult<()> {
        if self.closed.load(Ordering::Relaxed) {
            log::error!("Fjall ledger store is closed");
            return Err(MigrateError::new(
                "Fjall ledger store is closed",
                ErrorKind::StoreNotInitialized,
            ));
        }
        Ok(())
    }

    fn commit(&self) -> MigrateResult<()> {
        self.keyspace.persist(PersistMode::SyncAll).map_err(|err| {
            log::error!("Failed to commit keyspace: {}", err);
            to_migrate_error(err)
        })
    }

    fn persist_if_configured(&self) -> MigrateResult<()> {
        if self.config.persist_on_write() {
            self.commit()
        } else {
            Ok(())
        }
    }

    fn open_partition(&self, name: &str) -> MigrateResult<PartitionHandle> {
        self.keyspace
            .open_partition(name, self.config.partition_config())
            .map_err(|err| {
                log::error!("Failed to open partition {}: {}", name, err);
                to_migrate_error(err)
            })
    }

    fn create_collection(&self, name: &str) -> MigrateResult<bool> {
        self.ensure_open()?;
        validate_name(name, "collection")?;

        if self.collections.contains_key(name) || self.keyspace.partition_exists(name) {
            return Ok(false);
        }

        let documents = self.open_partition(name)?;
        self.collections.insert(
            name.to_string(),
            Arc::new(LedgerPartitions {
                documents,
                indexes: RwLock::new(Vec::new()),
            }),
        );
        log::debug!("Created ledger collection {}", name);
        Ok(true)
    }

    /// Opens the collection, loading indexes created by an earlier process.
    fn collection(&self, name: &str) -> MigrateResult<Arc<LedgerPartitions>> {
        self.ensure_open()?;
        if let Some(partitions) = self.collections.get(name) {
            return Ok(partitions.value().clone());
        }

        if !self.keyspace.partition_exists(name) {
            log::error!("Ledger collection {} does not exist", name);
            return Err(MigrateError::new(
                &format!("Ledger collection {} does not exist", name),
                ErrorKind::CollectionNotFound,
            ));
        }

        let documents = self.open_partition(name)?;
        let prefix = format!("{}{}", name, INDEX_SEPARATOR);
        let mut indexes = Vec::new();
        for partition in self.keyspace.list_partitions().iter() {
            let partition: &str = partition.trim();
            if let Some(field) = partition.strip_prefix(&prefix) {
                indexes.push((field.to_string(), self.open_partition(partition)?));
            }
        }

        let partitions = self
            .collections
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(LedgerPartitions {
                    documents,
                    indexes: RwLock::new(indexes),
                })
            })
            .value()
            .clone();
        Ok(partitions)
    }

    fn create_index(&self, collection: &str, field: &str) -> MigrateResult<()> {
        validate_name(field, "index field")?;
        let partitions = self.collection(collection)?;

        let mut indexes = partitions.indexes.write();
        if indexes.iter().any(|(name, _)| name == field) {
            return Ok(());
        }

        let index_name = format!("{}{}{}", collection, INDEX_SEPARATOR, field);
        if index_name.len() > MAX_PARTITION_NAME {
            return Err(invalid_name(&index_name, "index"));
        }
        let index = self.open_partition(&index_name)?;

        // entries for documents written before the index existed
        let mut batch = self.keyspace.batch();
        for entry in partitions.documents.iter() {
            let (_, value) = entry.map_err(to_migrate_error)?;
            let document = StoredDocument::decode(&value)?;
            if let Some(id) = document.record.id() {
                batch.insert(&index, index_key(document.record.version(), id), INDEX_VALUE);
            }
        }
        batch.commit().map_err(|err| {
            log::error!("Failed to build index {}: {}", index_name, err);
            to_migrate_error(err)
        })?;
        self.persist_if_configured()?;

        indexes.push((field.to_string(), index));
        log::debug!("Created index {}", index_name);
        Ok(())
    }
}

impl Drop for FjallLedgerStoreInner {
    fn drop(&mut self) {
        if self.config.commit_before_close() && !self.closed.load(Ordering::Relaxed) {
            if let Err(err) = self.keyspace.persist(PersistMode::SyncAll) {
                log::error!("Failed to commit keyspace on drop: {}", err);
            }
        }
    }
}

struct LedgerPartitions {
    documents: PartitionHandle,
    // (field, partition)
    indexes: RwLock<Vec<(String, PartitionHandle)>>,
}

impl LedgerPartitions {
    fn document(&self, id: &RecordId) -> MigrateResult<Option<StoredDocument>> {
        match self.documents.get(id.as_str()).map_err(to_migrate_error)? {
            Some(bytes) => Ok(Some(StoredDocument::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn find(&self, filter: VersionFilter, options: &FindOptions) -> MigrateResult<RecordCursor> {
        let index = self.indexes.read().first().map(|(_, index)| index.clone());
        match index {
            Some(index) => self.find_indexed(&index, filter, options),
            None => self.find_by_scan(filter, options),
        }
    }

    /// Walks the index in version order, then loads documents one at a time.
    fn find_indexed(
        &self,
        index: &PartitionHandle,
        filter: VersionFilter,
        options: &FindOptions,
    ) -> MigrateResult<RecordCursor> {
        let descending = options.sort_order() == Some(SortOrder::Descending);
        let limit = limit_of(options);

        let keys = match filter {
            VersionFilter::All => collect_keys(index.iter(), descending, limit)?,
            VersionFilter::Eq(version) => {
                collect_keys(index.prefix(version_prefix(version)), descending, limit)?
            }
            VersionFilter::GreaterThan(version) => match version.checked_add(1) {
                Some(start) => {
                    collect_keys(index.range(version_prefix(start)..), descending, limit)?
                }
                None => Vec::new(),
            },
        };

        let documents = self.documents.clone();
        Ok(RecordCursor::new(keys.into_iter().filter_map(move |id| {
            match documents.get(id.as_str()) {
                Ok(Some(bytes)) => Some(
                    StoredDocument::decode(&bytes)
                        .map(|document| document.record)
                        .map_err(MigrateError::from),
                ),
                // purged after the index walk
                Ok(None) => None,
                Err(err) => Some(Err(to_migrate_error(err))),
            }
        })))
    }

    fn find_by_scan(
        &self,
        filter: VersionFilter,
        options: &FindOptions,
    ) -> MigrateResult<RecordCursor> {
        let mut records = Vec::new();
        for entry in self.documents.iter() {
            let (_, value) = entry.map_err(to_migrate_error)?;
            let record = StoredDocument::decode(&value)?.record;
            if filter.matches(record.version()) {
                records.push(record);
            }
        }

        match options.sort_order() {
            Some(SortOrder::Ascending) => records.sort_by_key(|r| r.version()),
            Some(SortOrder::Descending) => {
                records.sort_by_key(|r| std::cmp::Reverse(r.version()))
            }
            None => {}
        }
        records.truncate(limit_of(options));
        Ok(RecordCursor::from_records(records))
    }
}

fn limit_of(options: &FindOptions) -> usize {
    options
        .limit_count()
        .map(|limit| usize::try_from(limit).unwrap_or(usize::MAX))
        .unwrap_or(usize::MAX)
}

fn collect_keys<I, K, V, E>(entries: I, descending: bool, limit: usize) -> MigrateResult<Vec<RecordId>>
where
    I: DoubleEndedIterator<Item = Result<(K, V), E>>,
    K: Deref<Target = [u8]>,
    E: std::error::Error,
{
    if descending {
        decode_ids(entries.rev().take(limit))
    } else {
        decode_ids(entries.take(limit))
    }
}

fn decode_ids<I, K, V, E>(entries: I) -> MigrateResult<Vec<RecordId>>
where
    I: Iterator<Item = Result<(K, V), E>>,
    K: Deref<Target = [u8]>,
    E: std::error::Error,
{
    entries
        .map(|entry| {
            let (key, _) = entry.map_err(to_migrate_error)?;
            let (_, id) = decode_index_key(&key)?;
            Ok(id)
        })
        .collect()
}

fn validate_name(name: &str, what: &str) -> MigrateResult<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_PARTITION_NAME
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '$'));
    if valid {
        Ok(())
    } else {
        Err(invalid_name(name, what))
    }
}

fn invalid_name(name: &str, what: &str) -> MigrateError {
    log::error!("Invalid {} name '{}'", what, name);
    MigrateError::new(
        &format!(
            "Invalid {} name '{}', only a-z A-Z 0-9 _ - . $ are allowed",
            what, name
        ),
        ErrorKind::InvalidOperation,
    )
}

fn document_not_found(id: &RecordId) -> MigrateError {
    log::error!("Document {} not found", id);
    MigrateError::new(&format!("Document {} not found", id), ErrorKind::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{cleanup, create_context, run_test};
    use docmigrate::store::{limit_to, order_by};

    const LEDGER: &str = "test_migrations";

    fn versions(cursor: RecordCursor) -> Vec<i64> {
        cursor
            .collect_records()
            .unwrap()
            .iter()
            .map(|r| r.version())
            .collect()
    }

    fn seed(store: &FjallLedgerStore, versions: &[i64]) -> Vec<RecordId> {
        versions
            .iter()
            .map(|v| store.insert(LEDGER, &MigrationRecord::new(*v, &format!("m{}", v))).unwrap())
            .collect()
    }

    #[test]
    fn test_create_collection_reports_creation() {
        run_test(
            create_context,
            |ctx| {
                let store = ctx.store();
                assert!(!store.has_collection(LEDGER).unwrap());
                assert!(store.create_collection(LEDGER).unwrap());
                assert!(!store.create_collection(LEDGER).unwrap());
                assert!(store.has_collection(LEDGER).unwrap());
            },
            cleanup,
        )
    }

    #[test]
    fn test_invalid_collection_name() {
        run_test(
            create_context,
            |ctx| {
                let store = ctx.store();
                for bad in ["", "app migrations", "app#migrations", "app/ledger"] {
                    let err = store.create_collection(bad).unwrap_err();
                    assert_eq!(err.kind(), &ErrorKind::InvalidOperation, "{}", bad);
                }
            },
            cleanup,
        )
    }

    #[test]
    fn test_missing_collection() {
        run_test(
            create_context,
            |ctx| {
                let store = ctx.store();
                let err = store
                    .find("nope", VersionFilter::All, &FindOptions::new())
                    .err()
                    .unwrap();
                assert_eq!(err.kind(), &ErrorKind::CollectionNotFound);

                let err = store.insert("nope", &MigrationRecord::new(0, "-")).unwrap_err();
                assert_eq!(err.kind(), &ErrorKind::CollectionNotFound);
            },
            cleanup,
        )
    }

    #[test]
    fn test_insert_assigns_id() {
        run_test(
            create_context,
            |ctx| {
                let store = ctx.ledger();
                let id = store.insert(LEDGER, &MigrationRecord::new(1, "one")).unwrap();
                let record = store
                    .find_one(LEDGER, VersionFilter::Eq(1), FindOptions::new())
                    .unwrap()
                    .unwrap();
                assert_eq!(record.id(), Some(&id));
                assert_eq!(record.name(), "one");
            },
            cleanup,
        )
    }

    #[test]
    fn test_find_without_index_scans() {
        run_test(
            create_context,
            |ctx| {
                let store = ctx.ledger();
                seed(&store, &[3, 0, 2, 1]);
                assert!(!store.has_index(LEDGER, "version").unwrap());

                let asc = store
                    .find(LEDGER, VersionFilter::GreaterThan(-1), &order_by(SortOrder::Ascending))
                    .unwrap();
                assert_eq!(versions(asc), vec![0, 1, 2, 3]);

                let desc = store
                    .find(
                        LEDGER,
                        VersionFilter::GreaterThan(0),
                        &order_by(SortOrder::Descending).limit(2),
                    )
                    .unwrap();
                assert_eq!(versions(desc), vec![3, 2]);
            },
            cleanup,
        )
    }

    #[test]
    fn test_find_with_index() {
        run_test(
            create_context,
            |ctx| {
                let store = ctx.ledger();
                // written before the index exists, picked up by the backfill
                seed(&store, &[3, 0]);
                store.create_index(LEDGER, "version").unwrap();
                seed(&store, &[2, 1, 300]);
                assert!(store.has_index(LEDGER, "version").unwrap());

                let asc = store
                    .find(LEDGER, VersionFilter::GreaterThan(-1), &order_by(SortOrder::Ascending))
                    .unwrap();
                assert_eq!(versions(asc), vec![0, 1, 2, 3, 300]);

                let desc = store
                    .find(LEDGER, VersionFilter::All, &order_by(SortOrder::Descending).limit(2))
                    .unwrap();
                assert_eq!(versions(desc), vec![300, 3]);

                let eq = store.find(LEDGER, VersionFilter::Eq(2), &limit_to(10)).unwrap();
                assert_eq!(versions(eq), vec![2]);

                let none = store
                    .find(LEDGER, VersionFilter::GreaterThan(i64::MAX), &FindOptions::new())
                    .unwrap();
                assert!(versions(none).is_empty());
            },
            cleanup,
        )
    }

    #[test]
    fn test_create_index_is_idempotent() {
        run_test(
            create_context,
            |ctx| {
                let store = ctx.ledger();
                seed(&store, &[0, 1]);
                store.create_index(LEDGER, "version").unwrap();
                store.create_index(LEDGER, "version").unwrap();

                let all = store
                    .find(LEDGER, VersionFilter::All, &order_by(SortOrder::Ascending))
                    .unwrap();
                assert_eq!(versions(all), vec![0, 1]);

                let err = store.create_index(LEDGER, "bad#field").unwrap_err();
                assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
            },
            cleanup,
        )
    }

    #[test]
    fn test_insert_many() {
        run_test(
            create_context,
            |ctx| {
                let store = ctx.ledger();
                store.create_index(LEDGER, "version").unwrap();
                let records: Vec<MigrationRecord> =
                    (0..4).map(|v| MigrationRecord::new(v, "m")).collect();
                let ids = store.insert_many(LEDGER, &records).unwrap();
                assert_eq!(ids.len(), 4);
                assert_eq!(store.len(LEDGER).unwrap(), 4);

                let head = store
                    .find_one(LEDGER, VersionFilter::All, order_by(SortOrder::Descending))
                    .unwrap()
                    .unwrap();
                assert_eq!(head.id(), Some(&ids[3]));
            },
            cleanup,
        )
    }

    #[test]
    fn test_purge_removes_document_and_index_entry() {
        run_test(
            create_context,
            |ctx| {
                let store = ctx.ledger();
                store.create_index(LEDGER, "version").unwrap();
                let ids = seed(&store, &[0, 1, 2]);

                let revisions = store.revisions(LEDGER, &ids[2]).unwrap();
                assert_eq!(revisions.len(), 1);
                assert_eq!(revisions[0].generation(), 1);

                store.purge(LEDGER, &ids[2]).unwrap();
                assert_eq!(store.len(LEDGER).unwrap(), 2);
                let head = store
                    .find_one(LEDGER, VersionFilter::All, order_by(SortOrder::Descending))
                    .unwrap()
                    .unwrap();
                assert_eq!(head.version(), 1);

                let err = store.revisions(LEDGER, &ids[2]).unwrap_err();
                assert_eq!(err.kind(), &ErrorKind::NotFound);
                let err = store.purge(LEDGER, &ids[2]).unwrap_err();
                assert_eq!(err.kind(), &ErrorKind::NotFound);
            },
            cleanup,
        )
    }

    #[test]
    fn test_purge_with_unknown_revision_keeps_document() {
        run_test(
            create_context,
            |ctx| {
                let store = ctx.ledger();
                let ids = seed(&store, &[1]);
                store
                    .purge_revisions(LEDGER, &ids[0], &[Revision::first()])
                    .unwrap();
                assert_eq!(store.len(LEDGER).unwrap(), 1);
            },
            cleanup,
        )
    }

    #[test]
    fn test_cursor_skips_documents_purged_mid_read() {
        run_test(
            create_context,
            |ctx| {
                let store = ctx.ledger();
                store.create_index(LEDGER, "version").unwrap();
                let ids = seed(&store, &[0, 1]);
                let cursor = store
                    .find(LEDGER, VersionFilter::All, &order_by(SortOrder::Ascending))
                    .unwrap();
                store.purge(LEDGER, &ids[1]).unwrap();
                assert_eq!(versions(cursor), vec![0]);
            },
            cleanup,
        )
    }

    #[test]
    fn test_reopen_keeps_records_and_index() {
        run_test(
            create_context,
            |ctx| {
                let path = format!("{}-reopen", ctx.path());
                {
                    let store = FjallLedgerStore::with_config().db_path(&path).build().unwrap();
                    store.create_collection(LEDGER).unwrap();
                    store.create_index(LEDGER, "version").unwrap();
                    seed(&store, &[0, 1, 2]);
                    store.close().unwrap();
                }

                let reopened = FjallLedgerStore::with_config().db_path(&path).build().unwrap();
                assert!(reopened.has_collection(LEDGER).unwrap());
                assert!(!reopened.create_collection(LEDGER).unwrap());
                assert!(reopened.has_index(LEDGER, "version").unwrap());

                let all = reopened
                    .find(LEDGER, VersionFilter::GreaterThan(0), &order_by(SortOrder::Descending))
                    .unwrap();
                assert_eq!(versions(all), vec![2, 1]);
                reopened.close().unwrap();
                drop(reopened);
                let _ = std::fs::remove_dir_all(&path);
            },
            cleanup,
        )
    }

    #[test]
    fn test_closed_store_refuses_calls() {
        run_test(
            create_context,
            |ctx| {
                let store = ctx.ledger();
                let clone = store.clone();
                store.close().unwrap();
                store.close().unwrap();
                assert!(clone.is_closed());

                let err = clone.insert(LEDGER, &MigrationRecord::new(0, "-")).unwrap_err();
                assert_eq!(err.kind(), &ErrorKind::StoreNotInitialized);
                let err = clone.has_collection(LEDGER).unwrap_err();
                assert_eq!(err.kind(), &ErrorKind::StoreNotInitialized);
            },
            cleanup,
        )
    }

    #[test]
    fn test_manual_commit() {
        run_test(
            create_context,
            |ctx| {
                let store = ctx.ledger();
                seed(&store, &[0]);
                store.commit().unwrap();
                assert_eq!(store.config().db_path(), ctx.path());
            },
            cleanup,
        )
    }
}
