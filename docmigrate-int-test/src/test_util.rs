use anyhow::bail;
use docmigrate::errors::{ErrorKind, MigrateError, MigrateResult};
use docmigrate::migration::{Migration, MigrationRecord, MigrationSet, RecordId};
use docmigrate::migrator::{CancelToken, Migrator};
use docmigrate::store::{
    order_by, FindOptions, LedgerStore, LedgerStoreProvider, RecordCursor, Revision, SortOrder,
    VersionFilter,
};
use docmigrate_fjall_adapter::FjallLedgerStore;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::{env, fs, thread};

/// Runs a test with retry logic and error handling.
///
/// Tests run on the current thread; a failed attempt still runs `after` so
/// keyspace directories do not pile up.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> MigrateResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> MigrateResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> MigrateResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    const MAX_RETRIES: u32 = 3;
    let mut last_error: Option<String> = None;

    for attempt in 1..=MAX_RETRIES {
        let start_time = Instant::now();

        let result = std::panic::catch_unwind(|| match before() {
            Ok(ctx) => match test(ctx.clone()) {
                Ok(_) => after(ctx).map_err(|e| format!("After run failed: {:?}", e)),
                Err(e) => {
                    let _ = after(ctx);
                    Err(format!("Test failed: {:?}", e))
                }
            },
            Err(e) => Err(format!("Before run failed: {:?}", e)),
        });

        let error = match result {
            Ok(Ok(_)) => return,
            Ok(Err(e)) => e,
            Err(panic_err) => {
                let err_msg = if let Some(s) = panic_err.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_err.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                format!("Panic: {}", err_msg)
            }
        };

        if attempt < MAX_RETRIES {
            eprintln!(
                "\n========== Test Attempt {}/{} Failed (took {:?}) ==========",
                attempt,
                MAX_RETRIES,
                start_time.elapsed()
            );
            eprintln!("Error: {}", error);
            eprintln!("Retrying in {}ms...\n", 100 * attempt);
            thread::sleep(Duration::from_millis(100 * attempt as u64));
        }
        last_error = Some(error);
    }

    panic!(
        "Test failed after {} attempts. Last error: {}",
        MAX_RETRIES,
        last_error.unwrap_or_default()
    );
}

/// Stand-in for the database being migrated.
///
/// Migration bodies create and drop collections here; every body call is
/// logged as `up:<version>` or `down:<version>` so tests can assert exactly
/// what ran. Calls listed with [`TargetDb::fail_on`] fail instead.
#[derive(Clone, Default)]
pub struct TargetDb {
    inner: Arc<TargetDbInner>,
}

#[derive(Default)]
struct TargetDbInner {
    collections: Mutex<BTreeSet<String>>,
    calls: Mutex<Vec<String>>,
    failing: Mutex<BTreeSet<String>>,
    on_call: Mutex<Option<Box<dyn Fn(&str) + Send>>>,
}

impl TargetDb {
    pub fn new() -> TargetDb {
        TargetDb::default()
    }

    /// Makes the body call named `call` (for example `up:3`) fail.
    pub fn fail_on(&self, call: &str) {
        self.inner.failing.lock().insert(call.to_string());
    }

    /// Clears every injected failure.
    pub fn heal(&self) {
        self.inner.failing.lock().clear();
    }

    /// Registers a hook run after every successful body call.
    pub fn on_call<F: Fn(&str) + Send + 'static>(&self, hook: F) {
        *self.inner.on_call.lock() = Some(Box::new(hook));
    }

    pub fn collections(&self) -> Vec<String> {
        self.inner.collections.lock().iter().cloned().collect()
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.inner.collections.lock().contains(name)
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.inner.calls.lock().clear();
    }

    fn call(&self, call: String) -> anyhow::Result<()> {
        if self.inner.failing.lock().contains(&call) {
            bail!("injected failure in {}", call);
        }
        self.inner.calls.lock().push(call.clone());
        if let Some(hook) = self.inner.on_call.lock().as_ref() {
            hook(&call);
        }
        Ok(())
    }

    fn create_collection(&self, name: String) {
        self.inner.collections.lock().insert(name);
    }

    fn drop_collection(&self, name: &str) {
        self.inner.collections.lock().remove(name);
    }
}

/// A migration creating `<prefix>_<collection>` on the way up and dropping it
/// on the way down.
pub fn collection_migration(version: i64, collection: &str) -> Migration<TargetDb> {
    let up_name = collection.to_string();
    let down_name = collection.to_string();
    Migration::new(
        version,
        &format!("create_{}", collection),
        move |db: &TargetDb, prefix: &str| {
            db.call(format!("up:{}", version))?;
            db.create_collection(format!("{}_{}", prefix, up_name));
            Ok(())
        },
        move |db: &TargetDb, prefix: &str| {
            db.call(format!("down:{}", version))?;
            db.drop_collection(&format!("{}_{}", prefix, down_name));
            Ok(())
        },
    )
}

/// Versions 1 to 4: users, orders, invoices, audit.
pub fn standard_migrations() -> MigrationSet<TargetDb> {
    migrations_for(&[(1, "users"), (2, "orders"), (3, "invoices"), (4, "audit")])
}

pub fn migrations_for(declared: &[(i64, &str)]) -> MigrationSet<TargetDb> {
    MigrationSet::new(
        declared
            .iter()
            .map(|(version, collection)| collection_migration(*version, collection))
            .collect(),
    )
    .expect("invalid test migration set")
}

#[derive(Clone)]
pub struct TestContext {
    path: String,
    store: LedgerStore,
    fjall: Option<FjallLedgerStore>,
    db: TargetDb,
}

impl TestContext {
    pub fn new(path: String, store: LedgerStore, fjall: Option<FjallLedgerStore>) -> Self {
        Self {
            path,
            store,
            fjall,
            db: TargetDb::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn store(&self) -> LedgerStore {
        self.store.clone()
    }

    pub fn db(&self) -> TargetDb {
        self.db.clone()
    }

    pub fn migrator(&self, migrations: MigrationSet<TargetDb>) -> Migrator<TargetDb> {
        Migrator::new(self.store(), migrations)
    }

    pub fn cancellable_migrator(
        &self,
        migrations: MigrationSet<TargetDb>,
        token: CancelToken,
    ) -> MigrateResult<Migrator<TargetDb>> {
        Migrator::builder()
            .store(self.store())
            .migrations(migrations)
            .cancel_token(token)
            .build()
    }

    /// The versions recorded in a ledger, ascending.
    pub fn ledger_versions(&self, ledger: &str) -> MigrateResult<Vec<i64>> {
        ledger_versions(&self.store, ledger)
    }
}

pub fn ledger_versions(store: &LedgerStore, ledger: &str) -> MigrateResult<Vec<i64>> {
    let records = store
        .find(ledger, VersionFilter::All, &order_by(SortOrder::Ascending))?
        .collect_records()?;
    Ok(records.iter().map(|r| r.version()).collect())
}

pub fn random_path() -> String {
    let id = uuid::Uuid::new_v4();
    env::temp_dir().join(id.to_string()).to_string_lossy().into_owned()
}

#[cfg(not(feature = "memory"))]
pub fn create_test_context() -> MigrateResult<TestContext> {
    const MAX_ATTEMPTS: u32 = 3;
    let mut last_error: Option<MigrateError> = None;

    for attempt in 1..=MAX_ATTEMPTS {
        let path = random_path();
        if std::path::Path::new(&path).exists() {
            let _ = fs::remove_dir_all(&path);
        }

        match FjallLedgerStore::with_config()
            .db_path(&path)
            .low_memory_preset()
            .build()
        {
            Ok(store) => {
                return Ok(TestContext::new(
                    path,
                    LedgerStore::new(store.clone()),
                    Some(store),
                ));
            }
            Err(e) => {
                let _ = fs::remove_dir_all(&path);
                if attempt < MAX_ATTEMPTS {
                    eprintln!(
                        "Warning: Failed to create test context (attempt {}/{}): {:?}",
                        attempt, MAX_ATTEMPTS, e
                    );
                    thread::sleep(Duration::from_millis(50 * attempt as u64));
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        MigrateError::new("Failed to create test context", ErrorKind::InternalError)
    }))
}

#[cfg(feature = "memory")]
pub fn create_test_context() -> MigrateResult<TestContext> {
    use docmigrate::store::InMemoryLedgerStore;

    Ok(TestContext::new(
        random_path(),
        LedgerStore::new(InMemoryLedgerStore::new()),
        None,
    ))
}

pub fn cleanup(ctx: TestContext) -> MigrateResult<()> {
    if let Some(store) = &ctx.fjall {
        if let Err(e) = store.close() {
            log::warn!("Failed to close ledger store: {:?}", e);
        }
    }

    let path = ctx.path().to_string();
    drop(ctx);
    if !std::path::Path::new(&path).exists() {
        return Ok(());
    }

    let mut delay_ms = 20u64;
    for _ in 0..5 {
        match fs::remove_dir_all(&path) {
            Ok(_) => return Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(_) => {
                thread::sleep(Duration::from_millis(delay_ms));
                delay_ms *= 2;
            }
        }
    }
    log::warn!("Failed to remove test data at {}", path);
    Ok(())
}

/// A ledger store that fails on demand, delegating to a real one otherwise.
///
/// Used to simulate the store going away between a migration body and its
/// ledger write.
#[derive(Clone)]
pub struct FlakyStore {
    inner: Arc<FlakyStoreInner>,
}

struct FlakyStoreInner {
    store: LedgerStore,
    // inserts allowed before failing, usize::MAX for never
    inserts_left: AtomicUsize,
    fail_purge: AtomicBool,
}

impl FlakyStore {
    pub fn new(store: LedgerStore) -> FlakyStore {
        FlakyStore {
            inner: Arc::new(FlakyStoreInner {
                store,
                inserts_left: AtomicUsize::new(usize::MAX),
                fail_purge: AtomicBool::new(false),
            }),
        }
    }

    /// Lets `count` more inserts through, then fails every insert.
    pub fn fail_inserts_after(&self, count: usize) {
        self.inner.inserts_left.store(count, Ordering::SeqCst);
    }

    pub fn fail_purges(&self, fail: bool) {
        self.inner.fail_purge.store(fail, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.fail_inserts_after(usize::MAX);
        self.fail_purges(false);
    }

    fn take_insert(&self) -> MigrateResult<()> {
        let allowed = self
            .inner
            .inserts_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                usize::MAX => Some(usize::MAX),
                left => Some(left - 1),
            })
            .is_ok();
        if allowed {
            Ok(())
        } else {
            Err(MigrateError::new("injected insert failure", ErrorKind::BackendError))
        }
    }
}

impl LedgerStoreProvider for FlakyStore {
    fn has_collection(&self, collection: &str) -> MigrateResult<bool> {
        self.inner.store.has_collection(collection)
    }

    fn create_collection(&self, collection: &str) -> MigrateResult<bool> {
        self.inner.store.create_collection(collection)
    }

    fn create_index(&self, collection: &str, field: &str) -> MigrateResult<()> {
        self.inner.store.create_index(collection, field)
    }

    fn find(
        &self,
        collection: &str,
        filter: VersionFilter,
        options: &FindOptions,
    ) -> MigrateResult<RecordCursor> {
        self.inner.store.find(collection, filter, options)
    }

    fn insert(&self, collection: &str, record: &MigrationRecord) -> MigrateResult<RecordId> {
        self.take_insert()?;
        self.inner.store.insert(collection, record)
    }

    fn insert_many(
        &self,
        collection: &str,
        records: &[MigrationRecord],
    ) -> MigrateResult<Vec<RecordId>> {
        self.take_insert()?;
        self.inner.store.insert_many(collection, records)
    }

    fn revisions(&self, collection: &str, id: &RecordId) -> MigrateResult<Vec<Revision>> {
        self.inner.store.revisions(collection, id)
    }

    fn purge_revisions(
        &self,
        collection: &str,
        id: &RecordId,
        revisions: &[Revision],
    ) -> MigrateResult<()> {
        if self.inner.fail_purge.load(Ordering::SeqCst) {
            return Err(MigrateError::new("injected purge failure", ErrorKind::BackendError));
        }
        self.inner.store.purge_revisions(collection, id, revisions)
    }
}
