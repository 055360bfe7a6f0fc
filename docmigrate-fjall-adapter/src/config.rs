use fjall::{CompressionType, Config, PartitionCreateOptions};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicI8, AtomicU16, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

/// Fjall ledger store configuration.
///
/// A cloneable, thread-safe holder of the keyspace and partition tuning used
/// by [`crate::FjallLedgerStore`]. Uses `Arc<FjallLedgerConfigInner>` so every
/// clone sees the same values.
///
/// Characteristics:
/// - Thread-safe (atomics, one lock for the compression type)
/// - Cloneable (Arc-based, cheap clones)
/// - Sized for ledgers: a handful of small documents per collection
///
/// Usage: configured through `FjallLedgerStore::with_config()`, read back
/// through the getters.
#[derive(Clone)]
pub struct FjallLedgerConfig {
    inner: Arc<FjallLedgerConfigInner>,
}

impl Default for FjallLedgerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl FjallLedgerConfig {
    /// Creates a configuration with default values:
    /// - Cache: 16 MB
    /// - Write buffer: 16 MB, memtable: 8 MB
    /// - Max journaling size: 64 MB
    /// - Bloom filter: 10 bits per key
    /// - Persist on write: enabled
    /// - Compression: LZ4
    #[inline]
    pub fn new() -> FjallLedgerConfig {
        FjallLedgerConfig {
            inner: Arc::new(FjallLedgerConfigInner::new()),
        }
    }

    /// Translates this configuration to fjall's keyspace config.
    pub(crate) fn keyspace_config(&self) -> Config {
        let mut config = Config::new(self.db_path());
        config = config
            .manual_journal_persist(self.manual_journal_persist())
            .flush_workers(self.flush_workers())
            .compaction_workers(self.compaction_workers())
            .cache_size(self.cache_capacity())
            .max_journaling_size(self.max_journaling_size())
            .max_write_buffer_size(self.max_write_buffer_size());

        if self.fsync_frequency() > 0 {
            config = config.fsync_ms(Some(self.fsync_frequency()));
        }
        config
    }

    /// Translates this configuration to fjall's partition options.
    pub(crate) fn partition_config(&self) -> PartitionCreateOptions {
        PartitionCreateOptions::default()
            .bloom_filter_bits(match self.bloom_filter_bits() {
                bits if bits < 0 => None,
                bits => Some(bits as u8),
            })
            .compression(self.compression_type())
            .max_memtable_size(self.max_memtable_size())
            .block_size(self.block_size())
    }

    #[inline]
    pub fn db_path(&self) -> &str {
        self.inner.db_path.get().map(String::as_str).unwrap_or("")
    }

    /// Sets the keyspace directory. Only the first call takes effect.
    #[inline]
    pub(crate) fn set_db_path(&self, db_path: &str) {
        self.inner.db_path.get_or_init(|| db_path.to_string());
    }

    /// Whether every write is followed by a synced journal flush.
    #[inline]
    pub fn persist_on_write(&self) -> bool {
        self.inner.persist_on_write.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_persist_on_write(&self, v: bool) {
        self.inner.persist_on_write.store(v, Ordering::Relaxed)
    }

    /// Whether the journal is synced when the store is dropped.
    #[inline]
    pub fn commit_before_close(&self) -> bool {
        self.inner.commit_before_close.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_commit_before_close(&self, v: bool) {
        self.inner.commit_before_close.store(v, Ordering::Relaxed)
    }

    #[inline]
    pub fn manual_journal_persist(&self) -> bool {
        self.inner.manual_journal_persist.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_manual_journal_persist(&self, v: bool) {
        self.inner.manual_journal_persist.store(v, Ordering::Relaxed)
    }

    /// Background fsync interval in milliseconds, 0 disables it.
    #[inline]
    pub fn fsync_frequency(&self) -> u16 {
        self.inner.fsync_frequency.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_fsync_frequency(&self, f: u16) {
        self.inner.fsync_frequency.store(f, Ordering::Relaxed)
    }

    /// Bloom filter bits per key, negative disables the filter.
    #[inline]
    pub fn bloom_filter_bits(&self) -> i8 {
        self.inner.bloom_filter_bits.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_bloom_filter_bits(&self, b: i8) {
        self.inner.bloom_filter_bits.store(b, Ordering::Relaxed)
    }

    #[inline]
    pub fn flush_workers(&self) -> usize {
        self.inner.flush_workers.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_flush_workers(&self, c: usize) {
        self.inner.flush_workers.store(c, Ordering::Relaxed)
    }

    #[inline]
    pub fn compaction_workers(&self) -> usize {
        self.inner.compaction_workers.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_compaction_workers(&self, c: usize) {
        self.inner.compaction_workers.store(c, Ordering::Relaxed)
    }

    #[inline]
    pub fn cache_capacity(&self) -> u64 {
        self.inner.cache_capacity.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_cache_capacity(&self, c: u64) {
        self.inner.cache_capacity.store(c, Ordering::Relaxed)
    }

    #[inline]
    pub fn max_journaling_size(&self) -> u64 {
        self.inner.max_journaling_size.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_max_journaling_size(&self, s: u64) {
        self.inner.max_journaling_size.store(s, Ordering::Relaxed)
    }

    #[inline]
    pub fn max_write_buffer_size(&self) -> u64 {
        self.inner.max_write_buffer_size.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_max_write_buffer_size(&self, s: u64) {
        self.inner.max_write_buffer_size.store(s, Ordering::Relaxed)
    }

    #[inline]
    pub fn max_memtable_size(&self) -> u32 {
        self.inner.max_memtable_size.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_max_memtable_size(&self, s: u32) {
        self.inner.max_memtable_size.store(s, Ordering::Relaxed)
    }

    #[inline]
    pub fn block_size(&self) -> u32 {
        self.inner.block_size.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_block_size(&self, s: u32) {
        self.inner.block_size.store(s, Ordering::Relaxed)
    }

    #[inline]
    pub fn compression_type(&self) -> CompressionType {
        self.inner.compression_type.read().clone()
    }

    #[inline]
    pub(crate) fn set_compression_type(&self, ct: CompressionType) {
        *self.inner.compression_type.write() = ct;
    }
}

struct FjallLedgerConfigInner {
    db_path: OnceLock<String>,
    persist_on_write: AtomicBool,
    commit_before_close: AtomicBool,
    manual_journal_persist: AtomicBool,
    fsync_frequency: AtomicU16,
    bloom_filter_bits: AtomicI8,
    flush_workers: AtomicUsize,
    compaction_workers: AtomicUsize,
    cache_capacity: AtomicU64,
    max_journaling_size: AtomicU64,
    max_write_buffer_size: AtomicU64,
    max_memtable_size: AtomicU32,
    block_size: AtomicU32,
    compression_type: RwLock<CompressionType>,
}

impl FjallLedgerConfigInner {
    const DEFAULT_CACHE_MB: u64 = 16;
    const DEFAULT_WRITE_BUFFER_MB: u64 = 16;
    const DEFAULT_MAX_JOURNALING_MB: u64 = 64;
    const DEFAULT_MEMTABLE_MB: u32 = 8;

    fn new() -> FjallLedgerConfigInner {
        let cpus = std::thread::available_parallelism()
            .map(usize::from)
            .unwrap_or(2);

        FjallLedgerConfigInner {
            db_path: OnceLock::new(),
            persist_on_write: AtomicBool::new(true),
            commit_before_close: AtomicBool::new(true),
            manual_journal_persist: AtomicBool::new(false),
            fsync_frequency: AtomicU16::new(0),
            bloom_filter_bits: AtomicI8::new(10),
            // ledgers see little traffic, a couple of workers is plenty
            flush_workers: AtomicUsize::new(cpus.clamp(1, 2)),
            compaction_workers: AtomicUsize::new(1),
            cache_capacity: AtomicU64::new(Self::DEFAULT_CACHE_MB * 1_024 * 1_024),
            max_journaling_size: AtomicU64::new(Self::DEFAULT_MAX_JOURNALING_MB * 1_024 * 1_024),
            max_write_buffer_size: AtomicU64::new(Self::DEFAULT_WRITE_BUFFER_MB * 1_024 * 1_024),
            max_memtable_size: AtomicU32::new(Self::DEFAULT_MEMTABLE_MB * 1_024 * 1_024),
            block_size: AtomicU32::new(4 * 1_024),
            compression_type: RwLock::new(CompressionType::Lz4),
        }
    }
}
