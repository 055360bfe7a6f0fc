use crate::config::FjallLedgerConfig;
use crate::store::FjallLedgerStore;
use docmigrate::errors::{ErrorKind, MigrateError, MigrateResult};
use fjall::CompressionType;

/// Builder for a persistent, fjall-backed ledger store.
///
/// # Examples
///
/// ```rust,no_run
/// use docmigrate::store::LedgerStore;
/// use docmigrate_fjall_adapter::FjallLedgerStore;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = FjallLedgerStore::with_config()
///     .db_path("/var/lib/app/ledger")
///     .build()?;
/// let store = LedgerStore::new(store);
/// # Ok(())
/// # }
/// ```
///
/// # Configuration Presets
///
/// - `low_memory_preset()` - minimal caches and workers for embedded use
/// - `durable_preset()` - background fsync on top of per-write persistence
pub struct FjallLedgerStoreBuilder {
    config: FjallLedgerConfig,
}

impl FjallLedgerStoreBuilder {
    /// Creates a new builder with default configuration.
    #[inline]
    pub fn new() -> FjallLedgerStoreBuilder {
        FjallLedgerStoreBuilder {
            config: FjallLedgerConfig::new(),
        }
    }

    /// Settings for memory-constrained environments.
    ///
    /// This configures:
    /// - 4 MB block cache
    /// - 8 MB write buffer, 2 MB memtable
    /// - One flush and one compaction worker
    #[inline]
    pub fn low_memory_preset(self) -> Self {
        self.cache_capacity(4 * 1024 * 1024)
            .max_write_buffer_size(8 * 1024 * 1024)
            .max_memtable_size(2 * 1024 * 1024)
            .flush_workers(1)
            .compaction_workers(1)
    }

    /// Settings for ledgers that must survive power loss.
    ///
    /// Every write is persisted with a synced journal flush and a 100ms
    /// background fsync covers anything written around it.
    #[inline]
    pub fn durable_preset(self) -> Self {
        self.persist_on_write(true)
            .commit_before_close(true)
            .manual_journal_persist(false)
            .fsync_frequency(100)
    }

    #[inline]
    pub fn db_path(self, db_path: &str) -> Self {
        self.config.set_db_path(db_path);
        self
    }

    #[inline]
    pub fn persist_on_write(self, persist_on_write: bool) -> Self {
        self.config.set_persist_on_write(persist_on_write);
        self
    }

    #[inline]
    pub fn commit_before_close(self, commit_before_close: bool) -> Self {
        self.config.set_commit_before_close(commit_before_close);
        self
    }

    #[inline]
    pub fn manual_journal_persist(self, manual_journal_persist: bool) -> Self {
        self.config.set_manual_journal_persist(manual_journal_persist);
        self
    }

    #[inline]
    pub fn flush_workers(self, flush_workers_count: usize) -> Self {
        self.config.set_flush_workers(flush_workers_count);
        self
    }

    #[inline]
    pub fn compaction_workers(self, compaction_workers_count: usize) -> Self {
        self.config.set_compaction_workers(compaction_workers_count);
        self
    }

    #[inline]
    pub fn cache_capacity(self, cache_capacity: u64) -> Self {
        self.config.set_cache_capacity(cache_capacity);
        self
    }

    #[inline]
    pub fn max_journaling_size(self, max_journaling_size: u64) -> Self {
        self.config.set_max_journaling_size(max_journaling_size);
        self
    }

    #[inline]
    pub fn max_write_buffer_size(self, max_write_buffer_size: u64) -> Self {
        self.config.set_max_write_buffer_size(max_write_buffer_size);
        self
    }

    #[inline]
    pub fn fsync_frequency(self, fsync_frequency: u16) -> Self {
        self.config.set_fsync_frequency(fsync_frequency);
        self
    }

    /// Bits per key for partition bloom filters, capped at 127.
    #[inline]
    pub fn bloom_filter_bits(self, bloom_filter_bits: u8) -> Self {
        let bits = i8::try_from(bloom_filter_bits).unwrap_or(i8::MAX);
        self.config.set_bloom_filter_bits(bits);
        self
    }

    /// Turns bloom filters off for newly created partitions.
    #[inline]
    pub fn disable_bloom_filter(self) -> Self {
        self.config.set_bloom_filter_bits(-1);
        self
    }

    #[inline]
    pub fn compression_type(self, compression_type: CompressionType) -> Self {
        self.config.set_compression_type(compression_type);
        self
    }

    #[inline]
    pub fn max_memtable_size(self, max_memtable_size: u32) -> Self {
        self.config.set_max_memtable_size(max_memtable_size);
        self
    }

    #[inline]
    pub fn block_size(self, block_size: u32) -> Self {
        self.config.set_block_size(block_size);
        self
    }

    /// Opens (or creates) the keyspace at the configured path.
    ///
    /// # Errors
    /// `InvalidOperation` when no path was given, a store error when the
    /// keyspace cannot be opened.
    pub fn build(self) -> MigrateResult<FjallLedgerStore> {
        if self.config.db_path().trim().is_empty() {
            log::error!("Fjall ledger store requires a db path");
            return Err(MigrateError::new(
                "Fjall ledger store requires a db path",
                ErrorKind::InvalidOperation,
            ));
        }
        FjallLedgerStore::open(self.config)
    }
}

impl Default for FjallLedgerStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
