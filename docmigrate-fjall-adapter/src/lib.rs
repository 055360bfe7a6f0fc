//! Persistent ledger store for `docmigrate`, backed by the fjall LSM keyspace.
//!
//! ```rust,no_run
//! use docmigrate::store::LedgerStore;
//! use docmigrate_fjall_adapter::FjallLedgerStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = FjallLedgerStore::with_config()
//!     .low_memory_preset()
//!     .db_path("/var/lib/app/ledger")
//!     .build()?;
//! let store = LedgerStore::new(store);
//! # Ok(())
//! # }
//! ```

mod builder;
mod codec;
mod config;
mod store;

pub use builder::*;
pub use codec::LedgerCodecError;
pub use config::*;
pub use store::*;

#[cfg(test)]
mod tests {
    use crate::store::FjallLedgerStore;
    use docmigrate::store::LedgerStoreProvider;
    use std::mem;

    pub const LEDGER: &str = "test_migrations";

    #[ctor::ctor]
    fn init() {
        colog::init();
    }

    #[derive(Clone)]
    pub struct Context {
        path: String,
        store: Option<FjallLedgerStore>,
    }

    impl Context {
        pub fn new(path: String, store: Option<FjallLedgerStore>) -> Self {
            Context { path, store }
        }

        pub fn path(&self) -> String {
            self.path.clone()
        }

        /// The store with no collection created yet.
        pub fn store(&self) -> FjallLedgerStore {
            self.store.clone().expect("FjallLedgerStore not available")
        }

        /// The store with the test ledger collection in place.
        pub fn ledger(&self) -> FjallLedgerStore {
            let store = self.store();
            store
                .create_collection(LEDGER)
                .expect("failed to create test ledger");
            store
        }
    }

    impl Drop for Context {
        fn drop(&mut self) {
            if let Some(store) = mem::take(&mut self.store) {
                if let Err(e) = store.close() {
                    log::error!("Failed to close FjallLedgerStore during cleanup: {}", e);
                }
            }
        }
    }

    pub fn random_path() -> String {
        let id = uuid::Uuid::new_v4();
        format!("../test-data/{}", id)
    }

    pub fn create_context() -> Context {
        let path = random_path();
        let store = FjallLedgerStore::with_config()
            .db_path(&path)
            .low_memory_preset()
            .build()
            .expect("failed to open test store");
        Context::new(path, Some(store))
    }

    pub fn cleanup(ctx: Context) {
        let path = ctx.path();
        drop(ctx);
        if let Err(e) = std::fs::remove_dir_all(&path) {
            log::warn!("Failed to remove test data at {}: {}", path, e);
        }
    }

    pub fn run_test<T, B, A>(before: B, test: T, after: A)
    where
        T: FnOnce(Context) + std::panic::UnwindSafe,
        B: FnOnce() -> Context + std::panic::UnwindSafe,
        A: FnOnce(Context) + std::panic::UnwindSafe,
    {
        let result = std::panic::catch_unwind(|| {
            let ctx = before();
            test(ctx.clone());
            after(ctx);
        });

        if let Err(e) = result {
            let panic_msg = if let Some(msg) = e.downcast_ref::<String>() {
                msg.clone()
            } else if let Some(msg) = e.downcast_ref::<&str>() {
                msg.to_string()
            } else {
                format!("{:?}", e)
            };

            eprintln!("Test execution failed with panic: {}", panic_msg);
            panic!("Test execution failed with panic: {}", panic_msg);
        }
    }

    #[test]
    fn test_context_closes_store_on_drop() {
        let ctx = create_context();
        let store = ctx.store();
        let path = ctx.path();
        drop(ctx);
        assert!(store.is_closed());
        drop(store);
        let _ = std::fs::remove_dir_all(path);
    }

    #[test]
    fn test_harness_preserves_panic_message() {
        let result = std::panic::catch_unwind(|| {
            run_test(
                create_context,
                |_ctx| panic!("specific failure"),
                cleanup,
            )
        });

        let err = result.unwrap_err();
        let msg = err.downcast_ref::<String>().unwrap();
        assert!(msg.contains("specific failure"));
    }
}
