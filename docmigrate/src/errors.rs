use backtrace::Backtrace;
use parking_lot::RwLock;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;
use std::sync::Arc;

use crate::migrator::VersionChange;

/// Error kinds for migration operations.
///
/// Every condition the migrator can signal has its own kind, so callers can
/// tell a usage slip from a half-applied plan without parsing messages.
///
/// # Examples
///
/// ```rust
/// use docmigrate::errors::{ErrorKind, MigrateError, MigrateResult};
///
/// fn example() -> MigrateResult<()> {
///     Err(MigrateError::new("No applied migrations found", ErrorKind::NoMigrations))
/// }
///
/// assert_eq!(example().unwrap_err().kind(), &ErrorKind::NoMigrations);
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Usage Errors - reported before anything is read
    /// No command was given
    CommandRequired,
    /// The command name is not recognized
    UnexpectedCommand,
    /// The command needs a version argument and none was given
    VersionNumberRequired,
    /// The version argument is not a base-10 signed 64-bit integer
    InvalidVersionFormat,

    // Precondition Errors - reported before any mutation
    /// The requested version is not among the declared migrations
    TargetVersionNotFound,
    /// The ledger already holds a root record
    LedgerAlreadyInitialized,
    /// The ledger holds no applied records
    NoMigrations,

    // Partial Application Errors - committed steps stay in the ledger
    /// A migration body failed, or its outcome could not be recorded
    MigrationFailed,
    /// The run was cancelled between two steps
    Cancelled,

    // Consistency Errors - the ledger drifted from the declarations
    /// An applied record has no matching declaration
    MigrationsAbsent,

    // Construction Errors
    /// The declared migrations violate the set invariants
    InvalidMigrationSet,
    /// The operation is not valid in the current context
    InvalidOperation,

    // Store Errors - raised by ledger adapters
    /// The ledger collection does not exist
    CollectionNotFound,
    /// The requested document was not found
    NotFound,
    /// Error from the storage backend
    BackendError,
    /// Error encoding or decoding a stored document
    EncodingError,
    /// Generic IO error
    IOError,
    /// The store has not been opened
    StoreNotInitialized,

    /// Internal error (usually indicates a bug)
    InternalError,
}

/// Coarse grouping of [`ErrorKind`]s by how a caller should react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad or missing command/argument; nothing was touched.
    Usage,
    /// A precondition failed; nothing was mutated.
    Precondition,
    /// Some steps were committed before the failure; retry from the reported position.
    PartialApplication,
    /// The ledger references migrations that are no longer declared.
    Consistency,
    /// The ledger store failed.
    Store,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Returns the category this kind belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorKind::CommandRequired
            | ErrorKind::UnexpectedCommand
            | ErrorKind::VersionNumberRequired
            | ErrorKind::InvalidVersionFormat => ErrorCategory::Usage,
            ErrorKind::TargetVersionNotFound
            | ErrorKind::LedgerAlreadyInitialized
            | ErrorKind::NoMigrations => ErrorCategory::Precondition,
            ErrorKind::MigrationFailed | ErrorKind::Cancelled => {
                ErrorCategory::PartialApplication
            }
            ErrorKind::MigrationsAbsent => ErrorCategory::Consistency,
            ErrorKind::CollectionNotFound
            | ErrorKind::NotFound
            | ErrorKind::BackendError
            | ErrorKind::EncodingError
            | ErrorKind::IOError
            | ErrorKind::StoreNotInitialized => ErrorCategory::Store,
            ErrorKind::InvalidMigrationSet
            | ErrorKind::InvalidOperation
            | ErrorKind::InternalError => ErrorCategory::Internal,
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::CommandRequired => write!(f, "Command required"),
            ErrorKind::UnexpectedCommand => write!(f, "Unexpected command"),
            ErrorKind::VersionNumberRequired => write!(f, "Version number required"),
            ErrorKind::InvalidVersionFormat => write!(f, "Invalid version format"),
            ErrorKind::TargetVersionNotFound => write!(f, "Target version not found"),
            ErrorKind::LedgerAlreadyInitialized => write!(f, "Ledger already initialized"),
            ErrorKind::NoMigrations => write!(f, "No migrations"),
            ErrorKind::MigrationFailed => write!(f, "Migration failed"),
            ErrorKind::Cancelled => write!(f, "Cancelled"),
            ErrorKind::MigrationsAbsent => write!(f, "Migrations absent"),
            ErrorKind::InvalidMigrationSet => write!(f, "Invalid migration set"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::CollectionNotFound => write!(f, "Collection not found"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::BackendError => write!(f, "Backend error"),
            ErrorKind::EncodingError => write!(f, "Encoding error"),
            ErrorKind::IOError => write!(f, "IO error"),
            ErrorKind::StoreNotInitialized => write!(f, "Store not initialized"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Error type for every fallible operation in this crate.
///
/// `MigrateError` carries a message, a kind, an optional cause and, for
/// errors raised part-way through a command, the version change reached
/// before the failure. Backtraces are captured at construction.
///
/// # Examples
///
/// ```rust
/// use docmigrate::errors::{ErrorKind, MigrateError};
///
/// let cause = MigrateError::new("disk unplugged", ErrorKind::IOError);
/// let err = MigrateError::new_with_cause("Failed to record migration 3", ErrorKind::MigrationFailed, cause);
/// assert!(err.cause().is_some());
/// ```
#[derive(Clone)]
pub struct MigrateError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<MigrateError>>,
    progress: Option<VersionChange>,
    backtrace: Arc<RwLock<Backtrace>>,
}

impl MigrateError {
    /// Creates a new error with the given message and kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        MigrateError {
            message: message.to_string(),
            error_kind,
            cause: None,
            progress: None,
            backtrace: Arc::new(RwLock::new(Backtrace::new())),
        }
    }

    /// Creates a new error that wraps `cause`.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: MigrateError) -> Self {
        MigrateError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            progress: None,
            backtrace: Arc::new(RwLock::new(Backtrace::new())),
        }
    }

    /// Attaches the version change reached when the error occurred.
    pub fn with_progress(mut self, progress: VersionChange) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn category(&self) -> ErrorCategory {
        self.error_kind.category()
    }

    pub fn cause(&self) -> Option<&MigrateError> {
        self.cause.as_deref()
    }

    /// Old and new ledger versions at the moment of failure, if the command got that far.
    pub fn progress(&self) -> Option<VersionChange> {
        self.progress
    }
}

impl Display for MigrateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for MigrateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace.read()),
        }
    }
}

impl Error for MigrateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// Shorthand for `Result<T, MigrateError>`.
pub type MigrateResult<T> = Result<T, MigrateError>;

impl From<std::io::Error> for MigrateError {
    fn from(err: std::io::Error) -> Self {
        let error_kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            _ => ErrorKind::IOError,
        };
        MigrateError::new(&format!("IO error: {}", err), error_kind)
    }
}

impl From<std::num::ParseIntError> for MigrateError {
    fn from(err: std::num::ParseIntError) -> Self {
        MigrateError::new(
            &format!("Invalid version argument: {}", err),
            ErrorKind::InvalidVersionFormat,
        )
    }
}

impl From<anyhow::Error> for MigrateError {
    fn from(err: anyhow::Error) -> Self {
        // keep the whole context chain, anyhow's alternate format joins it with ": "
        MigrateError::new(&format!("{:#}", err), ErrorKind::MigrationFailed)
    }
}

impl From<String> for MigrateError {
    fn from(msg: String) -> Self {
        MigrateError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for MigrateError {
    fn from(msg: &str) -> Self {
        MigrateError::new(msg, ErrorKind::InternalError)
    }
}
