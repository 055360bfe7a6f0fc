use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Opaque identifier assigned to a ledger document by the store on creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(String);

impl RecordId {
    /// Generates a fresh random identifier.
    pub fn new() -> RecordId {
        RecordId(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Wraps an identifier produced elsewhere (for example by a remote store).
    pub fn from_string(id: impl Into<String>) -> RecordId {
        RecordId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A ledger entry stating that one migration has been applied.
///
/// Records are created when a migration's `up` succeeds and hard-purged when
/// it is rolled back. They are never updated in place. The persisted layout is
/// `{ _id, version, name }`; the migration bodies are never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    #[serde(rename = "_id", default)]
    id: Option<RecordId>,
    version: i64,
    name: String,
}

impl MigrationRecord {
    /// Creates a record that has not been stored yet.
    pub fn new(version: i64, name: &str) -> MigrationRecord {
        MigrationRecord {
            id: None,
            version,
            name: name.to_string(),
        }
    }

    /// Returns a copy of this record carrying the store-assigned id.
    pub fn with_id(mut self, id: RecordId) -> MigrationRecord {
        self.id = Some(id);
        self
    }

    /// Store-assigned id, `None` until the record has been inserted.
    pub fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
