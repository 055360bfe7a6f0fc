use crate::errors::{ErrorKind, MigrateError, MigrateResult};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// One entry in a document's revision history, written `<generation>-<hash>`.
///
/// Stores that keep history (append-only or MVCC stores) only drop a
/// document for good once every revision has been purged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Revision {
    generation: u64,
    hash: String,
}

impl Revision {
    /// The revision written when a document is created.
    pub fn first() -> Revision {
        Revision::with_generation(1)
    }

    /// A fresh revision following this one.
    pub fn next(&self) -> Revision {
        Revision::with_generation(self.generation + 1)
    }

    fn with_generation(generation: u64) -> Revision {
        Revision {
            generation,
            hash: uuid::Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl Display for Revision {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.generation, self.hash)
    }
}

impl FromStr for Revision {
    type Err = MigrateError;

    fn from_str(s: &str) -> MigrateResult<Revision> {
        let invalid = || {
            MigrateError::new(
                &format!("Invalid revision '{}', expected <generation>-<hash>", s),
                ErrorKind::EncodingError,
            )
        };

        let (generation, hash) = s.split_once('-').ok_or_else(invalid)?;
        let generation = generation.parse::<u64>().map_err(|_| invalid())?;
        if generation == 0 || hash.is_empty() {
            return Err(invalid());
        }

        Ok(Revision {
            generation,
            hash: hash.to_string(),
        })
    }
}
