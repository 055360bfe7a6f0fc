use docmigrate::errors::{ErrorKind, MigrateError};
use docmigrate::migration::{MigrationRecord, RecordId};
use docmigrate::store::Revision;
use serde::{Deserialize, Serialize};
use std::error::Error;
use thiserror::Error;

/// Error type for ledger document and index key encoding.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerCodecError {
    /// Decoding of stored bytes failed
    #[error("Deserialization failed: {0}")]
    DeserializationError(String),
    /// Encoding of a document failed
    #[error("Serialization failed: {0}")]
    SerializationError(String),
    /// An index key does not have the `<version><id>` layout
    #[error("Invalid index key: {0}")]
    InvalidIndexKey(String),
}

impl From<LedgerCodecError> for MigrateError {
    fn from(err: LedgerCodecError) -> Self {
        MigrateError::new(&err.to_string(), ErrorKind::EncodingError)
    }
}

pub(crate) type CodecResult<T> = Result<T, LedgerCodecError>;

/// What is persisted for one ledger document: the record and its revision
/// history, newest revision first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct StoredDocument {
    pub(crate) record: MigrationRecord,
    pub(crate) revisions: Vec<Revision>,
}

impl StoredDocument {
    pub(crate) fn new(record: MigrationRecord) -> StoredDocument {
        StoredDocument {
            record,
            revisions: vec![Revision::first()],
        }
    }

    pub(crate) fn encode(&self) -> CodecResult<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::legacy())
            .map_err(|e| LedgerCodecError::SerializationError(e.to_string()))
    }

    pub(crate) fn decode(bytes: &[u8]) -> CodecResult<StoredDocument> {
        bincode::serde::decode_from_slice(bytes, bincode::config::legacy())
            .map(|(document, _)| document)
            .map_err(|e| LedgerCodecError::DeserializationError(e.to_string()))
    }
}

const VERSION_WIDTH: usize = 8;

/// Big-endian, sign-flipped version bytes; byte order equals numeric order.
pub(crate) fn version_prefix(version: i64) -> [u8; VERSION_WIDTH] {
    ((version as u64) ^ (1 << 63)).to_be_bytes()
}

/// Index entry key: the version prefix followed by the document id.
pub(crate) fn index_key(version: i64, id: &RecordId) -> Vec<u8> {
    let mut key = Vec::with_capacity(VERSION_WIDTH + id.as_str().len());
    key.extend_from_slice(&version_prefix(version));
    key.extend_from_slice(id.as_str().as_bytes());
    key
}

/// Splits an index key back into version and document id.
pub(crate) fn decode_index_key(key: &[u8]) -> CodecResult<(i64, RecordId)> {
    if key.len() <= VERSION_WIDTH {
        return Err(LedgerCodecError::InvalidIndexKey(format!(
            "expected more than {} bytes, got {}",
            VERSION_WIDTH,
            key.len()
        )));
    }

    let (prefix, id) = key.split_at(VERSION_WIDTH);
    let mut raw = [0u8; VERSION_WIDTH];
    raw.copy_from_slice(prefix);
    let version = (u64::from_be_bytes(raw) ^ (1 << 63)) as i64;

    let id = std::str::from_utf8(id)
        .map_err(|e| LedgerCodecError::InvalidIndexKey(e.to_string()))?;
    Ok((version, RecordId::from_string(id)))
}

/// Maps a fjall failure onto the migrator's error kinds.
pub(crate) fn to_migrate_error(error: impl Error) -> MigrateError {
    let error_msg = error.to_string();
    let error_kind = if error_msg.contains("deleted") || error_msg.contains("PartitionDeleted") {
        ErrorKind::CollectionNotFound
    } else if error_msg.contains("closed") || error_msg.contains("poisoned") {
        ErrorKind::StoreNotInitialized
    } else if error_msg.contains("permission") || error_msg.contains("Io") {
        ErrorKind::IOError
    } else if error_msg.contains("decompress") || error_msg.contains("corrupt") {
        ErrorKind::EncodingError
    } else {
        ErrorKind::BackendError
    };
    MigrateError::new(&format!("Fjall Error: {}", error_msg), error_kind)
}
