use crate::errors::MigrateResult;
use crate::migration::MigrationRecord;

/// A lazy stream of ledger records returned by a query.
///
/// Adapters back it with whatever iteration their store offers; decoding
/// failures surface per item.
pub struct RecordCursor {
    inner: Box<dyn Iterator<Item = MigrateResult<MigrationRecord>>>,
}

impl RecordCursor {
    pub fn new<I>(iter: I) -> RecordCursor
    where
        I: Iterator<Item = MigrateResult<MigrationRecord>> + 'static,
    {
        RecordCursor {
            inner: Box::new(iter),
        }
    }

    /// A cursor over already materialized records.
    pub fn from_records(records: Vec<MigrationRecord>) -> RecordCursor {
        RecordCursor::new(records.into_iter().map(Ok))
    }

    pub fn empty() -> RecordCursor {
        RecordCursor::new(std::iter::empty())
    }

    /// Drains the cursor, stopping at the first error.
    pub fn collect_records(self) -> MigrateResult<Vec<MigrationRecord>> {
        self.collect()
    }
}

impl Iterator for RecordCursor {
    type Item = MigrateResult<MigrationRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ErrorKind, MigrateError};

    #[test]
    fn test_from_records() {
        let cursor = RecordCursor::from_records(vec![
            MigrationRecord::new(0, "-"),
            MigrationRecord::new(1, "one"),
        ]);
        let records = cursor.collect_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].version(), 1);
    }

    #[test]
    fn test_empty() {
        assert_eq!(RecordCursor::empty().count(), 0);
    }

    #[test]
    fn test_collect_stops_at_error() {
        let cursor = RecordCursor::new(
            vec![
                Ok(MigrationRecord::new(0, "-")),
                Err(MigrateError::new("corrupt", ErrorKind::EncodingError)),
                Ok(MigrationRecord::new(2, "two")),
            ]
            .into_iter(),
        );
        let err = cursor.collect_records().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::EncodingError);
    }
}
