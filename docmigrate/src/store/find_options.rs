use std::fmt::{Display, Formatter};

/// Specifies the direction for sorting ledger records by version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Lowest version first
    Ascending,
    /// Highest version first
    Descending,
}

/// Predicate on the `version` field of ledger records.
///
/// These are the only predicates the migrator ever needs, so adapters can
/// translate them into whatever their query language expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionFilter {
    /// Every record in the collection
    All,
    /// Records whose version equals the value
    Eq(i64),
    /// Records whose version is strictly greater than the value
    GreaterThan(i64),
}

impl VersionFilter {
    /// Evaluates the filter against a version.
    pub fn matches(&self, version: i64) -> bool {
        match self {
            VersionFilter::All => true,
            VersionFilter::Eq(value) => version == *value,
            VersionFilter::GreaterThan(value) => version > *value,
        }
    }
}

impl Display for VersionFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionFilter::All => write!(f, "all"),
            VersionFilter::Eq(value) => write!(f, "version == {}", value),
            VersionFilter::GreaterThan(value) => write!(f, "version > {}", value),
        }
    }
}

/// Options for controlling ledger queries.
///
/// # Examples
///
/// ```rust
/// use docmigrate::store::{order_by, SortOrder};
///
/// // the highest applied record
/// let options = order_by(SortOrder::Descending).limit(1);
/// assert_eq!(options.limit_count(), Some(1));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    sort_order: Option<SortOrder>,
    limit: Option<u64>,
}

/// Creates `FindOptions` sorted by version.
pub fn order_by(sort_order: SortOrder) -> FindOptions {
    FindOptions {
        sort_order: Some(sort_order),
        limit: None,
    }
}

/// Creates `FindOptions` that returns at most `limit` records.
pub fn limit_to(limit: u64) -> FindOptions {
    FindOptions {
        sort_order: None,
        limit: Some(limit),
    }
}

impl FindOptions {
    /// Unsorted, unlimited.
    pub fn new() -> FindOptions {
        FindOptions::default()
    }

    pub fn sort(mut self, sort_order: SortOrder) -> FindOptions {
        self.sort_order = Some(sort_order);
        self
    }

    pub fn limit(mut self, limit: u64) -> FindOptions {
        self.limit = Some(limit);
        self
    }

    pub fn sort_order(&self) -> Option<SortOrder> {
        self.sort_order
    }

    pub fn limit_count(&self) -> Option<u64> {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_filter_matches() {
        assert!(VersionFilter::All.matches(-5));
        assert!(VersionFilter::Eq(3).matches(3));
        assert!(!VersionFilter::Eq(3).matches(4));
        assert!(VersionFilter::GreaterThan(-1).matches(0));
        assert!(!VersionFilter::GreaterThan(2).matches(2));
    }

    #[test]
    fn test_version_filter_display() {
        assert_eq!(VersionFilter::GreaterThan(-1).to_string(), "version > -1");
        assert_eq!(VersionFilter::Eq(0).to_string(), "version == 0");
    }

    #[test]
    fn test_find_options_helpers() {
        let options = order_by(SortOrder::Ascending);
        assert_eq!(options.sort_order(), Some(SortOrder::Ascending));
        assert_eq!(options.limit_count(), None);

        let options = limit_to(5).sort(SortOrder::Descending);
        assert_eq!(options.sort_order(), Some(SortOrder::Descending));
        assert_eq!(options.limit_count(), Some(5));

        assert_eq!(FindOptions::new(), FindOptions::default());
    }
}
