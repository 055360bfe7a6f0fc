use crate::errors::{ErrorKind, MigrateError, MigrateResult};
use std::sync::Arc;

/// Suffix appended to the namespace prefix to name the ledger collection.
pub const DEFAULT_LEDGER_SUFFIX: &str = "_migrations";

/// Field of the ledger records the version index is built on.
pub const DEFAULT_VERSION_FIELD: &str = "version";

/// Migrator settings.
///
/// Cheap to clone, every clone shares the same values.
///
/// # Examples
///
/// ```rust
/// use docmigrate::migrator::MigratorConfig;
///
/// let config = MigratorConfig::default();
/// assert_eq!(config.ledger_name("shop"), "shop_migrations");
/// ```
#[derive(Debug, Clone)]
pub struct MigratorConfig {
    inner: Arc<MigratorConfigInner>,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        MigratorConfig {
            inner: Arc::new(MigratorConfigInner {
                ledger_suffix: DEFAULT_LEDGER_SUFFIX.to_string(),
                version_field: DEFAULT_VERSION_FIELD.to_string(),
            }),
        }
    }
}

impl MigratorConfig {
    /// Creates a configuration from explicit values.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` if either value is empty.
    pub fn new(ledger_suffix: &str, version_field: &str) -> MigrateResult<MigratorConfig> {
        validate_non_empty("Ledger suffix", ledger_suffix)?;
        validate_non_empty("Version field", version_field)?;

        Ok(MigratorConfig {
            inner: Arc::new(MigratorConfigInner {
                ledger_suffix: ledger_suffix.to_string(),
                version_field: version_field.to_string(),
            }),
        })
    }

    pub fn ledger_suffix(&self) -> &str {
        &self.inner.ledger_suffix
    }

    pub fn version_field(&self) -> &str {
        &self.inner.version_field
    }

    /// Name of the ledger collection for a namespace prefix.
    pub fn ledger_name(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.inner.ledger_suffix)
    }
}

#[derive(Debug)]
struct MigratorConfigInner {
    ledger_suffix: String,
    version_field: String,
}

fn validate_non_empty(what: &str, value: &str) -> MigrateResult<()> {
    if value.trim().is_empty() {
        log::error!("{} cannot be empty", what);
        return Err(MigrateError::new(
            &format!("{} cannot be empty", what),
            ErrorKind::InvalidOperation,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MigratorConfig::default();
        assert_eq!(config.ledger_suffix(), "_migrations");
        assert_eq!(config.version_field(), "version");
        assert_eq!(config.ledger_name("app"), "app_migrations");
        assert_eq!(config.ledger_name(""), "_migrations");
    }

    #[test]
    fn test_custom_values() {
        let config = MigratorConfig::new("-ledger", "v").unwrap();
        assert_eq!(config.ledger_name("app"), "app-ledger");
        assert_eq!(config.version_field(), "v");
    }

    #[test]
    fn test_rejects_empty_values() {
        let err = MigratorConfig::new("", "version").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);

        let err = MigratorConfig::new("_migrations", "  ").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
    }

    #[test]
    fn test_clones_share_inner() {
        let config = MigratorConfig::new("_ledger", "version").unwrap();
        let clone = config.clone();
        assert!(Arc::ptr_eq(&config.inner, &clone.inner));
    }
}
