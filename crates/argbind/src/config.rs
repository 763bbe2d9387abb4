//! Command table configuration.

use std::{collections::BTreeMap, path::Path};

use argbind_core::ScanMode;
use serde::{Deserialize, Serialize};

/// Errors that can occur when loading a [`Config`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the config.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config parsed but is not usable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings applied by a [`Commander`](crate::Commander) to every command it
/// registers and dispatches.
///
/// # Example
///
/// ```toml
/// scan = "strict"
/// allow_overwrite = true
///
/// [aliases]
/// sum = "add"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// How token conversion treats content after the first field.
    pub scan: ScanMode,

    /// Replace an existing command on re-registration instead of failing.
    pub allow_overwrite: bool,

    /// Alternative names mapped to registered command names.
    pub aliases: BTreeMap<String, String>,
}

impl Config {
    /// Loads a config from the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] if an alias is chained.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every alias points directly at a command name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending alias.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (alias, target) in &self.aliases {
            if alias.is_empty() || target.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "alias '{alias}' -> '{target}' must not be empty"
                )));
            }
            if self.aliases.contains_key(target) {
                return Err(ConfigError::Invalid(format!(
                    "alias '{alias}' points to another alias '{target}'"
                )));
            }
        }
        Ok(())
    }

    /// Maps `name` through the alias table.
    #[must_use]
    pub fn resolve_alias<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map_or(name, String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.scan, ScanMode::Lenient);
        assert!(!config.allow_overwrite);
        assert!(config.aliases.is_empty());
    }

    #[test]
    fn test_deserialize_config_happy_path() {
        let toml = r#"
scan = "strict"
allow_overwrite = true

[aliases]
sum = "add"
"#;

        let config = Config::from_toml_str(toml).unwrap();

        assert_eq!(config.scan, ScanMode::Strict);
        assert!(config.allow_overwrite);
        assert_eq!(config.resolve_alias("sum"), "add");
        assert_eq!(config.resolve_alias("add"), "add");
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = Config::from_toml_str("").unwrap();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_chained_alias_is_rejected() {
        let toml = r#"
[aliases]
total = "sum"
sum = "add"
"#;

        let err = Config::from_toml_str(toml).unwrap_err();

        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("points to another alias")),
            other => panic!("Expected Invalid error, got {other:?}"),
        }
    }

    #[test]
    fn test_self_alias_is_rejected() {
        let toml = r#"
[aliases]
loop = "loop"
"#;

        assert!(matches!(
            Config::from_toml_str(toml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_unknown_scan_mode_is_parse_error() {
        let result = Config::from_toml_str(r#"scan = "fuzzy""#);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_field_is_parse_error() {
        let result = Config::from_toml_str("verbose = true");

        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_reads_file_from_disk() {
        // Arrange
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "allow_overwrite = true").unwrap();

        // Act
        let config = Config::load(file.path()).unwrap();

        // Assert
        assert!(config.allow_overwrite);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();

        let result = Config::load(dir.path().join("absent.toml"));

        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
