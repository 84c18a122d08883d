use thiserror::Error;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field: {field}. {hint}")]
    MissingRequired { field: String, hint: String },

    #[error("Invalid value for field '{field}': '{value}'. Expected: {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ConfigError {
    /// Create a missing required field error
    pub fn missing_required(field: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::MissingRequired {
            field: field.into(),
            hint: hint.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }
}

/// Trait for validating configuration values
pub trait ConfigValidator<T: ?Sized> {
    /// Validate a configuration value
    fn validate(&self, value: &T) -> Result<(), ConfigError>;
}

/// Accepts the level names understood by `tracing_subscriber::EnvFilter`.
pub struct LogLevelValidator;

impl LogLevelValidator {
    pub const LEVELS: [&'static str; 5] = ["error", "warn", "info", "debug", "trace"];
}

impl ConfigValidator<str> for LogLevelValidator {
    fn validate(&self, value: &str) -> Result<(), ConfigError> {
        if !Self::LEVELS.contains(&value) {
            return Err(ConfigError::invalid_value(
                "logging.level",
                value,
                format!("one of: {}", Self::LEVELS.join(", ")),
            ));
        }
        Ok(())
    }
}

/// Ledger table names are interpolated into SQL, so only plain
/// identifiers (optionally schema-qualified) are allowed.
pub struct TableNameValidator;

impl ConfigValidator<str> for TableNameValidator {
    fn validate(&self, value: &str) -> Result<(), ConfigError> {
        if value.is_empty() {
            return Err(ConfigError::missing_required(
                "migrations.table",
                "A ledger table name is required",
            ));
        }

        let valid = value.split('.').count() <= 2
            && value.split('.').all(|part| {
                let mut chars = part.chars();
                matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            });

        if !valid {
            return Err(ConfigError::invalid_value(
                "migrations.table",
                value,
                "an identifier like 'stratum_migrations' or 'schema.table'",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_levels() {
        assert!(LogLevelValidator.validate("debug").is_ok());
        assert!(LogLevelValidator.validate("verbose").is_err());
    }

    #[test]
    fn test_table_names() {
        assert!(TableNameValidator.validate("stratum_migrations").is_ok());
        assert!(TableNameValidator.validate("ops.schema_ledger").is_ok());
        assert!(TableNameValidator.validate("").is_err());
        assert!(TableNameValidator.validate("1table").is_err());
        assert!(TableNameValidator.validate("ledger; DROP TABLE users").is_err());
        assert!(TableNameValidator.validate("a.b.c").is_err());
    }
}
