use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use super::credentials::DatabaseConfig;
use super::sources::ConfigSource;
use super::validation::{ConfigError, ConfigValidator, LogLevelValidator, TableNameValidator};

/// Default configuration file, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "stratum.yaml";

/// Top-level configuration for a stratum run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StratumConfig {
    pub database: DatabaseConfig,
    pub migrations: MigrationsConfig,
    pub logging: LogSettings,
    #[serde(skip)]
    sources: HashMap<String, ConfigSource>,
}

/// Where migration units live and where the ledger is kept
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationsConfig {
    /// Directory scanned for `*.sql` migration files
    pub directory: PathBuf,
    /// Table used as the ledger of applied migrations
    pub table: String,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("migrations"),
            table: "stratum_migrations".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl StratumConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        let mut config: StratumConfig = serde_yaml::from_str(&content)?;

        let source = ConfigSource::File(path.display().to_string());
        for field in ["database", "migrations", "logging"] {
            config.sources.insert(field.to_string(), source.clone());
        }
        Ok(config)
    }

    /// Resolve the effective configuration: file (an explicit path must
    /// exist, the default one is optional), then environment, then validation.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Override settings from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| env::var(key).ok());
    }

    /// Override settings from an arbitrary variable lookup
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = Some(url);
            self.track("database.url", "DATABASE_URL");
        }
        if let Some(host) = lookup("DB_HOST") {
            self.database.host = host;
            self.track("database.host", "DB_HOST");
        }
        if let Some(port) = lookup("DB_PORT").and_then(|p| p.parse().ok()) {
            self.database.port = port;
            self.track("database.port", "DB_PORT");
        }
        if let Some(user) = lookup("DB_USER") {
            self.database.user = user;
            self.track("database.user", "DB_USER");
        }
        if let Some(password) = lookup("DB_PASSWORD") {
            self.database.password = Some(password);
            self.track("database.password", "DB_PASSWORD");
        }
        if let Some(name) = lookup("DB_NAME") {
            self.database.name = Some(name);
            self.track("database.name", "DB_NAME");
        }
        if let Some(dir) = lookup("STRATUM_MIGRATIONS_DIR") {
            self.migrations.directory = PathBuf::from(dir);
            self.track("migrations.directory", "STRATUM_MIGRATIONS_DIR");
        }
        if let Some(table) = lookup("STRATUM_MIGRATIONS_TABLE") {
            self.migrations.table = table;
            self.track("migrations.table", "STRATUM_MIGRATIONS_TABLE");
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
            self.track("logging.level", "LOG_LEVEL");
        }
    }

    /// Override the migrations directory from the command line
    pub fn with_migrations_dir(mut self, directory: impl Into<PathBuf>) -> Self {
        self.migrations.directory = directory.into();
        self.sources
            .insert("migrations.directory".to_string(), ConfigSource::CommandLine);
        self
    }

    /// Override the log level from the command line
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.logging.level = level.into();
        self.sources
            .insert("logging.level".to_string(), ConfigSource::CommandLine);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        LogLevelValidator.validate(self.logging.level.as_str())?;
        TableNameValidator.validate(self.migrations.table.as_str())?;
        Ok(())
    }

    /// Where a setting came from, for `--log-level debug` diagnostics
    pub fn source_of(&self, field: &str) -> ConfigSource {
        if let Some(source) = self.sources.get(field) {
            return source.clone();
        }
        let section = field.split('.').next().unwrap_or(field);
        self.sources
            .get(section)
            .cloned()
            .unwrap_or(ConfigSource::Default)
    }

    fn track(&mut self, field: &str, var: &str) {
        self.sources
            .insert(field.to_string(), ConfigSource::EnvVar(var.to_string()));
    }
}
