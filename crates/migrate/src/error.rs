//! Error types for the migration engine

use stratum_core::ConfigError;
use thiserror::Error;

use crate::unit::Direction;

/// Result type alias for migration operations
pub type MigrateResult<T> = Result<T, MigrateError>;

#[derive(Debug, Error)]
pub enum MigrateError {
    /// The database could not be reached; nothing else can proceed
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Rejected before any I/O took place
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A unit's `up()` or `down()` failed
    #[error("Migration {name} failed while running {direction}: {message}")]
    Operation {
        name: String,
        direction: Direction,
        message: String,
    },

    /// Reading or writing the ledger failed independently of the unit itself
    #[error("Ledger error: {message}")]
    Ledger { message: String },

    #[error("Migration {name} is recorded in the ledger but was not loaded")]
    UnknownMigration { name: String },

    #[error("Failed to load migrations: {message}")]
    Load { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl MigrateError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn ledger(message: impl Into<String>) -> Self {
        Self::Ledger {
            message: message.into(),
        }
    }

    pub fn load(message: impl Into<String>) -> Self {
        Self::Load {
            message: message.into(),
        }
    }

    /// Attribute a failure to the unit and direction that raised it.
    /// Errors that already name their unit pass through unchanged.
    pub fn in_operation(self, name: &str, direction: Direction) -> Self {
        match self {
            Self::Operation { .. } => self,
            other => Self::Operation {
                name: name.to_string(),
                direction,
                message: other.to_string(),
            },
        }
    }

    /// Check if the error is an argument validation error
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }
}
