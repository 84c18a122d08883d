//! # stratum-core
//!
//! Configuration and logging shared by the stratum crates.

pub mod config;
pub mod logging;

pub use config::{
    ConfigError, ConfigSource, Credentials, DatabaseConfig, LogSettings, MigrationsConfig,
    StratumConfig, DEFAULT_CONFIG_FILE,
};
pub use logging::{init_logging, LoggingConfig};
