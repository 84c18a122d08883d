pub mod migrate;

use anyhow::{Context, Result};
use stratum_core::{init_logging, LoggingConfig, StratumConfig};

use crate::{Cli, Commands};

/// Resolve configuration, start logging and run the selected command.
/// `Ok(false)` means the command ran but did not succeed.
pub async fn dispatch(cli: Cli) -> Result<bool> {
    let config = resolve_config(&cli)?;
    start_logging(&config, cli.json_logs)?;

    tracing::debug!(
        migrations_dir = %config.migrations.directory.display(),
        migrations_dir_source = %config.source_of("migrations.directory"),
        table = %config.migrations.table,
        database_source = %config.source_of("database"),
        "Configuration resolved"
    );

    match cli.command {
        Commands::Migrate { revert_on_error } => migrate::run(&config, revert_on_error).await,
        Commands::Revert { times, name } => migrate::revert(&config, times, name).await,
        Commands::Reset => migrate::reset(&config).await,
        Commands::List { status, json } => migrate::list(&config, status.into(), json).await,
    }
}

fn resolve_config(cli: &Cli) -> Result<StratumConfig> {
    let mut config = StratumConfig::resolve(cli.config.as_deref())
        .context("Failed to load configuration")?;

    if let Some(dir) = &cli.migrations_dir {
        config = config.with_migrations_dir(dir);
    }
    if let Some(level) = &cli.log_level {
        config = config.with_log_level(level.to_lowercase());
        config.validate().context("Invalid --log-level")?;
    }

    Ok(config)
}

fn start_logging(config: &StratumConfig, json_logs: bool) -> Result<()> {
    let verbose = matches!(config.logging.level.as_str(), "debug" | "trace");
    let json = json_logs || config.logging.json;

    let logging = if verbose && !json {
        LoggingConfig {
            level: config.logging.level.clone(),
            ..LoggingConfig::development()
        }
    } else {
        LoggingConfig {
            json_format: json,
            ..LoggingConfig::from_settings(&config.logging)
        }
    };

    init_logging(logging).map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}
