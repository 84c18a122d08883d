use anyhow::{Context, Result};
use sqlx::PgConnection;
use std::sync::Arc;
use stratum_core::StratumConfig;
use stratum_migrate::backends::{PgConnectionProvider, PgLedger};
use stratum_migrate::{
    unit, ConnectionProvider, ListStatus, MigrationLoader, Orchestrator, RevertTarget, SharedUnit,
    TracingReporter,
};

type PgOrchestrator = Orchestrator<PgConnection, PgLedger>;

/// `stratum migrate`
pub async fn run(config: &StratumConfig, revert_on_error: bool) -> Result<bool> {
    let outcome = connect(config).await?.apply(revert_on_error).await?;

    if let Some(report) = &outcome.report {
        tracing::error!(
            first_broken = %report.first_broken_name,
            committed = report.committed_before_failure.len(),
            reverted = report.reverted.len(),
            "Migration run failed"
        );
        if let Some(error) = &report.revert_error {
            eprintln!("Automatic revert stopped early: {}", error);
        }
        eprintln!("Failed at {}: {}", report.first_broken_name, report.error);
    }

    Ok(outcome.success)
}

/// `stratum revert`
pub async fn revert(config: &StratumConfig, times: i64, name: Option<String>) -> Result<bool> {
    // argument errors are reported before any connection is made
    let target = RevertTarget::from_args(times, name)?;
    let reverted = connect(config).await?.revert(target).await?;

    for name in &reverted {
        println!("{}", name);
    }
    Ok(true)
}

/// `stratum reset`
pub async fn reset(config: &StratumConfig) -> Result<bool> {
    let reverted = connect(config).await?.reset().await?;

    for name in &reverted {
        println!("{}", name);
    }
    Ok(true)
}

/// `stratum list`
pub async fn list(config: &StratumConfig, status: ListStatus, json: bool) -> Result<bool> {
    let names = connect(config).await?.list(status).await?;

    if json {
        let body = serde_json::json!({
            "status": status,
            "migrations": names,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        for name in &names {
            println!("{}", name);
        }
    }
    Ok(true)
}

/// Load the migration files, then open the connection and hand both to a
/// fresh orchestrator. Nothing touches the database when loading fails.
async fn connect(config: &StratumConfig) -> Result<PgOrchestrator> {
    let units = load_units(config)?;
    let conn = PgConnectionProvider
        .open_configured(&config.database)
        .await
        .context("Failed to open database connection")?;
    let orchestrator = Orchestrator::initialize(
        conn,
        units,
        PgLedger::new(config.migrations.table.as_str()),
        Arc::new(TracingReporter),
    )
    .await?;

    Ok(orchestrator)
}

fn load_units(config: &StratumConfig) -> Result<Vec<SharedUnit<PgConnection>>> {
    let loader = MigrationLoader::new(&config.migrations.directory);
    let migrations = loader.load()?;

    tracing::debug!(
        directory = %loader.directory().display(),
        count = migrations.len(),
        "Migration units loaded"
    );
    Ok(migrations.into_iter().map(unit::shared).collect())
}
