mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use stratum_migrate::ListStatus;

#[derive(Parser, Debug)]
#[command(name = "stratum")]
#[command(version, about = "Ledger-driven schema migrations for PostgreSQL")]
struct Cli {
    /// Configuration file (defaults to ./stratum.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the *.sql migration files
    #[arg(long, global = true)]
    migrations_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply all pending migrations
    Migrate {
        /// Revert the migrations applied by this run if one of them fails
        #[arg(long)]
        revert_on_error: bool,
    },

    /// Revert the latest migrations
    Revert {
        /// How many of the most recent migrations to revert
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        times: i64,

        /// Revert exactly this migration instead
        #[arg(long)]
        name: Option<String>,
    },

    /// Revert every applied migration, newest first
    Reset,

    /// List pending or executed migrations
    List {
        #[arg(long, value_enum, default_value_t = StatusArg::Pending)]
        status: StatusArg,

        /// Print the result as JSON on stdout
        #[arg(long)]
        json: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum StatusArg {
    Pending,
    Executed,
}

impl From<StatusArg> for ListStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Pending => ListStatus::Pending,
            StatusArg::Executed => ListStatus::Executed,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match commands::dispatch(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            tracing::error!(error = %format!("{:#}", error), "Command failed");
            eprintln!("Error: {:#}", error);
            ExitCode::FAILURE
        }
    }
}
