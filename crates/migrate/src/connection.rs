//! Connection lifecycle seams.

use async_trait::async_trait;
use stratum_core::{Credentials, DatabaseConfig};

use crate::error::MigrateResult;

/// A live database handle owned by exactly one orchestrator run
#[async_trait]
pub trait Connection: Send + Sized {
    /// Start the unit of work that groups a unit's `up()`/`down()` with its
    /// ledger write. Stores without transactions keep the default no-op.
    async fn begin_unit(&mut self) -> MigrateResult<()> {
        Ok(())
    }

    async fn commit_unit(&mut self) -> MigrateResult<()> {
        Ok(())
    }

    async fn rollback_unit(&mut self) -> MigrateResult<()> {
        Ok(())
    }

    /// Release the handle. Called once, on every exit path.
    async fn close(self) -> MigrateResult<()>;
}

/// Opens authenticated connections
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    type Connection: Connection;

    async fn open(&self, credentials: &Credentials) -> MigrateResult<Self::Connection>;

    /// Resolve credentials from the `database` settings, then open. Incomplete
    /// settings fail with [`MigrateError::Config`](crate::MigrateError::Config)
    /// before any connection attempt.
    async fn open_configured(&self, config: &DatabaseConfig) -> MigrateResult<Self::Connection> {
        let credentials = config.credentials()?;
        self.open(&credentials).await
    }
}
