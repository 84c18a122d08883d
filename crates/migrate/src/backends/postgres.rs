//! PostgreSQL backend built on a single `sqlx::PgConnection`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Connection as _, PgConnection, Row};
use stratum_core::Credentials;
use tracing::{debug, info, warn};

use crate::connection::{Connection, ConnectionProvider};
use crate::error::{MigrateError, MigrateResult};
use crate::ledger::{AppliedRecord, Ledger};
use crate::loader::SqlMigration;
use crate::unit::{Direction, MigrationUnit};

#[async_trait]
impl Connection for PgConnection {
    async fn begin_unit(&mut self) -> MigrateResult<()> {
        sqlx::query("BEGIN").execute(&mut *self).await?;
        Ok(())
    }

    async fn commit_unit(&mut self) -> MigrateResult<()> {
        sqlx::query("COMMIT").execute(&mut *self).await?;
        Ok(())
    }

    async fn rollback_unit(&mut self) -> MigrateResult<()> {
        sqlx::query("ROLLBACK").execute(&mut *self).await?;
        Ok(())
    }

    async fn close(self) -> MigrateResult<()> {
        sqlx::Connection::close(self)
            .await
            .map_err(|e| MigrateError::connection(format!("Failed to close connection: {}", e)))
    }
}

/// Opens one `PgConnection` per run
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnectionProvider;

#[async_trait]
impl ConnectionProvider for PgConnectionProvider {
    type Connection = PgConnection;

    async fn open(&self, credentials: &Credentials) -> MigrateResult<PgConnection> {
        let conn = PgConnection::connect(credentials.connect_url())
            .await
            .map_err(|e| {
                MigrateError::connection(format!(
                    "Failed to connect to {}: {}",
                    credentials.masked_url(),
                    e
                ))
            })?;

        info!(database = credentials.database(), host = credentials.host(), "Connected");
        Ok(conn)
    }
}

/// Ledger stored in a PostgreSQL table
#[derive(Debug, Clone)]
pub struct PgLedger {
    table: String,
}

impl PgLedger {
    /// `table` is interpolated into SQL and must already be validated as an
    /// identifier (see `stratum_core::config::TableNameValidator`).
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    /// SQL to create the ledger table
    pub fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                name VARCHAR(255) PRIMARY KEY,\n    \
                applied_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP\n\
            )",
            self.table
        )
    }

    /// SQL to list applied migrations, oldest first
    pub fn applied_sql(&self) -> String {
        format!(
            "SELECT name, applied_at FROM {} ORDER BY applied_at ASC, name ASC",
            self.table
        )
    }

    /// SQL to record a migration as applied
    pub fn append_sql(&self) -> String {
        format!("INSERT INTO {} (name, applied_at) VALUES ($1, $2)", self.table)
    }

    /// SQL to remove a migration record
    pub fn remove_sql(&self) -> String {
        format!("DELETE FROM {} WHERE name = $1", self.table)
    }

    /// SQL to check for the ledger table; binds the schema (NULL for the
    /// current one) and the bare table name
    pub fn exists_sql() -> &'static str {
        "SELECT EXISTS (\n    \
            SELECT 1 FROM information_schema.tables\n    \
            WHERE table_schema = COALESCE($1, current_schema()) AND table_name = $2\n\
        ) AS found"
    }

    /// `schema.table` split into its optional schema and the table name
    fn qualified_name(&self) -> (Option<&str>, &str) {
        match self.table.split_once('.') {
            Some((schema, table)) => (Some(schema), table),
            None => (None, self.table.as_str()),
        }
    }

    async fn exists(&self, conn: &mut PgConnection) -> MigrateResult<bool> {
        let (schema, table) = self.qualified_name();
        let row = sqlx::query(Self::exists_sql())
            .bind(schema)
            .bind(table)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| MigrateError::ledger(format!("Failed to look up ledger table: {}", e)))?;

        row.try_get("found")
            .map_err(|e| MigrateError::ledger(format!("Failed to look up ledger table: {}", e)))
    }
}

#[async_trait]
impl Ledger<PgConnection> for PgLedger {
    async fn ensure(&self, conn: &mut PgConnection) -> MigrateResult<()> {
        sqlx::query(&self.create_table_sql())
            .execute(&mut *conn)
            .await
            .map_err(|e| MigrateError::ledger(format!("Failed to create ledger table: {}", e)))?;
        Ok(())
    }

    async fn applied(&self, conn: &mut PgConnection) -> MigrateResult<Vec<AppliedRecord>> {
        if !self.exists(conn).await? {
            debug!(table = %self.table, "Ledger table does not exist yet");
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&self.applied_sql())
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| {
                MigrateError::ledger(format!("Failed to query applied migrations: {}", e))
            })?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row
                .try_get("name")
                .map_err(|e| MigrateError::ledger(format!("Failed to get migration name: {}", e)))?;
            let applied_at: DateTime<Utc> = row
                .try_get("applied_at")
                .map_err(|e| MigrateError::ledger(format!("Failed to get applied_at: {}", e)))?;

            records.push(AppliedRecord { name, applied_at });
        }

        Ok(records)
    }

    async fn append(&self, conn: &mut PgConnection, name: &str) -> MigrateResult<()> {
        sqlx::query(&self.append_sql())
            .bind(name)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                MigrateError::ledger(format!("Failed to record migration {}: {}", name, e))
            })?;
        Ok(())
    }

    async fn remove(&self, conn: &mut PgConnection, name: &str) -> MigrateResult<()> {
        let result = sqlx::query(&self.remove_sql())
            .bind(name)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                MigrateError::ledger(format!("Failed to remove migration record {}: {}", name, e))
            })?;

        if result.rows_affected() == 0 {
            return Err(MigrateError::ledger(format!(
                "Migration {} is not recorded in {}",
                name, self.table
            )));
        }
        Ok(())
    }
}

/// Statements of one direction run in order on the connection. The
/// orchestrator wraps them and the ledger write in a single transaction, so a
/// failing statement or ledger write leaves nothing of the unit behind.
async fn run_statements(
    migration: &SqlMigration,
    direction: Direction,
    conn: &mut PgConnection,
) -> MigrateResult<()> {
    let statements = migration.statements(direction);
    if statements.is_empty() {
        warn!(migration = %migration.name, %direction, "No statements to run");
        return Ok(());
    }

    for statement in statements {
        sqlx::query(statement).execute(&mut *conn).await?;
    }
    Ok(())
}

#[async_trait]
impl MigrationUnit<PgConnection> for SqlMigration {
    fn name(&self) -> &str {
        &self.name
    }

    async fn up(&self, conn: &mut PgConnection) -> MigrateResult<()> {
        run_statements(self, Direction::Up, conn).await
    }

    async fn down(&self, conn: &mut PgConnection) -> MigrateResult<()> {
        run_statements(self, Direction::Down, conn).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_sql_uses_table() {
        let ledger = PgLedger::new("ops.schema_ledger");
        assert!(ledger
            .create_table_sql()
            .starts_with("CREATE TABLE IF NOT EXISTS ops.schema_ledger ("));
        assert_eq!(
            ledger.applied_sql(),
            "SELECT name, applied_at FROM ops.schema_ledger ORDER BY applied_at ASC, name ASC"
        );
        assert_eq!(
            ledger.append_sql(),
            "INSERT INTO ops.schema_ledger (name, applied_at) VALUES ($1, $2)"
        );
        assert_eq!(ledger.remove_sql(), "DELETE FROM ops.schema_ledger WHERE name = $1");
    }

    #[test]
    fn test_ledger_lookup_splits_schema() {
        assert_eq!(
            PgLedger::new("ops.schema_ledger").qualified_name(),
            (Some("ops"), "schema_ledger")
        );
        assert_eq!(
            PgLedger::new("stratum_migrations").qualified_name(),
            (None, "stratum_migrations")
        );
        assert!(PgLedger::exists_sql().contains("information_schema.tables"));
    }
}
