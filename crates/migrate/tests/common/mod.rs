#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;

use stratum_migrate::backends::{MemoryConnection, MemoryLedger};
use stratum_migrate::{
    Direction, MigrateError, MigrateResult, MigrationUnit, Orchestrator, RecordingReporter,
    SharedUnit,
};

/// Unit that journals `up:<name>` / `down:<name>` and can be told to fail
pub struct ScriptedUnit {
    name: String,
    fail_up: bool,
    fail_down: bool,
}

impl ScriptedUnit {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail_up: false,
            fail_down: false,
        }
    }

    pub fn failing_up(mut self) -> Self {
        self.fail_up = true;
        self
    }

    pub fn failing_down(mut self) -> Self {
        self.fail_down = true;
        self
    }

    pub fn shared(self) -> SharedUnit<MemoryConnection> {
        Arc::new(self)
    }

    fn fail(&self, direction: Direction) -> MigrateError {
        MigrateError::Operation {
            name: self.name.clone(),
            direction,
            message: "relation \"missing\" does not exist".to_string(),
        }
    }
}

#[async_trait]
impl MigrationUnit<MemoryConnection> for ScriptedUnit {
    fn name(&self) -> &str {
        &self.name
    }

    async fn up(&self, conn: &mut MemoryConnection) -> MigrateResult<()> {
        if self.fail_up {
            return Err(self.fail(Direction::Up));
        }
        conn.execute(format!("up:{}", self.name));
        Ok(())
    }

    async fn down(&self, conn: &mut MemoryConnection) -> MigrateResult<()> {
        if self.fail_down {
            return Err(self.fail(Direction::Down));
        }
        conn.execute(format!("down:{}", self.name));
        Ok(())
    }
}

/// Healthy units named `names`
pub fn units(names: &[&str]) -> Vec<SharedUnit<MemoryConnection>> {
    names.iter().map(|name| ScriptedUnit::new(name).shared()).collect()
}

/// Shared ledger, reporter and the connection of the latest run
pub struct Harness {
    pub ledger: MemoryLedger,
    pub reporter: RecordingReporter,
    pub conn: MemoryConnection,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_ledger(MemoryLedger::new())
    }

    pub fn with_ledger(ledger: MemoryLedger) -> Self {
        Self {
            ledger,
            reporter: RecordingReporter::new(),
            conn: MemoryConnection::new(),
        }
    }

    /// Start a run on a fresh connection
    pub async fn orchestrator(
        &mut self,
        units: Vec<SharedUnit<MemoryConnection>>,
    ) -> Orchestrator<MemoryConnection, MemoryLedger> {
        self.conn = MemoryConnection::new();
        Orchestrator::initialize(
            self.conn.clone(),
            units,
            self.ledger.clone(),
            Arc::new(self.reporter.clone()),
        )
        .await
        .expect("units should be valid")
    }

    pub fn journal(&self) -> Vec<String> {
        self.conn.journal()
    }

    pub fn downs(&self) -> Vec<String> {
        self.journal()
            .into_iter()
            .filter(|entry| entry.starts_with("down:"))
            .collect()
    }
}
