//! In-memory connection and ledger.
//!
//! Both types are cheap handles over shared state: a clone kept by the caller
//! observes everything the orchestrator does with the handle it was given.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::connection::Connection;
use crate::error::{MigrateError, MigrateResult};
use crate::ledger::{AppliedRecord, Ledger};
use crate::loader::SqlMigration;
use crate::unit::{Direction, MigrationUnit};

/// Connection that records executed statements instead of sending them anywhere
#[derive(Debug, Clone, Default)]
pub struct MemoryConnection {
    journal: Arc<Mutex<Vec<String>>>,
    boundaries: Arc<Mutex<Vec<&'static str>>>,
    closed: Arc<AtomicBool>,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a statement to the journal
    pub fn execute(&mut self, statement: impl Into<String>) {
        lock(&self.journal).push(statement.into());
    }

    /// Statements executed so far, in order
    pub fn journal(&self) -> Vec<String> {
        lock(&self.journal).clone()
    }

    /// Unit-of-work boundaries seen so far: `begin`, `commit` or `rollback`
    pub fn boundaries(&self) -> Vec<&'static str> {
        lock(&self.boundaries).clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn begin_unit(&mut self) -> MigrateResult<()> {
        lock(&self.boundaries).push("begin");
        Ok(())
    }

    async fn commit_unit(&mut self) -> MigrateResult<()> {
        lock(&self.boundaries).push("commit");
        Ok(())
    }

    async fn rollback_unit(&mut self) -> MigrateResult<()> {
        lock(&self.boundaries).push("rollback");
        Ok(())
    }

    async fn close(self) -> MigrateResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    records: Vec<AppliedRecord>,
    rejected_appends: HashSet<String>,
    unacknowledged_appends: HashSet<String>,
    ensured: bool,
}

/// Ledger kept in process memory. Works with any connection type.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger that already lists `names`, oldest first
    pub fn with_applied<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ledger = Self::new();
        lock(&ledger.state)
            .records
            .extend(names.into_iter().map(AppliedRecord::new));
        ledger
    }

    /// Make every `append` of `name` fail, leaving no record behind
    pub fn reject_append(self, name: impl Into<String>) -> Self {
        lock(&self.state).rejected_appends.insert(name.into());
        self
    }

    /// Make every `append` of `name` store the record and still fail
    pub fn fail_after_append(self, name: impl Into<String>) -> Self {
        lock(&self.state).unacknowledged_appends.insert(name.into());
        self
    }

    /// Recorded names, oldest first
    pub fn names(&self) -> Vec<String> {
        lock(&self.state)
            .records
            .iter()
            .map(|record| record.name.clone())
            .collect()
    }

    /// Whether `ensure` has been called
    pub fn is_ensured(&self) -> bool {
        lock(&self.state).ensured
    }
}

#[async_trait]
impl<C: Send> Ledger<C> for MemoryLedger {
    async fn ensure(&self, _conn: &mut C) -> MigrateResult<()> {
        lock(&self.state).ensured = true;
        Ok(())
    }

    async fn applied(&self, _conn: &mut C) -> MigrateResult<Vec<AppliedRecord>> {
        Ok(lock(&self.state).records.clone())
    }

    async fn append(&self, _conn: &mut C, name: &str) -> MigrateResult<()> {
        let mut state = lock(&self.state);
        if state.rejected_appends.contains(name) {
            return Err(MigrateError::ledger(format!("Failed to record migration {}", name)));
        }
        if state.records.iter().any(|record| record.name == name) {
            return Err(MigrateError::ledger(format!("Migration {} is already recorded", name)));
        }
        state.records.push(AppliedRecord::new(name));
        if state.unacknowledged_appends.contains(name) {
            return Err(MigrateError::ledger(format!(
                "Lost acknowledgement recording migration {}",
                name
            )));
        }
        Ok(())
    }

    async fn remove(&self, _conn: &mut C, name: &str) -> MigrateResult<()> {
        let mut state = lock(&self.state);
        let index = state
            .records
            .iter()
            .position(|record| record.name == name)
            .ok_or_else(|| MigrateError::ledger(format!("Migration {} is not recorded", name)))?;
        state.records.remove(index);
        Ok(())
    }
}

#[async_trait]
impl MigrationUnit<MemoryConnection> for SqlMigration {
    fn name(&self) -> &str {
        &self.name
    }

    async fn up(&self, conn: &mut MemoryConnection) -> MigrateResult<()> {
        for statement in self.statements(Direction::Up) {
            conn.execute(statement.as_str());
        }
        Ok(())
    }

    async fn down(&self, conn: &mut MemoryConnection) -> MigrateResult<()> {
        for statement in self.statements(Direction::Down) {
            conn.execute(statement.as_str());
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
