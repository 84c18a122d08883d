//! Orchestrator - drives apply, revert, reset and list against the ledger.
//!
//! Every public operation consumes the orchestrator and closes its connection
//! before returning, whether the operation succeeded or not. A run therefore
//! performs exactly one operation.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::error::{MigrateError, MigrateResult};
use crate::ledger::{self, Ledger};
use crate::plan::{ApplyOutcome, FailureReport, ListStatus, RevertTarget, RunPlan};
use crate::reporter::{MigrationEvent, Reporter};
use crate::unit::{self, Direction, SharedUnit};

/// Applies and reverts migration units for a single invocation
pub struct Orchestrator<C, L>
where
    C: Connection,
    L: Ledger<C>,
{
    conn: C,
    session: Session<C, L>,
}

struct Session<C, L>
where
    C: Connection,
    L: Ledger<C>,
{
    units: Vec<SharedUnit<C>>,
    ledger: L,
    reporter: Arc<dyn Reporter>,
}

impl<C, L> Orchestrator<C, L>
where
    C: Connection,
    L: Ledger<C>,
{
    /// Take ownership of an open connection, the loaded units and the ledger.
    ///
    /// Units are put into name order. No I/O happens here, except closing the
    /// connection when the units are rejected (duplicate or blank names).
    pub async fn initialize(
        conn: C,
        units: Vec<SharedUnit<C>>,
        ledger: L,
        reporter: Arc<dyn Reporter>,
    ) -> MigrateResult<Self> {
        match unit::arrange(units) {
            Ok(units) => Ok(Self {
                conn,
                session: Session {
                    units,
                    ledger,
                    reporter,
                },
            }),
            Err(error) => release(conn, Err(error)).await,
        }
    }

    /// Names of the loaded units, in application order
    pub fn unit_names(&self) -> Vec<String> {
        unit::names(&self.session.units)
    }

    /// Apply every pending unit in order.
    ///
    /// A failing unit does not produce an error: the outcome carries a
    /// [`FailureReport`] instead, and with `revert_on_error` the units this
    /// run committed are reverted again. Errors are returned only for
    /// conditions that prevent a diagnosis, such as losing the ledger.
    pub async fn apply(self, revert_on_error: bool) -> MigrateResult<ApplyOutcome> {
        let Self { mut conn, session } = self;
        let result = session.apply(&mut conn, revert_on_error).await;
        release(conn, result).await
    }

    /// Revert the latest, the `n` latest, or one named unit.
    /// Returns the reverted names in the order they were reverted.
    pub async fn revert(self, target: RevertTarget) -> MigrateResult<Vec<String>> {
        let Self { mut conn, session } = self;
        let result = session.revert(&mut conn, target).await;
        release(conn, result).await
    }

    /// Revert every applied unit, newest first
    pub async fn reset(self) -> MigrateResult<Vec<String>> {
        let Self { mut conn, session } = self;
        let result = session.reset(&mut conn).await;
        release(conn, result).await
    }

    /// Executed names in ledger order, or pending names in definition order
    pub async fn list(self, status: ListStatus) -> MigrateResult<Vec<String>> {
        let Self { mut conn, session } = self;
        let result = session.list(&mut conn, status).await;
        release(conn, result).await
    }
}

impl<C, L> Session<C, L>
where
    C: Connection,
    L: Ledger<C>,
{
    fn emit(&self, event: MigrationEvent) {
        self.reporter.report(&event);
    }

    fn unit(&self, name: &str) -> MigrateResult<&SharedUnit<C>> {
        unit::find(&self.units, name).ok_or_else(|| MigrateError::UnknownMigration {
            name: name.to_string(),
        })
    }

    async fn plan(&self, conn: &mut C) -> MigrateResult<RunPlan> {
        let applied = self.ledger.applied(conn).await?;
        Ok(RunPlan::new(
            unit::names(&self.units),
            ledger::applied_names(&applied),
        ))
    }

    async fn apply(&self, conn: &mut C, revert_on_error: bool) -> MigrateResult<ApplyOutcome> {
        self.ledger.ensure(conn).await?;

        self.emit(MigrationEvent::LookingForPending);
        let plan = self.plan(conn).await?;
        if plan.is_up_to_date() {
            self.emit(MigrationEvent::NoPending);
            return Ok(ApplyOutcome::up_to_date());
        }

        self.emit(MigrationEvent::ApplyingPending(plan.pending_names.len()));

        let mut applied = Vec::with_capacity(plan.pending_names.len());
        for name in &plan.pending_names {
            let unit = self.unit(name)?;
            if let Err(error) = self.commit(conn, unit).await {
                return self
                    .recover(conn, &plan, name, error, revert_on_error)
                    .await;
            }
            applied.push(name.clone());
        }

        self.emit(MigrationEvent::AppliedCount(applied.len()));
        for name in &applied {
            self.emit(MigrationEvent::AppliedName(name.clone()));
        }

        Ok(ApplyOutcome::completed(applied))
    }

    /// Run `up()` and record it in one unit of work. Both steps must succeed
    /// for the unit to count as committed.
    async fn commit(&self, conn: &mut C, unit: &SharedUnit<C>) -> MigrateResult<()> {
        let started = Instant::now();
        debug!(migration = unit.name(), "Running up");

        conn.begin_unit().await?;
        let result = self.up_and_record(conn, unit).await;
        finish_unit(conn, result).await?;

        debug!(
            migration = unit.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Committed"
        );
        Ok(())
    }

    async fn up_and_record(&self, conn: &mut C, unit: &SharedUnit<C>) -> MigrateResult<()> {
        unit.up(conn)
            .await
            .map_err(|e| e.in_operation(unit.name(), Direction::Up))?;
        self.ledger.append(conn, unit.name()).await
    }

    async fn recover(
        &self,
        conn: &mut C,
        plan: &RunPlan,
        failed: &str,
        error: MigrateError,
        revert_on_error: bool,
    ) -> MigrateResult<ApplyOutcome> {
        self.emit(MigrationEvent::ErrorApplying(error.to_string()));

        // The ledger, not the loop, decides what committed
        let records = self.ledger.applied(conn).await?;
        let applied_after: HashSet<String> = ledger::applied_names(&records).into_iter().collect();
        let committed = plan.committed_subset(&applied_after, failed);
        if applied_after.contains(failed) {
            warn!(
                migration = failed,
                "Ledger records a migration whose run reported an error; it is left in place"
            );
        }

        let first_broken = plan.first_broken(&committed).unwrap_or(failed).to_string();
        if first_broken != failed {
            warn!(
                failed_unit = failed,
                first_broken = %first_broken,
                "Ledger state does not match the unit that failed"
            );
        }
        self.emit(MigrationEvent::BrokenMigration(first_broken.clone()));

        let mut reverted = Vec::new();
        let mut revert_error = None;
        if revert_on_error && !committed.is_empty() {
            self.emit(MigrationEvent::Reverting);
            for name in committed.iter().rev() {
                if let Err(e) = self.revert_one(conn, name).await {
                    self.emit(MigrationEvent::ErrorReverting {
                        name: name.clone(),
                        error: e.to_string(),
                    });
                    revert_error = Some(e.to_string());
                    break;
                }
                reverted.push(name.clone());
            }
        }

        Ok(ApplyOutcome::failed(FailureReport {
            committed_before_failure: committed,
            first_broken_name: first_broken,
            error: error.to_string(),
            reverted,
            revert_error,
        }))
    }

    async fn revert(&self, conn: &mut C, target: RevertTarget) -> MigrateResult<Vec<String>> {
        let applied = self.ledger.applied(conn).await?;

        let targets = match target {
            RevertTarget::Name(name) => {
                if !ledger::contains(&applied, &name) {
                    return Err(MigrateError::invalid_argument(format!(
                        "Migration {} has not been applied",
                        name
                    )));
                }
                vec![name]
            }
            RevertTarget::Latest => ledger::newest_first(&applied, Some(1)),
            RevertTarget::Count(n) => ledger::newest_first(&applied, Some(n)),
        };

        self.revert_names(conn, targets).await
    }

    async fn reset(&self, conn: &mut C) -> MigrateResult<Vec<String>> {
        let applied = self.ledger.applied(conn).await?;
        self.revert_names(conn, ledger::newest_first(&applied, None)).await
    }

    /// Revert `targets` in the given order, stopping at the first failure
    async fn revert_names(&self, conn: &mut C, targets: Vec<String>) -> MigrateResult<Vec<String>> {
        if targets.is_empty() {
            self.emit(MigrationEvent::NothingToRevert);
            return Ok(targets);
        }

        // Every target must have a loaded unit before anything is undone
        for name in &targets {
            self.unit(name)?;
        }

        self.emit(MigrationEvent::Reverting);
        for name in &targets {
            self.revert_one(conn, name).await?;
        }

        Ok(targets)
    }

    async fn revert_one(&self, conn: &mut C, name: &str) -> MigrateResult<()> {
        let unit = self.unit(name)?;
        debug!(migration = name, "Running down");

        conn.begin_unit().await?;
        let result = self.down_and_forget(conn, unit).await;
        finish_unit(conn, result).await?;

        self.emit(MigrationEvent::RevertedName(name.to_string()));
        Ok(())
    }

    async fn down_and_forget(&self, conn: &mut C, unit: &SharedUnit<C>) -> MigrateResult<()> {
        unit.down(conn)
            .await
            .map_err(|e| e.in_operation(unit.name(), Direction::Down))?;
        self.ledger.remove(conn, unit.name()).await
    }

    async fn list(&self, conn: &mut C, status: ListStatus) -> MigrateResult<Vec<String>> {
        self.emit(MigrationEvent::Searching(status));

        let names = match status {
            ListStatus::Executed => ledger::applied_names(&self.ledger.applied(conn).await?),
            ListStatus::Pending => self.plan(conn).await?.pending_names,
        };

        self.emit(MigrationEvent::FoundCount(status, names.len()));
        for name in &names {
            self.emit(MigrationEvent::FoundName(status, name.clone()));
        }

        Ok(names)
    }
}

/// Commit the unit of work on success, roll it back otherwise. A failed
/// rollback is logged; the original error is what the caller sees.
async fn finish_unit<C: Connection>(conn: &mut C, result: MigrateResult<()>) -> MigrateResult<()> {
    match result {
        Ok(()) => conn.commit_unit().await,
        Err(error) => {
            if let Err(rollback) = conn.rollback_unit().await {
                warn!(error = %rollback, "Failed to roll back unit of work");
            }
            Err(error)
        }
    }
}

/// Close the connection and hand back the operation's result. A failure to
/// close is logged; it never replaces the result.
async fn release<C: Connection, T>(conn: C, result: MigrateResult<T>) -> MigrateResult<T> {
    if let Err(error) = conn.close().await {
        warn!(%error, "Failed to close database connection");
    }
    result
}
