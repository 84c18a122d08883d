//! # stratum-migrate
//!
//! Ledger-driven schema migrations. Given an ordered set of migration units
//! and a ledger of what has already been applied, the [`Orchestrator`]
//! computes the pending set, applies it in order, and records each success so
//! that repeated runs are idempotent. It also reverts by count, by name or all
//! the way back ([`Orchestrator::reset`]), and lists executed or pending units.
//!
//! When a unit fails mid-run the ledger is re-read to decide which units of
//! the run actually committed; those, and only those, can be reverted again
//! automatically.

pub mod backends;
pub mod connection;
pub mod error;
pub mod ledger;
pub mod loader;
pub mod orchestrator;
pub mod plan;
pub mod reporter;
pub mod unit;

pub use connection::{Connection, ConnectionProvider};
pub use error::{MigrateError, MigrateResult};
pub use ledger::{AppliedRecord, Ledger};
pub use loader::{MigrationLoader, SqlMigration};
pub use orchestrator::Orchestrator;
pub use plan::{ApplyOutcome, FailureReport, ListStatus, RevertTarget, RunPlan};
pub use reporter::{MigrationEvent, RecordingReporter, Reporter, TracingReporter};
pub use unit::{Direction, MigrationUnit, SharedUnit};
