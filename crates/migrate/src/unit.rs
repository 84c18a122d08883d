//! Migration units and the helpers that order and select them.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::{MigrateError, MigrateResult};

/// Migration direction for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Apply the migration
    Up,
    /// Reverse the migration
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// A single named, ordered change with a forward and a backward operation.
///
/// Units run against the connection type `C` they were written for. Names
/// must be unique; their lexicographic order is the order of application, so
/// timestamp prefixes (`20240101_120000_create_users`) sort chronologically.
#[async_trait]
pub trait MigrationUnit<C: Send>: Send + Sync {
    fn name(&self) -> &str;

    /// Apply the change
    async fn up(&self, conn: &mut C) -> MigrateResult<()>;

    /// Reverse the change
    async fn down(&self, conn: &mut C) -> MigrateResult<()>;
}

/// Shared handle to a unit, as held by the orchestrator
pub type SharedUnit<C> = Arc<dyn MigrationUnit<C>>;

/// Wrap a concrete unit into a [`SharedUnit`]
pub fn shared<C, U>(unit: U) -> SharedUnit<C>
where
    C: Send,
    U: MigrationUnit<C> + 'static,
{
    Arc::new(unit)
}

/// Sort units into application order and reject duplicate names
pub fn arrange<C: Send>(mut units: Vec<SharedUnit<C>>) -> MigrateResult<Vec<SharedUnit<C>>> {
    units.sort_by(|a, b| a.name().cmp(b.name()));

    let mut seen = HashSet::with_capacity(units.len());
    for unit in &units {
        if unit.name().trim().is_empty() {
            return Err(MigrateError::invalid_argument("Migration names cannot be empty"));
        }
        if !seen.insert(unit.name()) {
            return Err(MigrateError::invalid_argument(format!(
                "Duplicate migration name: {}",
                unit.name()
            )));
        }
    }

    Ok(units)
}

/// Names of the units, in the order given
pub fn names<C: Send>(units: &[SharedUnit<C>]) -> Vec<String> {
    units.iter().map(|unit| unit.name().to_string()).collect()
}

/// Look up a unit in a slice already ordered by [`arrange`]
pub fn find<'a, C: Send>(units: &'a [SharedUnit<C>], name: &str) -> Option<&'a SharedUnit<C>> {
    units
        .binary_search_by(|unit| unit.name().cmp(name))
        .ok()
        .map(|index| &units[index])
}
