//! The ledger: durable record of which units have been applied.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::MigrateResult;

/// Migration status in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedRecord {
    /// Unit name
    pub name: String,
    /// When the unit was recorded as applied
    pub applied_at: DateTime<Utc>,
}

impl AppliedRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            applied_at: Utc::now(),
        }
    }
}

/// Storage of [`AppliedRecord`]s, reached through the connection `C`.
///
/// The ledger is the single source of truth for what has been applied; the
/// orchestrator re-reads it after any failure instead of trusting its own
/// bookkeeping.
#[async_trait]
pub trait Ledger<C: Send>: Send + Sync {
    /// Create the backing storage if it does not exist yet
    async fn ensure(&self, conn: &mut C) -> MigrateResult<()>;

    /// Applied records, oldest first. A ledger whose storage does not exist
    /// yet reports no records.
    async fn applied(&self, conn: &mut C) -> MigrateResult<Vec<AppliedRecord>>;

    /// Record a unit as applied
    async fn append(&self, conn: &mut C, name: &str) -> MigrateResult<()>;

    /// Remove the record of a reverted unit
    async fn remove(&self, conn: &mut C, name: &str) -> MigrateResult<()>;
}

/// Names in ledger order (oldest first)
pub fn applied_names(records: &[AppliedRecord]) -> Vec<String> {
    records.iter().map(|record| record.name.clone()).collect()
}

/// Names in reverse chronological order, at most `limit` of them
pub fn newest_first(records: &[AppliedRecord], limit: Option<usize>) -> Vec<String> {
    let newest = records.iter().rev().map(|record| record.name.clone());
    match limit {
        Some(limit) => newest.take(limit).collect(),
        None => newest.collect(),
    }
}

/// Whether the ledger lists `name`
pub fn contains(records: &[AppliedRecord], name: &str) -> bool {
    records.iter().any(|record| record.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(names: &[&str]) -> Vec<AppliedRecord> {
        names.iter().map(|name| AppliedRecord::new(*name)).collect()
    }

    #[test]
    fn test_newest_first() {
        let records = records(&["001_a", "002_b", "003_c"]);
        assert_eq!(newest_first(&records, Some(2)), vec!["003_c", "002_b"]);
        assert_eq!(newest_first(&records, None), vec!["003_c", "002_b", "001_a"]);
    }

    #[test]
    fn test_newest_first_clamps_limit() {
        let records = records(&["001_a"]);
        assert_eq!(newest_first(&records, Some(5)), vec!["001_a"]);
        assert!(newest_first(&[], Some(1)).is_empty());
    }

    #[test]
    fn test_contains() {
        let records = records(&["001_a"]);
        assert!(contains(&records, "001_a"));
        assert!(!contains(&records, "002_b"));
    }
}
