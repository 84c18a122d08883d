//! Values computed per invocation: the run plan, apply outcomes and the
//! shapes of revert and list requests.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{MigrateError, MigrateResult};

/// Pending-set computation for one run
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// Every loaded unit name, in application order
    pub all_units: Vec<String>,
    /// Names the ledger reports as applied
    pub applied_names: HashSet<String>,
    /// `all_units` minus `applied_names`, in `all_units` order
    pub pending_names: Vec<String>,
}

impl RunPlan {
    pub fn new<I, S>(all_units: Vec<String>, applied: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let applied_names: HashSet<String> = applied.into_iter().map(Into::into).collect();
        let pending_names = all_units
            .iter()
            .filter(|name| !applied_names.contains(*name))
            .cloned()
            .collect();

        Self {
            all_units,
            applied_names,
            pending_names,
        }
    }

    pub fn is_up_to_date(&self) -> bool {
        self.pending_names.is_empty()
    }

    /// Pending names the ledger confirms after a failed run, in pending order.
    ///
    /// `failed` is the unit whose up-plus-record step returned the error. It
    /// never counts as committed, even when its record did reach the ledger.
    pub fn committed_subset(&self, applied_after: &HashSet<String>, failed: &str) -> Vec<String> {
        self.pending_names
            .iter()
            .filter(|name| name.as_str() != failed && applied_after.contains(*name))
            .cloned()
            .collect()
    }

    /// The unit that broke the run: the pending name right after the last
    /// committed one that is itself uncommitted, wrapping around to the start
    /// of the pending list. Returns `None` when the ledger confirms every
    /// pending name.
    pub fn first_broken(&self, committed: &[String]) -> Option<&str> {
        let after_last = match committed.last() {
            None => 0,
            Some(last) => self
                .pending_names
                .iter()
                .position(|name| name == last)
                .map_or(0, |index| index + 1),
        };

        self.pending_names[after_last..]
            .iter()
            .chain(self.pending_names[..after_last].iter())
            .find(|name| !committed.contains(*name))
            .map(String::as_str)
    }
}

/// Diagnosis of a failed apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReport {
    /// Pending units the ledger confirmed after the failure, in pending order
    pub committed_before_failure: Vec<String>,
    pub first_broken_name: String,
    /// The error that stopped the run
    pub error: String,
    /// Units undone by auto-revert, in the order they were reverted
    pub reverted: Vec<String>,
    /// Set when auto-revert itself stopped on an error
    pub revert_error: Option<String>,
}

/// Result of an apply. Migration failures are reported here, not as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyOutcome {
    pub success: bool,
    /// Units this run left applied
    pub applied: Vec<String>,
    pub report: Option<FailureReport>,
}

impl ApplyOutcome {
    pub fn up_to_date() -> Self {
        Self::completed(Vec::new())
    }

    pub fn completed(applied: Vec<String>) -> Self {
        Self {
            success: true,
            applied,
            report: None,
        }
    }

    pub fn failed(report: FailureReport) -> Self {
        let applied = report
            .committed_before_failure
            .iter()
            .filter(|name| !report.reverted.contains(*name))
            .cloned()
            .collect();

        Self {
            success: false,
            applied,
            report: Some(report),
        }
    }
}

/// What a revert should undo
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertTarget {
    /// The most recently applied unit
    Latest,
    /// The `n` most recently applied units, fewer if fewer are applied
    Count(usize),
    /// Exactly the named unit
    Name(String),
}

impl RevertTarget {
    /// Build a target from `--times` / `--name` style arguments. A name
    /// always wins; otherwise `times` must be at least 1.
    pub fn from_args(times: i64, name: Option<String>) -> MigrateResult<Self> {
        if let Some(name) = name {
            if name.trim().is_empty() {
                return Err(MigrateError::invalid_argument("Migration name cannot be empty"));
            }
            return Ok(Self::Name(name));
        }

        match times {
            t if t < 1 => Err(MigrateError::invalid_argument(format!(
                "Revert count must be at least 1, got {}",
                t
            ))),
            1 => Ok(Self::Latest),
            t => usize::try_from(t).map(Self::Count).map_err(|_| {
                MigrateError::invalid_argument(format!("Revert count {} is too large", t))
            }),
        }
    }
}

/// Which side of the ledger a listing shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListStatus {
    Executed,
    Pending,
}

impl ListStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListStatus::Executed => "executed",
            ListStatus::Pending => "pending",
        }
    }
}

impl fmt::Display for ListStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListStatus {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "executed" => Ok(ListStatus::Executed),
            "pending" => Ok(ListStatus::Pending),
            other => Err(MigrateError::invalid_argument(format!(
                "Unknown status '{}', expected pending or executed",
                other
            ))),
        }
    }
}
