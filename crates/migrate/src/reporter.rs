//! Lifecycle events emitted by the orchestrator and the sinks that receive them.

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::plan::ListStatus;

/// Named lifecycle events, in the order the orchestrator emits them
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationEvent {
    LookingForPending,
    NoPending,
    ApplyingPending(usize),
    AppliedCount(usize),
    AppliedName(String),
    ErrorApplying(String),
    BrokenMigration(String),
    Reverting,
    RevertedName(String),
    ErrorReverting { name: String, error: String },
    NothingToRevert,
    Searching(ListStatus),
    FoundCount(ListStatus, usize),
    FoundName(ListStatus, String),
}

impl fmt::Display for MigrationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationEvent::LookingForPending => write!(f, "Looking for pending migrations"),
            MigrationEvent::NoPending => write!(f, "No pending migrations"),
            MigrationEvent::ApplyingPending(n) => write!(f, "Applying {} pending migration(s)", n),
            MigrationEvent::AppliedCount(n) => write!(f, "Applied {} migration(s)", n),
            MigrationEvent::AppliedName(name) => write!(f, "Applied {}", name),
            MigrationEvent::ErrorApplying(error) => {
                write!(f, "Error applying migrations: {}", error)
            }
            MigrationEvent::BrokenMigration(name) => write!(f, "Broken migration: {}", name),
            MigrationEvent::Reverting => write!(f, "Reverting migrations"),
            MigrationEvent::RevertedName(name) => write!(f, "Reverted {}", name),
            MigrationEvent::ErrorReverting { name, error } => {
                write!(f, "Error reverting {}: {}", name, error)
            }
            MigrationEvent::NothingToRevert => write!(f, "Nothing to revert"),
            MigrationEvent::Searching(status) => write!(f, "Searching for {} migrations", status),
            MigrationEvent::FoundCount(status, n) => {
                write!(f, "Found {} {} migration(s)", n, status)
            }
            MigrationEvent::FoundName(status, name) => write!(f, "{}: {}", status, name),
        }
    }
}

/// Receives lifecycle events. Formatting and destination are up to the sink.
pub trait Reporter: Send + Sync {
    fn report(&self, event: &MigrationEvent);
}

/// Renders events as `tracing` events under the `stratum::migrate` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, event: &MigrationEvent) {
        match event {
            MigrationEvent::ErrorApplying(error) => {
                tracing::error!(target: "stratum::migrate", %error, "{}", event)
            }
            MigrationEvent::ErrorReverting { name, error } => {
                tracing::error!(target: "stratum::migrate", migration = %name, %error, "{}", event)
            }
            MigrationEvent::BrokenMigration(name) => {
                tracing::warn!(target: "stratum::migrate", migration = %name, "{}", event)
            }
            MigrationEvent::AppliedName(name) | MigrationEvent::RevertedName(name) => {
                tracing::info!(target: "stratum::migrate", migration = %name, "{}", event)
            }
            MigrationEvent::FoundName(status, name) => {
                tracing::info!(
                    target: "stratum::migrate",
                    status = %status,
                    migration = %name,
                    "{}",
                    event
                )
            }
            _ => tracing::info!(target: "stratum::migrate", "{}", event),
        }
    }
}

/// Keeps every event in memory; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<MigrationEvent>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far
    pub fn events(&self) -> Vec<MigrationEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn contains(&self, event: &MigrationEvent) -> bool {
        self.events().contains(event)
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, event: &MigrationEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}
