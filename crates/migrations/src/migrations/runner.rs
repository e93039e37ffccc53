//! Migration Runner - Executes migrations against the database
//!
//! Compares the migrations on disk with the ledger and runs whatever is
//! pending, one unit at a time. A batch stops at the first failure and the
//! result reports exactly which versions took effect before it.

use std::collections::HashSet;

use tracing::{error, info};

use super::definitions::{MigrationDirection, MigrationRunResult, MigrationStatus, MigrationUnit};
use super::ledger::Ledger;
use super::loader::MigrationLoader;
use super::registry::UnitRegistry;
use crate::backends::DatabaseConnection;

/// A batch that stopped early
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    /// Description of the failing unit and its cause
    pub message: String,
    /// Versions that completed before the failure
    pub completed: Vec<String>,
}

/// Migration runner that executes migrations against a database
pub struct MigrationRunner {
    pub(super) loader: MigrationLoader,
    pub(super) ledger: Box<dyn Ledger>,
    pub(super) connection: Box<dyn DatabaseConnection>,
    pub(super) registry: UnitRegistry,
}

impl MigrationRunner {
    /// Create a new migration runner
    pub fn new(
        loader: MigrationLoader,
        ledger: Box<dyn Ledger>,
        connection: Box<dyn DatabaseConnection>,
    ) -> Self {
        Self {
            loader,
            ledger,
            connection,
            registry: UnitRegistry::new(),
        }
    }

    /// Use `registry` to resolve imperative migrations
    pub fn with_registry(mut self, registry: UnitRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Run all pending migrations
    pub async fn migrate(&mut self) -> MigrationRunResult {
        if let Err(e) = self.ledger.initialize_store(self.connection.as_mut()).await {
            error!(error = %e, "Could not prepare migration ledger");
            return MigrationRunResult::failed(e.to_string());
        }

        let units = match self.loader.load() {
            Ok(units) => units,
            Err(e) => return MigrationRunResult::failed(e.to_string()),
        };

        let recorded: HashSet<String> = match self.ledger.recorded_versions(self.connection.as_mut()).await {
            Ok(versions) => versions.into_iter().collect(),
            Err(e) => return MigrationRunResult::failed(e.to_string()),
        };

        let pending: Vec<MigrationUnit> = units
            .into_iter()
            .filter(|unit| !recorded.contains(unit.version()))
            .collect();

        if pending.is_empty() {
            info!("No pending migrations");
            return MigrationRunResult::noop("No pending migrations");
        }

        info!(count = pending.len(), "Running pending migrations");
        let outcome = self.run_batch(&pending, MigrationDirection::Up).await;
        Self::finish(MigrationDirection::Up, outcome)
    }

    /// Report which migrations are executed and which are pending
    pub async fn status(&mut self) -> MigrationStatus {
        let units = match self.loader.load() {
            Ok(units) => units,
            Err(e) => {
                return MigrationStatus {
                    error: Some(e.to_string()),
                    ..Default::default()
                }
            }
        };

        let recorded: HashSet<String> = match self.ledger.recorded_versions(self.connection.as_mut()).await {
            Ok(versions) => versions.into_iter().collect(),
            Err(e) => {
                return MigrationStatus {
                    pending: units,
                    error: Some(e.to_string()),
                    ..Default::default()
                }
            }
        };

        let (executed, pending): (Vec<MigrationUnit>, Vec<MigrationUnit>) = units
            .into_iter()
            .partition(|unit| recorded.contains(unit.version()));

        MigrationStatus {
            executed,
            pending,
            error: None,
        }
    }

    /// Run `units` in order, stopping at the first failure.
    ///
    /// Each successful unit is recorded (or unrecorded) in the ledger before
    /// the next one starts.
    pub(crate) async fn run_batch(
        &mut self,
        units: &[MigrationUnit],
        direction: MigrationDirection,
    ) -> Result<Vec<String>, BatchFailure> {
        let mut completed = Vec::with_capacity(units.len());

        for unit in units {
            info!(version = unit.version(), name = unit.name(), %direction, "Running migration");

            let conn = self.connection.as_mut();
            let mut outcome = unit.run(direction, conn, &self.registry).await;
            if outcome.is_ok() {
                outcome = match direction {
                    MigrationDirection::Up => {
                        self.ledger
                            .record(self.connection.as_mut(), unit.version(), unit.name())
                            .await
                    }
                    MigrationDirection::Down => {
                        self.ledger
                            .unrecord(self.connection.as_mut(), unit.version())
                            .await
                    }
                };
            }

            if let Err(e) = outcome {
                let message = format!(
                    "Error {} migration {} ({}): {}",
                    direction.verb(),
                    unit.version(),
                    unit.name(),
                    e
                );
                error!(version = unit.version(), %direction, error = %e, "Migration failed");
                return Err(BatchFailure { message, completed });
            }

            completed.push(unit.version().to_string());
        }

        Ok(completed)
    }

    /// Turn a batch outcome into the run result reported to callers
    pub(crate) fn finish(
        direction: MigrationDirection,
        outcome: Result<Vec<String>, BatchFailure>,
    ) -> MigrationRunResult {
        match outcome {
            Err(BatchFailure { message, completed }) => {
                MigrationRunResult::failed(message).with_versions(direction, completed)
            }
            Ok(completed) => {
                let message = match (completed.len(), direction) {
                    (0, direction) => format!("No migrations {}", direction),
                    (n, MigrationDirection::Up) => format!("Executed {} migration(s)", n),
                    (n, MigrationDirection::Down) => format!("Rolled back {} migration(s)", n),
                };
                info!("{}", message);
                MigrationRunResult::noop(message).with_versions(direction, completed)
            }
        }
    }
}

impl std::fmt::Debug for MigrationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationRunner")
            .field("loader", &self.loader)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
