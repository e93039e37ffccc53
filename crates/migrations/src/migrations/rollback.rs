//! Migration Rollback - Reverses applied migrations
//!
//! Rolls back either the most recent migrations or everything applied after
//! a target version, newest first.

use std::collections::HashMap;

use tracing::{info, warn};

use super::definitions::{MigrationDirection, MigrationRunResult, MigrationUnit};
use super::runner::MigrationRunner;

const NOTHING_TO_ROLLBACK: &str = "No migrations to rollback";

impl MigrationRunner {
    /// Roll back the most recently applied migration
    pub async fn rollback(&mut self) -> MigrationRunResult {
        self.rollback_to(None, 1).await
    }

    /// Roll back applied migrations.
    ///
    /// With a `target`, every recorded version strictly greater than it is
    /// rolled back and `count` is ignored; otherwise the `count` most recent
    /// recorded versions are.
    pub async fn rollback_to(&mut self, target: Option<&str>, count: usize) -> MigrationRunResult {
        let recorded = match self.ledger.recorded_versions(self.connection.as_mut()).await {
            Ok(versions) => versions,
            Err(e) => return MigrationRunResult::failed(e.to_string()),
        };

        if recorded.is_empty() {
            return MigrationRunResult::noop(NOTHING_TO_ROLLBACK);
        }

        let selected = select_rollback_versions(recorded, target, count);

        let units = match self.loader.load() {
            Ok(units) => units,
            Err(e) => return MigrationRunResult::failed(e.to_string()),
        };
        let mut by_version: HashMap<String, MigrationUnit> = units
            .into_iter()
            .map(|unit| (unit.version().to_string(), unit))
            .collect();

        let mut batch: Vec<MigrationUnit> = Vec::with_capacity(selected.len());
        for version in &selected {
            match by_version.remove(version) {
                Some(unit) => batch.push(unit),
                None => warn!(%version, "Recorded migration has no file on disk, skipping"),
            }
        }

        if batch.is_empty() {
            return MigrationRunResult::noop(NOTHING_TO_ROLLBACK);
        }

        batch.sort_by(|a, b| b.version().as_bytes().cmp(a.version().as_bytes()));

        info!(count = batch.len(), target = ?target, "Rolling back migrations");
        let outcome = self.run_batch(&batch, MigrationDirection::Down).await;
        Self::finish(MigrationDirection::Down, outcome)
    }
}

/// Pick the recorded versions to roll back, newest first
pub(crate) fn select_rollback_versions(
    mut recorded: Vec<String>,
    target: Option<&str>,
    count: usize,
) -> Vec<String> {
    recorded.sort_by(|a, b| b.as_bytes().cmp(a.as_bytes()));

    match target {
        Some(target) => recorded
            .into_iter()
            .filter(|version| version.as_bytes() > target.as_bytes())
            .collect(),
        None => recorded.into_iter().take(count).collect(),
    }
}
