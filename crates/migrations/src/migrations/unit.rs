//! Migration Unit Execution - Runs a single migration in one direction
//!
//! Declarative units are read from disk and fed statement by statement to
//! the connection. Imperative units are resolved through the registry and
//! run as code.

use std::io::ErrorKind;

use tracing::debug;

use super::definitions::{MigrationDirection, MigrationKind, MigrationUnit};
use super::registry::UnitRegistry;
use super::splitter::StatementSplitter;
use crate::backends::DatabaseConnection;
use crate::error::{MigrateResult, MigrationError};

impl MigrationUnit {
    /// Apply this migration
    pub async fn up(
        &self,
        conn: &mut dyn DatabaseConnection,
        registry: &UnitRegistry,
    ) -> MigrateResult<()> {
        self.run(MigrationDirection::Up, conn, registry).await
    }

    /// Reverse this migration
    pub async fn down(
        &self,
        conn: &mut dyn DatabaseConnection,
        registry: &UnitRegistry,
    ) -> MigrateResult<()> {
        self.run(MigrationDirection::Down, conn, registry).await
    }

    /// Run this migration in `direction`
    pub async fn run(
        &self,
        direction: MigrationDirection,
        conn: &mut dyn DatabaseConnection,
        registry: &UnitRegistry,
    ) -> MigrateResult<()> {
        match self.kind() {
            MigrationKind::Declarative => self.run_declarative(direction, conn).await,
            MigrationKind::Imperative => {
                let unit = registry.resolve(self.locator())?;
                match direction {
                    MigrationDirection::Up => unit.up(conn).await,
                    MigrationDirection::Down => unit.down(conn).await,
                }
            }
        }
    }

    async fn run_declarative(
        &self,
        direction: MigrationDirection,
        conn: &mut dyn DatabaseConnection,
    ) -> MigrateResult<()> {
        let path = self
            .source_path(direction)
            .ok_or_else(|| MigrationError::UnitResolutionFailure(self.locator().to_string()))?;

        let sql = match std::fs::read_to_string(&path) {
            Ok(sql) => sql,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return match direction {
                    MigrationDirection::Up => Err(MigrationError::FileNotFound(path)),
                    MigrationDirection::Down => {
                        debug!(version = self.version(), "No down migration, nothing to undo");
                        Ok(())
                    }
                };
            }
            Err(source) => return Err(MigrationError::ReadFailure { path, source }),
        };

        for statement in StatementSplitter::new(&sql) {
            debug!(version = self.version(), %direction, sql = %statement, "Executing statement");
            let outcome = conn.execute(&statement, &[]).await;
            if let Err(e) = outcome {
                let message = match e {
                    MigrationError::Database(text) => text,
                    other => other.to_string(),
                };
                return Err(MigrationError::StatementExecutionFailure { statement, message });
            }
        }

        Ok(())
    }
}
