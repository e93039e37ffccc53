//! Migration Definitions - Core types and structures for migrations
//!
//! Defines the values that flow through the engine: discovered migration
//! units, ledger records, run results and status reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::MigrationError;

/// How a migration is expressed on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationKind {
    /// A `.up.sql` / `.down.sql` pair
    Declarative,
    /// A single file backed by a registered [`ExecutableUnit`](super::registry::ExecutableUnit)
    Imperative,
}

/// A migration discovered by the loader
///
/// Units are only built by [`MigrationLoader::load`](super::loader::MigrationLoader::load)
/// and never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationUnit {
    version: String,
    name: String,
    locator: String,
    kind: MigrationKind,
}

impl MigrationUnit {
    pub(crate) fn new(version: String, name: String, locator: String, kind: MigrationKind) -> Self {
        Self {
            version,
            name,
            locator,
            kind,
        }
    }

    /// Version string; ordering is byte-wise
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Human-readable name derived from the file name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path stem of a declarative pair, or registry key of an imperative unit
    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn kind(&self) -> MigrationKind {
        self.kind
    }

    /// Path of the source for the given direction (declarative units only)
    pub fn source_path(&self, direction: MigrationDirection) -> Option<PathBuf> {
        match self.kind {
            MigrationKind::Declarative => Some(PathBuf::from(format!(
                "{}.{}.sql",
                self.locator, direction
            ))),
            MigrationKind::Imperative => None,
        }
    }
}

/// A ledger entry for an applied migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub version: String,
    pub name: String,
    pub executed_at: DateTime<Utc>,
}

/// Configuration for the migration system
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Directory where migration files are stored
    pub migrations_dir: PathBuf,
    /// Table name for tracking migrations
    pub migrations_table: String,
}

impl MigrationConfig {
    /// Build a configuration from `MIGRATIONS_DIR` and `MIGRATIONS_TABLE`,
    /// falling back to the defaults for unset variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            migrations_dir: std::env::var("MIGRATIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.migrations_dir),
            migrations_table: std::env::var("MIGRATIONS_TABLE")
                .unwrap_or(defaults.migrations_table),
        }
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("migrations"),
            migrations_table: "elif_migrations".to_string(),
        }
    }
}

/// Outcome of `migrate` or `rollback`
///
/// Failures are reported here rather than as errors; `executed_versions` and
/// `rolled_back_versions` hold exactly the versions that took effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationRunResult {
    pub success: bool,
    pub message: String,
    pub executed_versions: Vec<String>,
    pub rolled_back_versions: Vec<String>,
}

impl MigrationRunResult {
    /// A successful run that did nothing
    pub fn noop(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            executed_versions: Vec::new(),
            rolled_back_versions: Vec::new(),
        }
    }

    /// A run that failed before any migration was attempted
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::noop(message)
        }
    }

    /// Attach the versions that took effect in the given direction
    pub(crate) fn with_versions(mut self, direction: MigrationDirection, versions: Vec<String>) -> Self {
        match direction {
            MigrationDirection::Up => self.executed_versions = versions,
            MigrationDirection::Down => self.rolled_back_versions = versions,
        }
        self
    }
}

/// Executed and pending migrations, in load order
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationStatus {
    pub executed: Vec<MigrationUnit>,
    pub pending: Vec<MigrationUnit>,
    pub error: Option<String>,
}

/// Migration direction for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationDirection {
    /// Apply the migration
    Up,
    /// Reverse the migration
    Down,
}

impl MigrationDirection {
    /// Verb used in failure messages
    pub fn verb(&self) -> &'static str {
        match self {
            MigrationDirection::Up => "executing",
            MigrationDirection::Down => "rolling back",
        }
    }
}

impl fmt::Display for MigrationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationDirection::Up => write!(f, "up"),
            MigrationDirection::Down => write!(f, "down"),
        }
    }
}

impl FromStr for MigrationDirection {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(MigrationDirection::Up),
            "down" => Ok(MigrationDirection::Down),
            other => Err(MigrationError::InvalidDirection(other.to_string())),
        }
    }
}
