//! Migration Ledger - Bookkeeping of applied migrations
//!
//! The [`Ledger`] trait is all the runner knows about persisted state.
//! [`SqlLedger`] keeps the records in a table on the target database and is
//! the only place that knows about per-dialect DDL.

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

use super::definitions::ExecutionRecord;
use crate::backends::{DatabaseConnection, DatabaseRow, DatabaseValue, SqlDialect};
use crate::error::{MigrateResult, MigrationError};

static TABLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid table name pattern"));

/// Persisted record of which migration versions have been applied
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Make sure the backing store exists
    async fn initialize_store(&self, conn: &mut dyn DatabaseConnection) -> MigrateResult<()>;

    /// Check whether `version` has been recorded
    async fn is_recorded(&self, conn: &mut dyn DatabaseConnection, version: &str) -> MigrateResult<bool>;

    /// Record `version` as applied
    async fn record(&self, conn: &mut dyn DatabaseConnection, version: &str, name: &str) -> MigrateResult<()>;

    /// Remove the record for `version`
    async fn unrecord(&self, conn: &mut dyn DatabaseConnection, version: &str) -> MigrateResult<()>;

    /// All recorded versions, ascending
    async fn recorded_versions(&self, conn: &mut dyn DatabaseConnection) -> MigrateResult<Vec<String>>;

    /// The greatest recorded version, if any
    async fn latest_recorded_version(
        &self,
        conn: &mut dyn DatabaseConnection,
    ) -> MigrateResult<Option<String>> {
        Ok(self.recorded_versions(conn).await?.pop())
    }
}

/// Ledger stored in a table on the migrated database
#[derive(Debug, Clone)]
pub struct SqlLedger {
    table: String,
    dialect: SqlDialect,
}

impl SqlLedger {
    /// Create a ledger using `table` for the given dialect
    pub fn new(table: impl Into<String>, dialect: SqlDialect) -> MigrateResult<Self> {
        let table = table.into();
        if !TABLE_NAME.is_match(&table) {
            return Err(MigrationError::LedgerInitFailure(format!(
                "'{}' is not a valid table name",
                table
            )));
        }

        Ok(Self { table, dialect })
    }

    /// Create a ledger for a backend name such as `postgres` or `sqlite`
    pub fn for_backend(backend: &str, table: impl Into<String>) -> MigrateResult<Self> {
        Self::new(table, backend.parse()?)
    }

    /// Create a ledger for the backend named by a database URL scheme
    pub fn from_url(database_url: &str, table: impl Into<String>) -> MigrateResult<Self> {
        Self::new(table, SqlDialect::from_url(database_url)?)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// All ledger entries ordered by version
    pub async fn records(&self, conn: &mut dyn DatabaseConnection) -> MigrateResult<Vec<ExecutionRecord>> {
        let sql = format!(
            "SELECT version, name, executed_at FROM {} ORDER BY version ASC",
            self.table
        );
        let rows = conn.fetch_all(&sql, &[]).await.map_err(ledger_error)?;

        rows.iter()
            .map(|row| -> MigrateResult<ExecutionRecord> {
                let executed_at = row
                    .get_by_name("executed_at")?
                    .as_datetime()
                    .ok_or_else(|| MigrationError::Ledger("Unreadable executed_at value".to_string()))?;

                Ok(ExecutionRecord {
                    version: text_column(row.as_ref(), "version")?,
                    name: text_column(row.as_ref(), "name")?,
                    executed_at,
                })
            })
            .collect()
    }

    /// SQL to create the ledger table
    pub fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                version VARCHAR(255) PRIMARY KEY,\n    \
                name VARCHAR(255) NOT NULL,\n    \
                executed_at {} NOT NULL DEFAULT {}\n\
            )",
            self.table,
            self.dialect.timestamp_type(),
            self.dialect.current_timestamp()
        )
    }

    fn placeholder(&self, index: usize) -> String {
        self.dialect.parameter_placeholder(index)
    }
}

#[async_trait]
impl Ledger for SqlLedger {
    async fn initialize_store(&self, conn: &mut dyn DatabaseConnection) -> MigrateResult<()> {
        conn.execute(&self.create_table_sql(), &[])
            .await
            .map_err(|e| MigrationError::LedgerInitFailure(driver_text(e)))?;
        Ok(())
    }

    async fn is_recorded(&self, conn: &mut dyn DatabaseConnection, version: &str) -> MigrateResult<bool> {
        let sql = format!(
            "SELECT version FROM {} WHERE version = {}",
            self.table,
            self.placeholder(0)
        );
        let rows = conn
            .fetch_all(&sql, &[DatabaseValue::from(version)])
            .await
            .map_err(ledger_error)?;
        Ok(!rows.is_empty())
    }

    async fn record(&self, conn: &mut dyn DatabaseConnection, version: &str, name: &str) -> MigrateResult<()> {
        let sql = format!(
            "INSERT INTO {} (version, name, executed_at) VALUES ({}, {}, {})",
            self.table,
            self.placeholder(0),
            self.placeholder(1),
            self.placeholder(2)
        );
        let params = [
            DatabaseValue::from(version),
            DatabaseValue::from(name),
            DatabaseValue::from(Utc::now()),
        ];
        conn.execute(&sql, &params).await.map_err(ledger_error)?;
        Ok(())
    }

    async fn unrecord(&self, conn: &mut dyn DatabaseConnection, version: &str) -> MigrateResult<()> {
        let sql = format!("DELETE FROM {} WHERE version = {}", self.table, self.placeholder(0));
        conn.execute(&sql, &[DatabaseValue::from(version)])
            .await
            .map_err(ledger_error)?;
        Ok(())
    }

    async fn recorded_versions(&self, conn: &mut dyn DatabaseConnection) -> MigrateResult<Vec<String>> {
        let sql = format!("SELECT version FROM {} ORDER BY version ASC", self.table);
        let rows = conn.fetch_all(&sql, &[]).await.map_err(ledger_error)?;

        let mut versions = rows
            .iter()
            .map(|row| text_column(row.as_ref(), "version"))
            .collect::<MigrateResult<Vec<_>>>()?;
        // Collation on the store may differ from byte order.
        versions.sort();
        Ok(versions)
    }
}

fn text_column(row: &dyn DatabaseRow, column: &str) -> MigrateResult<String> {
    match row.get_by_name(column)? {
        DatabaseValue::String(value) => Ok(value),
        other => Err(MigrationError::Ledger(format!(
            "Expected text in column '{}', got {:?}",
            column, other
        ))),
    }
}

fn driver_text(err: MigrationError) -> String {
    match err {
        MigrationError::Database(text) => text,
        other => other.to_string(),
    }
}

fn ledger_error(err: MigrationError) -> MigrationError {
    MigrationError::Ledger(driver_text(err))
}
