//! Core Database Backend Traits
//!
//! The migration engine never talks to a driver directly. Statements and
//! ledger queries go through [`DatabaseConnection`], and the SQL flavour of
//! the target store is described by [`SqlDialect`].

use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::{MigrateResult, MigrationError};

/// Abstract database connection trait
///
/// Errors carry the driver's error text, which the engine embeds verbatim in
/// its failure messages.
#[async_trait]
pub trait DatabaseConnection: Send + Sync {
    /// Execute a statement and return affected rows count
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<u64>;

    /// Execute a query and return the result rows
    async fn fetch_all(
        &mut self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> MigrateResult<Vec<Box<dyn DatabaseRow>>>;
}

/// Abstract database row trait
pub trait DatabaseRow: Send + Sync {
    /// Get a column value by index
    fn get_by_index(&self, index: usize) -> MigrateResult<DatabaseValue>;

    /// Get a column value by name
    fn get_by_name(&self, name: &str) -> MigrateResult<DatabaseValue>;

    /// Get column count
    fn column_count(&self) -> usize;
}

/// Database value enumeration for type-safe parameter binding
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    String(String),
    Uuid(uuid::Uuid),
    DateTime(chrono::DateTime<chrono::Utc>),
    Json(JsonValue),
}

impl DatabaseValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Interpret the value as a UTC timestamp.
    ///
    /// Drivers without a native timestamp type hand back text, so RFC 3339
    /// and `YYYY-MM-DD HH:MM:SS` strings are accepted too.
    pub fn as_datetime(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        match self {
            DatabaseValue::DateTime(dt) => Some(*dt),
            DatabaseValue::String(s) => chrono::DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .ok()
                .or_else(|| {
                    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                        .ok()
                        .map(|naive| naive.and_utc())
                }),
            _ => None,
        }
    }
}

impl From<bool> for DatabaseValue {
    fn from(value: bool) -> Self {
        DatabaseValue::Bool(value)
    }
}

impl From<i32> for DatabaseValue {
    fn from(value: i32) -> Self {
        DatabaseValue::Int32(value)
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<f64> for DatabaseValue {
    fn from(value: f64) -> Self {
        DatabaseValue::Float64(value)
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::String(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

impl From<uuid::Uuid> for DatabaseValue {
    fn from(value: uuid::Uuid) -> Self {
        DatabaseValue::Uuid(value)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for DatabaseValue {
    fn from(value: chrono::DateTime<chrono::Utc>) -> Self {
        DatabaseValue::DateTime(value)
    }
}

impl From<JsonValue> for DatabaseValue {
    fn from(value: JsonValue) -> Self {
        DatabaseValue::Json(value)
    }
}

impl<T> From<Option<T>> for DatabaseValue
where
    T: Into<DatabaseValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => DatabaseValue::Null,
        }
    }
}

/// SQL dialect enumeration for generating database-specific SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDialect {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl SqlDialect {
    /// Get the parameter placeholder style for this dialect
    pub fn parameter_placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::PostgreSQL => format!("${}", index + 1),
            SqlDialect::MySQL | SqlDialect::SQLite => "?".to_string(),
        }
    }

    /// Get the current timestamp expression for this dialect
    pub fn current_timestamp(&self) -> &'static str {
        match self {
            SqlDialect::PostgreSQL => "NOW()",
            SqlDialect::MySQL => "CURRENT_TIMESTAMP",
            SqlDialect::SQLite => "(datetime('now'))",
        }
    }

    /// Column type used for timestamps
    pub fn timestamp_type(&self) -> &'static str {
        match self {
            SqlDialect::PostgreSQL => "TIMESTAMPTZ",
            SqlDialect::MySQL => "DATETIME",
            SqlDialect::SQLite => "TEXT",
        }
    }

    /// Detect the dialect from a database URL scheme
    pub fn from_url(database_url: &str) -> MigrateResult<Self> {
        let parsed = url::Url::parse(database_url)
            .map_err(|e| MigrationError::UnsupportedStore(format!("invalid database URL: {}", e)))?;

        match parsed.scheme() {
            "file" => Ok(SqlDialect::SQLite),
            scheme => scheme.parse(),
        }
    }
}

impl FromStr for SqlDialect {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(SqlDialect::PostgreSQL),
            "mysql" | "mariadb" => Ok(SqlDialect::MySQL),
            "sqlite" => Ok(SqlDialect::SQLite),
            _ => Err(MigrationError::UnsupportedStore(s.to_string())),
        }
    }
}

impl std::fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlDialect::PostgreSQL => write!(f, "postgresql"),
            SqlDialect::MySQL => write!(f, "mysql"),
            SqlDialect::SQLite => write!(f, "sqlite"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_from_url() {
        assert_eq!(
            SqlDialect::from_url("postgres://localhost/app").unwrap(),
            SqlDialect::PostgreSQL
        );
        assert_eq!(
            SqlDialect::from_url("mysql://root@localhost/app").unwrap(),
            SqlDialect::MySQL
        );
        assert_eq!(
            SqlDialect::from_url("sqlite://data.db").unwrap(),
            SqlDialect::SQLite
        );
        assert!(matches!(
            SqlDialect::from_url("oracle://db/app"),
            Err(MigrationError::UnsupportedStore(_))
        ));
    }

    #[test]
    fn test_parameter_placeholders() {
        assert_eq!(SqlDialect::PostgreSQL.parameter_placeholder(0), "$1");
        assert_eq!(SqlDialect::PostgreSQL.parameter_placeholder(2), "$3");
        assert_eq!(SqlDialect::SQLite.parameter_placeholder(2), "?");
    }

    #[test]
    fn test_value_as_datetime() {
        let value = DatabaseValue::from("2024-01-02 03:04:05");
        let dt = value.as_datetime().unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-01-02T03:04:05+00:00");

        assert!(DatabaseValue::Int32(1).as_datetime().is_none());
        assert!(DatabaseValue::from(None::<String>).is_null());
    }
}
