//! PostgreSQL Backend Implementation
//!
//! Provides the PostgreSQL implementation of [`DatabaseConnection`] using
//! sqlx as the underlying driver. Every statement auto-commits; the engine
//! never wraps migrations in transactions.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Postgres, Row, TypeInfo};

use super::core::*;
use crate::error::{MigrateResult, MigrationError};

/// PostgreSQL connection backed by a sqlx pool
pub struct PostgresConnection {
    pool: PgPool,
}

impl PostgresConnection {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to the database at `database_url` with a single-connection pool
    pub async fn connect(database_url: &str) -> MigrateResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await
            .map_err(|e| MigrationError::Database(format!("Failed to connect to database: {}", e)))?;

        Ok(Self::new(pool))
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close the pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl DatabaseConnection for PostgresConnection {
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<u64> {
        let mut query = sqlx::query(sql);

        for param in params {
            query = bind_database_value(query, param);
        }

        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| MigrationError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn fetch_all(
        &mut self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> MigrateResult<Vec<Box<dyn DatabaseRow>>> {
        let mut query = sqlx::query(sql);

        for param in params {
            query = bind_database_value(query, param);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrationError::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| Box::new(PostgresRow::new(row)) as Box<dyn DatabaseRow>)
            .collect())
    }
}

/// PostgreSQL row implementation
pub struct PostgresRow {
    row: PgRow,
}

impl PostgresRow {
    pub fn new(row: PgRow) -> Self {
        Self { row }
    }
}

impl DatabaseRow for PostgresRow {
    fn get_by_index(&self, index: usize) -> MigrateResult<DatabaseValue> {
        if index >= self.row.len() {
            return Err(MigrationError::Database(format!(
                "Column index {} out of range",
                index
            )));
        }
        postgres_value_to_database_value(&self.row, index)
    }

    fn get_by_name(&self, name: &str) -> MigrateResult<DatabaseValue> {
        let index = self
            .row
            .columns()
            .iter()
            .position(|col| col.name() == name)
            .ok_or_else(|| MigrationError::Database(format!("Column '{}' not found", name)))?;

        postgres_value_to_database_value(&self.row, index)
    }

    fn column_count(&self) -> usize {
        self.row.len()
    }
}

/// Bind a DatabaseValue to a sqlx query
fn bind_database_value<'a>(
    query: sqlx::query::Query<'a, Postgres, sqlx::postgres::PgArguments>,
    value: &DatabaseValue,
) -> sqlx::query::Query<'a, Postgres, sqlx::postgres::PgArguments> {
    match value {
        DatabaseValue::Null => query.bind(Option::<String>::None),
        DatabaseValue::Bool(b) => query.bind(*b),
        DatabaseValue::Int32(i) => query.bind(*i),
        DatabaseValue::Int64(i) => query.bind(*i),
        DatabaseValue::Float64(f) => query.bind(*f),
        DatabaseValue::String(s) => query.bind(s.clone()),
        DatabaseValue::Uuid(u) => query.bind(*u),
        DatabaseValue::DateTime(dt) => query.bind(*dt),
        DatabaseValue::Json(j) => query.bind(j.clone()),
    }
}

/// Convert a PostgreSQL column value to DatabaseValue
fn postgres_value_to_database_value(row: &PgRow, index: usize) -> MigrateResult<DatabaseValue> {
    let column = &row.columns()[index];
    let type_name = column.type_info().name();

    let conversion = |e: sqlx::Error| {
        MigrationError::Database(format!(
            "Failed to read column '{}' as {}: {}",
            column.name(),
            type_name,
            e
        ))
    };

    let value: DatabaseValue = match type_name {
        "BOOL" => row
            .try_get::<Option<bool>, _>(index)
            .map_err(conversion)?
            .into(),
        "INT2" => row
            .try_get::<Option<i16>, _>(index)
            .map_err(conversion)?
            .map(i32::from)
            .into(),
        "INT4" => row.try_get::<Option<i32>, _>(index).map_err(conversion)?.into(),
        "INT8" => row.try_get::<Option<i64>, _>(index).map_err(conversion)?.into(),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index).map_err(conversion)?.into(),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(index)
            .map_err(conversion)?
            .into(),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)
            .map_err(conversion)?
            .into(),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)
            .map_err(conversion)?
            .map(|naive| naive.and_utc())
            .into(),
        "JSON" | "JSONB" => row
            .try_get::<Option<JsonValue>, _>(index)
            .map_err(conversion)?
            .into(),
        _ => row
            .try_get::<Option<String>, _>(index)
            .map_err(conversion)?
            .into(),
    };

    Ok(value)
}
