//! # elif-migrations: Schema migrations for elif.rs
//!
//! Discovers versioned migrations in a directory, runs them in order against
//! a [`DatabaseConnection`], and keeps a ledger of what has been applied.
//!
//! Migrations come in two forms:
//!
//! * SQL pairs: `20240101120000_create_users.up.sql` and an optional
//!   `20240101120000_create_users.down.sql`
//! * code units: `20240102090000_SeedAdminUser.rs`, resolved through a
//!   [`UnitRegistry`] to an [`ExecutableUnit`]
//!
//! ```rust,no_run
//! use elif_migrations::{MigrationLoader, MigrationRunner, PostgresConnection, SqlLedger};
//!
//! # async fn example() -> elif_migrations::MigrateResult<()> {
//! let url = "postgres://localhost/app";
//! let loader = MigrationLoader::new("migrations")?;
//! let ledger = SqlLedger::from_url(url, "elif_migrations")?;
//! let connection = PostgresConnection::connect(url).await?;
//!
//! let mut runner = MigrationRunner::new(loader, Box::new(ledger), Box::new(connection));
//! let result = runner.migrate().await;
//! println!("{}", result.message);
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod error;
pub mod migrations;

pub use backends::{DatabaseConnection, DatabaseRow, DatabaseValue, PostgresConnection, SqlDialect};
pub use error::*;
pub use migrations::*;
