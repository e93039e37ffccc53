//! Database Backend Abstractions
//!
//! Connection traits consumed by the migration engine, plus the bundled
//! PostgreSQL implementation.

pub mod core;
pub mod postgres;

pub use self::core::*;
pub use postgres::PostgresConnection;
