//! Migration System
//!
//! Discovery, parsing and ordered execution of schema migrations.

pub mod definitions;
pub mod ledger;
pub mod loader;
pub mod registry;
pub mod rollback;
pub mod runner;
pub mod splitter;
pub mod unit;

pub use definitions::*;
pub use ledger::{Ledger, SqlLedger};
pub use loader::MigrationLoader;
pub use registry::{ExecutableUnit, UnitRegistry};
pub use runner::{BatchFailure, MigrationRunner};
pub use splitter::{split_statements, StatementSplitter, Statements};
