//! Shared fakes for the integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use elif_migrations::{
    DatabaseConnection, DatabaseRow, DatabaseValue, ExecutableUnit, Ledger, MigrateResult,
    MigrationError, MigrationLoader,
};
use tempfile::TempDir;

#[derive(Default)]
struct ConnectionState {
    executed: Vec<String>,
    failures: Vec<(String, String)>,
}

/// Connection that records statements and rejects those containing a configured fragment
#[derive(Clone, Default)]
pub struct MemoryConnection {
    state: Arc<Mutex<ConnectionState>>,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject any statement containing `fragment` with the driver text `message`
    pub fn fail_on(&self, fragment: &str, message: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .push((fragment.to_string(), message.to_string()));
    }

    /// Statements executed so far, in order
    pub fn executed(&self) -> Vec<String> {
        self.state.lock().unwrap().executed.clone()
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().executed.clear();
    }
}

#[async_trait]
impl DatabaseConnection for MemoryConnection {
    async fn execute(&mut self, sql: &str, _params: &[DatabaseValue]) -> MigrateResult<u64> {
        let mut state = self.state.lock().unwrap();
        if let Some((_, message)) = state
            .failures
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
        {
            return Err(MigrationError::Database(message.clone()));
        }
        state.executed.push(sql.to_string());
        Ok(0)
    }

    async fn fetch_all(
        &mut self,
        _sql: &str,
        _params: &[DatabaseValue],
    ) -> MigrateResult<Vec<Box<dyn DatabaseRow>>> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct LedgerState {
    records: BTreeMap<String, String>,
    init_error: Option<String>,
    read_error: Option<String>,
    write_error: Option<String>,
    initialized: bool,
}

/// Ledger held in memory, shared between clones so tests can inspect it
#[derive(Clone, Default)]
pub struct MemoryLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_versions(versions: &[&str]) -> Self {
        let ledger = Self::new();
        {
            let mut state = ledger.state.lock().unwrap();
            for version in versions {
                state.records.insert(version.to_string(), String::new());
            }
        }
        ledger
    }

    pub fn fail_initialize(&self, message: &str) {
        self.state.lock().unwrap().init_error = Some(message.to_string());
    }

    pub fn fail_reads(&self, message: &str) {
        self.state.lock().unwrap().read_error = Some(message.to_string());
    }

    pub fn fail_writes(&self, message: &str) {
        self.state.lock().unwrap().write_error = Some(message.to_string());
    }

    pub fn versions(&self) -> Vec<String> {
        self.state.lock().unwrap().records.keys().cloned().collect()
    }

    pub fn name_of(&self, version: &str) -> Option<String> {
        self.state.lock().unwrap().records.get(version).cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().unwrap().initialized
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn initialize_store(&self, _conn: &mut dyn DatabaseConnection) -> MigrateResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.init_error {
            return Err(MigrationError::LedgerInitFailure(message.clone()));
        }
        state.initialized = true;
        Ok(())
    }

    async fn is_recorded(&self, _conn: &mut dyn DatabaseConnection, version: &str) -> MigrateResult<bool> {
        Ok(self.state.lock().unwrap().records.contains_key(version))
    }

    async fn record(&self, _conn: &mut dyn DatabaseConnection, version: &str, name: &str) -> MigrateResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.write_error {
            return Err(MigrationError::Ledger(message.clone()));
        }
        state.records.insert(version.to_string(), name.to_string());
        Ok(())
    }

    async fn unrecord(&self, _conn: &mut dyn DatabaseConnection, version: &str) -> MigrateResult<()> {
        self.state.lock().unwrap().records.remove(version);
        Ok(())
    }

    async fn recorded_versions(&self, _conn: &mut dyn DatabaseConnection) -> MigrateResult<Vec<String>> {
        let state = self.state.lock().unwrap();
        if let Some(message) = &state.read_error {
            return Err(MigrationError::Ledger(message.clone()));
        }
        Ok(state.records.keys().cloned().collect())
    }
}

/// Imperative unit that writes a marker statement for each direction
pub struct MarkerUnit {
    pub label: &'static str,
}

#[async_trait]
impl ExecutableUnit for MarkerUnit {
    async fn up(&self, conn: &mut dyn DatabaseConnection) -> MigrateResult<()> {
        conn.execute(&format!("-- marker {} up", self.label), &[]).await?;
        Ok(())
    }

    async fn down(&self, conn: &mut dyn DatabaseConnection) -> MigrateResult<()> {
        conn.execute(&format!("-- marker {} down", self.label), &[]).await?;
        Ok(())
    }
}

/// Imperative unit whose `up` always fails
pub struct FailingUnit {
    pub message: &'static str,
}

#[async_trait]
impl ExecutableUnit for FailingUnit {
    async fn up(&self, _conn: &mut dyn DatabaseConnection) -> MigrateResult<()> {
        Err(MigrationError::Database(self.message.to_string()))
    }

    async fn down(&self, _conn: &mut dyn DatabaseConnection) -> MigrateResult<()> {
        Ok(())
    }
}

/// A temporary migrations directory
pub struct MigrationDir {
    pub dir: TempDir,
}

impl MigrationDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn write(&self, file_name: &str, content: &str) -> &Self {
        fs::write(self.dir.path().join(file_name), content).unwrap();
        self
    }

    pub fn write_bytes(&self, file_name: &str, content: &[u8]) -> &Self {
        fs::write(self.dir.path().join(file_name), content).unwrap();
        self
    }

    pub fn loader(&self) -> MigrationLoader {
        MigrationLoader::new(self.dir.path()).unwrap()
    }
}
