//! Unit Registry - Resolves imperative migrations to executable code
//!
//! Imperative migrations are discovered on disk by file name, but their
//! behaviour is compiled into the application. The registry maps each
//! locator to a factory that builds a fresh [`ExecutableUnit`].

use std::collections::HashMap;

use async_trait::async_trait;

use crate::backends::DatabaseConnection;
use crate::error::{MigrateResult, MigrationError};

/// A migration implemented in code
#[async_trait]
pub trait ExecutableUnit: Send + Sync {
    /// Apply the migration
    async fn up(&self, conn: &mut dyn DatabaseConnection) -> MigrateResult<()>;

    /// Reverse the migration
    async fn down(&self, conn: &mut dyn DatabaseConnection) -> MigrateResult<()>;
}

type UnitFactory = Box<dyn Fn() -> Box<dyn ExecutableUnit> + Send + Sync>;

/// Locator to factory map for imperative migrations
#[derive(Default)]
pub struct UnitRegistry {
    factories: HashMap<String, UnitFactory>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `locator`, replacing any previous entry
    pub fn register<F>(&mut self, locator: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn ExecutableUnit> + Send + Sync + 'static,
    {
        self.factories.insert(locator.into(), Box::new(factory));
        self
    }

    /// Register a unit type that can be built with `Default`
    pub fn register_unit<U>(&mut self, locator: impl Into<String>) -> &mut Self
    where
        U: ExecutableUnit + Default + 'static,
    {
        self.register(locator, || Box::new(U::default()))
    }

    /// Check whether a locator has been registered
    pub fn contains(&self, locator: &str) -> bool {
        self.factories.contains_key(locator)
    }

    /// Build the unit registered under `locator`
    pub fn resolve(&self, locator: &str) -> MigrateResult<Box<dyn ExecutableUnit>> {
        self.factories
            .get(locator)
            .map(|factory| factory())
            .ok_or_else(|| MigrationError::UnitResolutionFailure(locator.to_string()))
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for UnitRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut locators: Vec<&String> = self.factories.keys().collect();
        locators.sort();
        f.debug_struct("UnitRegistry").field("locators", &locators).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Noop;

    #[async_trait]
    impl ExecutableUnit for Noop {
        async fn up(&self, _conn: &mut dyn DatabaseConnection) -> MigrateResult<()> {
            Ok(())
        }

        async fn down(&self, _conn: &mut dyn DatabaseConnection) -> MigrateResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_resolve_registered_unit() {
        let mut registry = UnitRegistry::new();
        registry.register_unit::<Noop>("SeedAdminUser");

        assert!(registry.contains("SeedAdminUser"));
        assert_eq!(registry.len(), 1);
        assert!(registry.resolve("SeedAdminUser").is_ok());
    }

    #[test]
    fn test_resolve_unknown_locator() {
        let registry = UnitRegistry::new();
        assert!(matches!(
            registry.resolve("Missing"),
            Err(MigrationError::UnitResolutionFailure(locator)) if locator == "Missing"
        ));
    }
}
