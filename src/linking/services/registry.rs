//! Driver registry.
//!
//! Holds exactly one live driver per URN-shaped name. The registry is filled
//! once at startup and is read-only afterwards; any duplicate or malformed
//! name aborts startup.

use crate::linking::{
    domain::{DriverName, LinkDomainError},
    ports::Driver,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while populating the driver registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverRegistryError {
    /// A driver with the same name is already registered.
    #[error("a driver named '{0}' has already been registered")]
    DuplicateDriver(DriverName),

    /// The driver name is empty or not a valid URN.
    #[error("invalid driver name: {0}")]
    InvalidName(#[from] LinkDomainError),
}

/// Name-keyed table of driver instances.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: HashMap<DriverName, Arc<dyn Driver>>,
}

impl DriverRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from discovered drivers, keyed by their own names.
    ///
    /// # Errors
    ///
    /// Returns the first [`DriverRegistryError`] encountered; no partially
    /// filled registry is returned.
    pub fn from_drivers(
        drivers: impl IntoIterator<Item = Arc<dyn Driver>>,
    ) -> Result<Self, DriverRegistryError> {
        let mut registry = Self::new();
        for driver in drivers {
            let name = driver.name().to_owned();
            registry.register(name, driver)?;
        }
        Ok(registry)
    }

    /// Registers a driver under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverRegistryError::InvalidName`] when `name` is empty or
    /// not URN-shaped, or [`DriverRegistryError::DuplicateDriver`] when the
    /// name is taken.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        driver: Arc<dyn Driver>,
    ) -> Result<(), DriverRegistryError> {
        let driver_name = DriverName::new(name)?;
        if self.drivers.contains_key(&driver_name) {
            return Err(DriverRegistryError::DuplicateDriver(driver_name));
        }
        tracing::debug!(driver = %driver_name, "registered driver");
        self.drivers.insert(driver_name, driver);
        Ok(())
    }

    /// Returns the driver registered under `name`.
    #[must_use]
    pub fn lookup(&self, name: &DriverName) -> Option<Arc<dyn Driver>> {
        self.drivers.get(name).cloned()
    }

    /// Returns all registered names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&DriverName> {
        let mut names: Vec<&DriverName> = self.drivers.keys().collect();
        names.sort();
        names
    }

    /// Returns the number of registered drivers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    /// Returns whether no driver is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .finish()
    }
}
