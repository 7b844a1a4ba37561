//! Driver seam — how the registry opens and probes connections.
//!
//! The registry never inspects a connection beyond `ping()`. Query execution
//! is left to whatever layer the caller builds on top of the handle.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::DriverError;

/// One live database connection.
///
/// `ping` takes `&self` because the sweeper probes idle connections while
/// other tasks may hold clones of the same handle.
pub trait Connection: Send + Sync + 'static {
    /// Liveness probe. The sweeper logs failures and does nothing else.
    fn ping(&self) -> Result<(), DriverError>;
}

/// Opens connections from an opaque data source name.
pub trait Driver: Send + Sync {
    type Conn: Connection;

    fn open(&self, dsn: &str) -> Result<Self::Conn, DriverError>;
}

impl<D: Driver + ?Sized> Driver for Arc<D> {
    type Conn = D::Conn;

    fn open(&self, dsn: &str) -> Result<Self::Conn, DriverError> {
        (**self).open(dsn)
    }
}

/// Driver table: driver name → driver.
///
/// All drivers in one table produce the same connection type, so handles
/// stay statically typed.
pub struct Drivers<C> {
    drivers: HashMap<String, Arc<dyn Driver<Conn = C>>>,
}

impl<C: Connection> Drivers<C> {
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// Builder method: register `driver` under `name`, replacing any previous one.
    pub fn with<D>(mut self, name: &str, driver: D) -> Self
    where
        D: Driver<Conn = C> + 'static,
    {
        self.register(name, driver);
        self
    }

    pub fn register<D>(&mut self, name: &str, driver: D)
    where
        D: Driver<Conn = C> + 'static,
    {
        self.drivers.insert(name.to_string(), Arc::new(driver));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }

    /// Registered driver names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.drivers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Open a connection through the named driver.
    pub fn open(&self, name: &str, dsn: &str) -> Result<C, DriverError> {
        let driver = self
            .drivers
            .get(name)
            .ok_or_else(|| DriverError::UnknownDriver(name.to_string()))?;
        driver.open(dsn)
    }
}

impl<C: Connection> Default for Drivers<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> std::fmt::Debug for Drivers<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.drivers.keys().collect();
        names.sort();
        f.debug_struct("Drivers").field("names", &names).finish()
    }
}
