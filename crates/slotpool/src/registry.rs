//! Pool registry — named pools of fixed-capacity connection slots.
//!
//! Each registered name owns a `PoolEntry` with exactly `capacity` slots.
//! Slots are opened lazily, lowest index first, and once opened they are
//! reused for the lifetime of the entry:
//!
//! ```text
//! Empty ──acquire (open)──▶ Busy ──release──▶ Idle ──acquire──▶ Busy ──▶ …
//! ```
//!
//! There is no path back to `Empty`. A failed open leaves the slot empty so
//! the next `acquire` retries it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use slotpool_core::{PoolSection, SettingsConfig};

use crate::driver::{Connection, Drivers};
use crate::error::{PoolError, PoolResult};
use crate::handle::{ConnectionHandle, Lease, Ticket};

pub const DEFAULT_CAPACITY: usize = 20;
pub const DEFAULT_DRIVER: &str = "postgres";
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(120);

/// Checkout generations are unique across every registry in the process, so
/// a ticket can only ever match the checkout that produced it.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Registry-wide tunables.
///
/// Captured per pool at registration time; pools registered earlier keep
/// the capacity they were created with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolSettings {
    /// Slots per pool (default: 20).
    pub capacity: usize,
    /// Driver used when a pool's config leaves the driver empty (default: "postgres").
    pub default_driver: String,
    /// Delay between sweeper passes (default: 2 minutes).
    pub sweep_interval: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            default_driver: DEFAULT_DRIVER.to_string(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl From<&SettingsConfig> for PoolSettings {
    fn from(config: &SettingsConfig) -> Self {
        let defaults = Self::default();
        Self {
            capacity: config.capacity.unwrap_or(defaults.capacity),
            default_driver: config
                .default_driver
                .clone()
                .filter(|d| !d.is_empty())
                .unwrap_or(defaults.default_driver),
            sweep_interval: config.sweep_interval().unwrap_or(defaults.sweep_interval),
        }
    }
}

/// Per-pool registration input.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Driver name; empty means the registry's default driver.
    pub driver: String,
    /// Opaque data source name handed to the driver.
    pub dsn: String,
    /// Include this pool in sweeper passes.
    pub ping: bool,
}

impl PoolConfig {
    pub fn new(dsn: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            ..Self::default()
        }
    }

    pub fn with_driver(mut self, driver: &str) -> Self {
        self.driver = driver.to_string();
        self
    }

    pub fn with_ping(mut self, ping: bool) -> Self {
        self.ping = ping;
        self
    }
}

impl From<&PoolSection> for PoolConfig {
    fn from(section: &PoolSection) -> Self {
        Self {
            driver: section.driver.clone().unwrap_or_default(),
            dsn: section.dsn.clone(),
            ping: section.ping.unwrap_or(false),
        }
    }
}

/// Point-in-time slot counts for one pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Total slots.
    pub capacity: usize,
    /// Slots holding an opened connection.
    pub opened: usize,
    /// Slots currently checked out.
    pub busy: usize,
    /// Opened slots that are not checked out.
    pub idle: usize,
}

/// Outcome of one sweeper pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Ping-enabled pools visited.
    pub pools: usize,
    /// Idle connections pinged.
    pub pinged: usize,
    /// Pings that returned an error.
    pub failed: usize,
}

struct Slot<C> {
    connection: Option<ConnectionHandle<C>>,
    busy: bool,
    generation: u64,
}

impl<C> Slot<C> {
    fn empty() -> Self {
        Self {
            connection: None,
            busy: false,
            generation: 0,
        }
    }
}

/// One named pool. Connection, busy flag and generation share one lock so
/// they are always observed together.
struct PoolEntry<C> {
    driver: String,
    dsn: String,
    ping: bool,
    slots: RwLock<Vec<Slot<C>>>,
}

impl<C> PoolEntry<C> {
    fn new(driver: String, dsn: String, ping: bool, capacity: usize) -> Self {
        Self {
            driver,
            dsn,
            ping,
            slots: RwLock::new((0..capacity).map(|_| Slot::empty()).collect()),
        }
    }
}

/// Registry of named connection pools.
///
/// Construct one per process (or per test) and share it as
/// `Arc<Registry<C>>`. All methods take `&self` and are safe to call
/// concurrently.
pub struct Registry<C> {
    settings: PoolSettings,
    drivers: Drivers<C>,
    pools: RwLock<HashMap<String, Arc<PoolEntry<C>>>>,
    next_connection_id: AtomicU64,
}

impl<C: Connection> Registry<C> {
    pub fn new(settings: PoolSettings, drivers: Drivers<C>) -> Self {
        Self {
            settings,
            drivers,
            pools: RwLock::new(HashMap::new()),
            next_connection_id: AtomicU64::new(1),
        }
    }

    /// Create a registry with default settings.
    pub fn with_drivers(drivers: Drivers<C>) -> Self {
        Self::new(PoolSettings::default(), drivers)
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    pub fn drivers(&self) -> &Drivers<C> {
        &self.drivers
    }

    /// Register (or replace) the pool `name`.
    ///
    /// Re-registering a name drops the previous entry; its connections close
    /// once no outstanding handle refers to them, and tickets issued by it no
    /// longer release anything.
    pub async fn register(&self, name: &str, config: PoolConfig) {
        let driver = if config.driver.is_empty() {
            self.settings.default_driver.clone()
        } else {
            config.driver
        };
        let capacity = self.settings.capacity;
        let ping = config.ping;
        let entry = Arc::new(PoolEntry::new(driver.clone(), config.dsn, ping, capacity));

        let replaced = self
            .pools
            .write()
            .await
            .insert(name.to_string(), entry)
            .is_some();

        if replaced {
            info!(pool = %name, %driver, capacity, ping, "pool re-registered, previous connections dropped");
        } else {
            info!(pool = %name, %driver, capacity, ping, "pool registered");
        }
    }

    async fn entry(&self, name: &str) -> Option<Arc<PoolEntry<C>>> {
        self.pools.read().await.get(name).cloned()
    }

    /// Check out a connection from the pool `name`.
    ///
    /// Takes the lowest-index idle slot. If that slot has never been opened,
    /// the pool's driver opens a connection into it while the pool lock is
    /// held. Never waits for a busy slot: a full pool fails immediately with
    /// `PoolExhausted`.
    pub async fn acquire(&self, name: &str) -> PoolResult<Lease<C>> {
        let entry = self
            .entry(name)
            .await
            .ok_or_else(|| PoolError::UnknownPool(name.to_string()))?;

        let mut slots = entry.slots.write().await;
        let Some(index) = slots.iter().position(|slot| !slot.busy) else {
            warn!(pool = %name, capacity = slots.len(), "pool exhausted");
            return Err(PoolError::PoolExhausted(name.to_string()));
        };

        let slot = &mut slots[index];
        let handle = match &slot.connection {
            Some(handle) => handle.clone(),
            None => {
                let connection = self
                    .drivers
                    .open(&entry.driver, &entry.dsn)
                    .inspect_err(|e| {
                        warn!(pool = %name, slot = index, driver = %entry.driver, error = %e, "failed to open connection");
                    })?;
                let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
                let handle = ConnectionHandle::new(id, connection);
                slot.connection = Some(handle.clone());
                debug!(pool = %name, slot = index, connection = id, driver = %entry.driver, "opened new connection");
                handle
            }
        };

        slot.busy = true;
        slot.generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        debug!(pool = %name, slot = index, generation = slot.generation, connection = handle.id(), "connection acquired");

        Ok(Lease::new(handle, Ticket::new(name, index, slot.generation)))
    }

    /// Return the slot addressed by `ticket` to the idle state.
    ///
    /// Returns `false` when the ticket does not belong to this registry's
    /// current checkout of that slot (unknown pool, bad index, never-opened
    /// slot, or a stale generation). Releasing the same ticket twice is a
    /// no-op that still returns `true`.
    pub async fn release(&self, ticket: &Ticket) -> bool {
        let Some(entry) = self.entry(ticket.pool()).await else {
            debug!(%ticket, "release for unknown pool");
            return false;
        };

        let mut slots = entry.slots.write().await;
        let Some(slot) = slots.get_mut(ticket.slot()) else {
            debug!(%ticket, "release for out-of-range slot");
            return false;
        };
        if slot.connection.is_none() || slot.generation != ticket.generation() {
            debug!(%ticket, current = slot.generation, "release with stale ticket");
            return false;
        }

        slot.busy = false;
        debug!(%ticket, "connection released");
        true
    }

    /// Registered pool names, sorted.
    pub async fn pool_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.pools.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn stats(&self, name: &str) -> Option<PoolStats> {
        let entry = self.entry(name).await?;
        let slots = entry.slots.read().await;
        let opened = slots.iter().filter(|s| s.connection.is_some()).count();
        let busy = slots.iter().filter(|s| s.busy).count();
        Some(PoolStats {
            capacity: slots.len(),
            opened,
            busy,
            idle: opened - busy,
        })
    }

    /// Log slot counts for every pool at `info` level.
    pub async fn log_stats(&self) {
        for name in self.pool_names().await {
            if let Some(stats) = self.stats(&name).await {
                info!(
                    pool = %name,
                    capacity = stats.capacity,
                    opened = stats.opened,
                    busy = stats.busy,
                    idle = stats.idle,
                    "pool statistics"
                );
            }
        }
    }

    /// Ping every idle, opened connection of every ping-enabled pool.
    ///
    /// Busy flags and connections are snapshotted under the pool's read
    /// lock; pings run after the lock is dropped. Failures are logged and
    /// counted, never acted on.
    pub async fn sweep_once(&self) -> SweepReport {
        let mut entries: Vec<(String, Arc<PoolEntry<C>>)> = self
            .pools
            .read()
            .await
            .iter()
            .filter(|(_, entry)| entry.ping)
            .map(|(name, entry)| (name.clone(), Arc::clone(entry)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut report = SweepReport::default();
        for (name, entry) in entries {
            let idle: Vec<(usize, ConnectionHandle<C>)> = {
                let slots = entry.slots.read().await;
                slots
                    .iter()
                    .enumerate()
                    .filter(|(_, slot)| !slot.busy)
                    .filter_map(|(i, slot)| slot.connection.clone().map(|c| (i, c)))
                    .collect()
            };

            report.pools += 1;
            for (index, handle) in idle {
                report.pinged += 1;
                if let Err(e) = handle.ping() {
                    report.failed += 1;
                    warn!(pool = %name, slot = index, connection = handle.id(), error = %e, "idle connection ping failed");
                }
            }
        }

        debug!(pools = report.pools, pinged = report.pinged, failed = report.failed, "sweep complete");
        report
    }
}

impl<C> std::fmt::Debug for Registry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("settings", &self.settings)
            .field("drivers", &self.drivers)
            .finish_non_exhaustive()
    }
}
