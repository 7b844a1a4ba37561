//! slotpool — named, fixed-capacity connection pools.
//!
//! Provides:
//! - **driver**: the `Driver` / `Connection` seam and a name → driver table
//! - **handle**: opaque connection handles, generation-tagged tickets, leases
//! - **registry**: the pool registry (`register` / `acquire` / `release`)
//! - **sweeper**: a cancellable background task that pings idle connections
//! - **tcp**: a built-in driver that holds plain TCP connections
//!
//! # Architecture
//!
//! ```text
//! Registry
//!   ├── "main" → PoolEntry { driver, dsn, ping, slots: [Slot; N] }
//!   │              Slot { connection: Option<ConnectionHandle>, busy, generation }
//!   └── "replica" → PoolEntry { ... }
//!
//! acquire("main") → first idle slot (open lazily) → Lease { handle, ticket }
//! release(&ticket) → slot idle again (ticket generation must match)
//! Sweeper → every interval: ping idle, opened slots of ping-enabled pools
//! ```

pub mod driver;
pub mod error;
pub mod handle;
pub mod registry;
pub mod sweeper;
pub mod tcp;

pub use driver::{Connection, Driver, Drivers};
pub use error::{DriverError, PoolError, PoolResult};
pub use handle::{ConnectionHandle, Lease, Ticket};
pub use registry::{PoolConfig, PoolSettings, PoolStats, Registry, SweepReport};
pub use sweeper::{MIN_SWEEP_INTERVAL, Sweeper};
