pub mod config;
pub mod dsn;
pub mod duration;

pub use config::{MAX_CAPACITY, PoolSection, SettingsConfig, SlotpoolConfig};
pub use dsn::{Dsn, DsnError};
pub use duration::parse_duration;
