pub mod check;
pub mod init;
pub mod watch;

use std::path::Path;

use slotpool::tcp::{TcpConnection, default_drivers};
use slotpool::{PoolConfig, PoolSettings, Registry};
use slotpool_core::SlotpoolConfig;

/// Load `path` and register every pool it declares with the TCP drivers.
pub async fn load_registry(path: &Path) -> anyhow::Result<Registry<TcpConnection>> {
    let config = SlotpoolConfig::from_file(path)?;
    Ok(build_registry(&config).await)
}

pub async fn build_registry(config: &SlotpoolConfig) -> Registry<TcpConnection> {
    let registry = Registry::new(PoolSettings::from(&config.settings), default_drivers());
    for (name, section) in &config.pools {
        registry.register(name, PoolConfig::from(section)).await;
    }
    registry
}
