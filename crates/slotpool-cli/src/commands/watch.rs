use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use slotpool::tcp::TcpConnection;
use slotpool::{Registry, Sweeper};
use tracing::{info, warn};

/// Run the sweeper over the configured pools until Ctrl-C.
///
/// Slots open lazily, so without `warm` the sweeper only sees connections
/// opened by other callers of this registry, and in this standalone command
/// there are none.
pub async fn watch(config: &Path, stats_interval: u64, warm: bool) -> anyhow::Result<()> {
    let registry = Arc::new(super::load_registry(config).await?);
    let pools = registry.pool_names().await;
    info!(config = %config.display(), pools = pools.len(), "pools registered");

    if warm {
        let warmed = warm_pools(&registry).await;
        info!(warmed, pools = pools.len(), "pools warmed");
    }

    let sweeper = Sweeper::start(registry.clone());

    // interval() ticks immediately, so the first stats line shows the
    // freshly registered pools.
    let mut ticker = tokio::time::interval(Duration::from_secs(stats_interval.max(1)));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => registry.log_stats().await,
            result = &mut ctrl_c => {
                result?;
                info!("received Ctrl-C, shutting down");
                break;
            }
        }
    }

    sweeper.shutdown().await;
    Ok(())
}

/// Open one connection in every pool and return it idle, so the sweeper has
/// something to ping. Returns the number of pools warmed.
pub async fn warm_pools(registry: &Registry<TcpConnection>) -> usize {
    let mut warmed = 0;
    for pool in registry.pool_names().await {
        match registry.acquire(&pool).await {
            Ok(lease) => {
                lease.release_into(registry).await;
                warmed += 1;
            }
            Err(e) => warn!(%pool, error = %e, "could not warm pool"),
        }
    }
    warmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::build_registry;
    use slotpool_core::SlotpoolConfig;
    use std::net::TcpListener;

    #[tokio::test]
    async fn warm_opens_one_idle_connection_per_reachable_pool() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let live = listener.local_addr().unwrap().port();
        let dead = {
            let l = TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };

        let config = SlotpoolConfig::from_toml_str(&format!(
            r#"
[pools.live]
dsn = "host=127.0.0.1 port={live}"
ping = true

[pools.dead]
dsn = "host=127.0.0.1 port={dead}"
ping = true
"#
        ))
        .unwrap();
        let registry = build_registry(&config).await;

        assert_eq!(warm_pools(&registry).await, 1);

        let live_stats = registry.stats("live").await.unwrap();
        assert_eq!(live_stats.opened, 1);
        assert_eq!(live_stats.idle, 1);
        assert_eq!(registry.stats("dead").await.unwrap().opened, 0);

        // The warmed connection is now visible to a sweep.
        let report = registry.sweep_once().await;
        assert_eq!(report.pinged, 1);
        drop(listener);
    }
}
