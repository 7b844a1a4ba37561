use std::path::Path;

use serde::Serialize;
use slotpool::tcp::TcpConnection;
use slotpool::Registry;

/// Outcome of checking one pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolCheck {
    pub pool: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn check(config: &Path, format: &str) -> anyhow::Result<()> {
    let registry = super::load_registry(config).await?;
    let results = check_pools(&registry).await;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&results)?),
        _ => print!("{}", format_checks(&results)),
    }

    let failed = results.iter().filter(|r| !r.ok).count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} pools failed", results.len());
    }
    Ok(())
}

/// Acquire, ping and release one connection from every pool, in name order.
pub async fn check_pools(registry: &Registry<TcpConnection>) -> Vec<PoolCheck> {
    let mut results = Vec::new();
    for pool in registry.pool_names().await {
        let check = match registry.acquire(&pool).await {
            Ok(lease) => {
                let peer = lease.peer_addr().to_string();
                let ping = lease.handle().ping();
                lease.release_into(registry).await;
                match ping {
                    Ok(()) => PoolCheck {
                        pool,
                        ok: true,
                        peer: Some(peer),
                        error: None,
                    },
                    Err(e) => PoolCheck {
                        pool,
                        ok: false,
                        peer: Some(peer),
                        error: Some(e.to_string()),
                    },
                }
            }
            Err(e) => PoolCheck {
                pool,
                ok: false,
                peer: None,
                error: Some(e.to_string()),
            },
        };
        results.push(check);
    }
    results
}

pub fn format_checks(results: &[PoolCheck]) -> String {
    if results.is_empty() {
        return "no pools configured\n".to_string();
    }
    let width = results.iter().map(|r| r.pool.len()).max().unwrap_or(0);
    let mut out = String::new();
    for r in results {
        let mark = if r.ok { "✓" } else { "✗" };
        let detail = match (&r.error, &r.peer) {
            (Some(error), _) => error.as_str(),
            (None, Some(peer)) => peer.as_str(),
            (None, None) => "",
        };
        out.push_str(&format!("{mark} {:<width$}  {detail}\n", r.pool));
    }
    out
}
