//! slotpool.toml configuration parser.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;

/// Upper bound on `settings.capacity`; every slot is allocated at registration.
pub const MAX_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotpoolConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub pools: BTreeMap<String, PoolSection>,
}

/// Registry-wide tunables. Missing values fall back to the registry defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsConfig {
    pub capacity: Option<usize>,
    pub default_driver: Option<String>,
    pub sweep_interval: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSection {
    pub driver: Option<String>,
    pub dsn: String,
    pub ping: Option<bool>,
}

impl SlotpoolConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: SlotpoolConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.settings.capacity == Some(0) {
            bail!("settings.capacity must be greater than 0");
        }
        if let Some(capacity) = self.settings.capacity.filter(|c| *c > MAX_CAPACITY) {
            bail!("settings.capacity must be at most {MAX_CAPACITY}, got {capacity}");
        }
        if let Some(interval) = &self.settings.sweep_interval {
            match parse_duration(interval) {
                Some(d) if !d.is_zero() => {}
                _ => bail!("settings.sweep_interval is not a valid duration: {interval:?}"),
            }
        }
        for (name, pool) in &self.pools {
            if name.trim().is_empty() {
                bail!("pool names must not be empty");
            }
            if pool.dsn.trim().is_empty() {
                bail!("pools.{name}.dsn must not be empty");
            }
        }
        Ok(())
    }

    /// Scaffold a minimal slotpool.toml with one ping-enabled pool.
    pub fn scaffold() -> Self {
        let mut pools = BTreeMap::new();
        pools.insert(
            "main".to_string(),
            PoolSection {
                driver: Some("postgres".to_string()),
                dsn: "postgres://app@localhost:5432/main".to_string(),
                ping: Some(true),
            },
        );
        SlotpoolConfig {
            settings: SettingsConfig {
                capacity: Some(20),
                default_driver: Some("postgres".to_string()),
                sweep_interval: Some("2m".to_string()),
            },
            pools,
        }
    }
}

impl SettingsConfig {
    /// The configured sweep interval, if present and parseable.
    pub fn sweep_interval(&self) -> Option<std::time::Duration> {
        self.sweep_interval.as_deref().and_then(parse_duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_scaffold_round_trips() {
        let config = SlotpoolConfig::scaffold();
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("[pools.main]"));
        let parsed = SlotpoolConfig::from_toml_str(&toml_str).unwrap();
        assert_eq!(parsed.pools.len(), 1);
        assert_eq!(parsed.settings.sweep_interval(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_parse_minimal() {
        let toml_str = r#"
[pools.main]
dsn = "postgres://app@db:5432/main"
"#;
        let config = SlotpoolConfig::from_toml_str(toml_str).unwrap();
        let main = &config.pools["main"];
        assert_eq!(main.driver, None);
        assert_eq!(main.ping, None);
        assert_eq!(config.settings.capacity, None);
    }

    #[test]
    fn test_parse_full() {
        let toml_str = r#"
[settings]
capacity = 4
default_driver = "mysql"
sweep_interval = "30s"

[pools.orders]
driver = "postgres"
dsn = "host=db port=5432"
ping = true

[pools.cache]
dsn = "redis://cache:6379"
"#;
        let config = SlotpoolConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.settings.capacity, Some(4));
        assert_eq!(config.settings.default_driver.as_deref(), Some("mysql"));
        assert_eq!(config.settings.sweep_interval(), Some(Duration::from_secs(30)));
        let names: Vec<_> = config.pools.keys().cloned().collect();
        assert_eq!(names, vec!["cache", "orders"]);
        assert_eq!(config.pools["orders"].ping, Some(true));
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let err = SlotpoolConfig::from_toml_str("[settings]\ncapacity = 0\n").unwrap_err();
        assert!(err.to_string().contains("capacity"));
    }

    #[test]
    fn test_rejects_oversized_capacity() {
        let err = SlotpoolConfig::from_toml_str("[settings]\ncapacity = 10000000000\n")
            .unwrap_err();
        assert!(err.to_string().contains("at most 10000"), "got: {err}");

        let config =
            SlotpoolConfig::from_toml_str(&format!("[settings]\ncapacity = {MAX_CAPACITY}\n"))
                .unwrap();
        assert_eq!(config.settings.capacity, Some(MAX_CAPACITY));
    }

    #[test]
    fn test_rejects_overflowing_interval() {
        let err =
            SlotpoolConfig::from_toml_str("[settings]\nsweep_interval = \"9999999999999999h\"\n")
                .unwrap_err();
        assert!(err.to_string().contains("not a valid duration"), "got: {err}");
    }

    #[test]
    fn test_rejects_bad_interval() {
        let err = SlotpoolConfig::from_toml_str("[settings]\nsweep_interval = \"soon\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("sweep_interval"));

        let err = SlotpoolConfig::from_toml_str("[settings]\nsweep_interval = \"0s\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("sweep_interval"));
    }

    #[test]
    fn test_rejects_empty_dsn() {
        let err = SlotpoolConfig::from_toml_str("[pools.main]\ndsn = \"  \"\n").unwrap_err();
        assert!(err.to_string().contains("pools.main.dsn"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[pools.main]\ndsn = \"postgres://db/main\"\nping = true").unwrap();
        let config = SlotpoolConfig::from_file(file.path()).unwrap();
        assert_eq!(config.pools["main"].ping, Some(true));
    }

    #[test]
    fn test_from_missing_file() {
        let err = SlotpoolConfig::from_file(Path::new("/nonexistent/slotpool.toml")).unwrap_err();
        assert!(err.to_string().contains("reading"));
    }
}
