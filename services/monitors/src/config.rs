use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SETTINGS_POLL_MS: u64 = 2_000;

// Monitor service configuration sourced from environment variables, with an
// optional YAML overlay named by MONITORS_CONFIG.
#[derive(Debug, Clone)]
pub struct MonitorsConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    /// YAML file watched for live settings changes.
    pub settings_path: Option<PathBuf>,
    pub settings_poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct MonitorsConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    settings_path: Option<PathBuf>,
    settings_poll_ms: Option<u64>,
}

impl MonitorsConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("MONITORS_BIND")
            .unwrap_or_else(|_| "0.0.0.0:9200".to_string())
            .parse()
            .with_context(|| "parse MONITORS_BIND")?;
        let metrics_bind = std::env::var("MONITORS_METRICS_BIND")
            .unwrap_or_else(|_| "0.0.0.0:9201".to_string())
            .parse()
            .with_context(|| "parse MONITORS_METRICS_BIND")?;
        let settings_path = std::env::var("MONITORS_SETTINGS_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);
        let settings_poll_ms = match std::env::var("MONITORS_SETTINGS_POLL_MS") {
            Ok(value) => value
                .parse::<u64>()
                .with_context(|| "parse MONITORS_SETTINGS_POLL_MS")?,
            Err(_) => DEFAULT_SETTINGS_POLL_MS,
        };
        Ok(Self {
            bind_addr,
            metrics_bind,
            settings_path,
            settings_poll_interval: poll_interval(settings_poll_ms)?,
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("MONITORS_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read MONITORS_CONFIG: {path}"))?;
            let override_cfg: MonitorsConfigOverride =
                serde_yaml::from_str(&contents).with_context(|| "parse monitors config yaml")?;
            if let Some(value) = override_cfg.bind_addr {
                config.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
            }
            if let Some(value) = override_cfg.metrics_bind {
                config.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
            }
            if let Some(value) = override_cfg.settings_path {
                config.settings_path = Some(value);
            }
            if let Some(value) = override_cfg.settings_poll_ms {
                config.settings_poll_interval = poll_interval(value)?;
            }
        }
        Ok(config)
    }
}

fn poll_interval(millis: u64) -> Result<Duration> {
    anyhow::ensure!(millis > 0, "settings poll interval must be greater than 0");
    Ok(Duration::from_millis(millis))
}
