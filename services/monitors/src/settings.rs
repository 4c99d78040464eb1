//! Live, hot-reloadable admission settings.
//!
//! # Purpose
//! Holds the values every admission attempt consults (monitor quota, store
//! timeouts, throttle ceiling, destination allow-list) and keeps them current
//! while the process runs.
//!
//! # Notes
//! The current value is an immutable [`LiveSettings`] snapshot behind an
//! `ArcSwap`. Readers take one snapshot per request and never lock; a reload
//! replaces the whole snapshot at once, so no reader observes a partially
//! applied change.
use anyhow::{Context, Result, bail};
use arc_swap::ArcSwap;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Throttle periods below this are always rejected.
pub const MIN_ACTION_THROTTLE: Duration = Duration::from_secs(60);

const DEFAULT_MAX_MONITORS: u64 = 1000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_INDEX_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_MAX_ACTION_THROTTLE_SECS: u64 = 24 * 60 * 60;
const DEFAULT_DESTINATION_ALLOW_LIST: &[&str] =
    &["chime", "slack", "custom_webhook", "email", "test_action"];

#[derive(Debug, Clone, PartialEq)]
pub struct LiveSettings {
    pub max_monitors: u64,
    pub request_timeout: Duration,
    pub index_timeout: Duration,
    pub max_action_throttle: Duration,
    pub destination_allow_list: BTreeSet<String>,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            max_monitors: DEFAULT_MAX_MONITORS,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            index_timeout: Duration::from_millis(DEFAULT_INDEX_TIMEOUT_MS),
            max_action_throttle: Duration::from_secs(DEFAULT_MAX_ACTION_THROTTLE_SECS),
            destination_allow_list: DEFAULT_DESTINATION_ALLOW_LIST
                .iter()
                .map(|value| value.to_string())
                .collect(),
        }
    }
}

/// Partial settings as written in a settings file or config overlay.
#[derive(Debug, Default, Deserialize)]
pub struct SettingsOverride {
    pub max_monitors: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub index_timeout_ms: Option<u64>,
    pub max_action_throttle_secs: Option<u64>,
    pub destination_allow_list: Option<Vec<String>>,
}

impl LiveSettings {
    /// Seed values from `MONITORS_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut settings = Self::default();
        settings.apply(SettingsOverride {
            max_monitors: env_u64("MONITORS_MAX_MONITORS")?,
            request_timeout_ms: env_u64("MONITORS_REQUEST_TIMEOUT_MS")?,
            index_timeout_ms: env_u64("MONITORS_INDEX_TIMEOUT_MS")?,
            max_action_throttle_secs: env_u64("MONITORS_MAX_ACTION_THROTTLE_SECS")?,
            destination_allow_list: env_list("MONITORS_DESTINATION_ALLOW_LIST"),
        });
        settings.validate()?;
        Ok(settings)
    }

    pub fn apply(&mut self, overrides: SettingsOverride) {
        if let Some(value) = overrides.max_monitors {
            self.max_monitors = value;
        }
        if let Some(value) = overrides.request_timeout_ms {
            self.request_timeout = Duration::from_millis(value);
        }
        if let Some(value) = overrides.index_timeout_ms {
            self.index_timeout = Duration::from_millis(value);
        }
        if let Some(value) = overrides.max_action_throttle_secs {
            self.max_action_throttle = Duration::from_secs(value);
        }
        if let Some(values) = overrides.destination_allow_list {
            self.destination_allow_list = values.into_iter().collect();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_action_throttle < MIN_ACTION_THROTTLE {
            bail!(
                "max action throttle must be at least {}",
                format_duration(MIN_ACTION_THROTTLE)
            );
        }
        if self.request_timeout.is_zero() || self.index_timeout.is_zero() {
            bail!("store timeouts must be greater than zero");
        }
        Ok(())
    }

    pub fn allows_destination(&self, destination_type: &str) -> bool {
        self.destination_allow_list.contains(destination_type)
    }

    /// Parse a YAML settings document on top of `self`.
    pub fn overlay_yaml(&self, contents: &str) -> Result<Self> {
        let overrides: SettingsOverride =
            serde_yaml::from_str(contents).with_context(|| "parse settings yaml")?;
        let mut next = self.clone();
        next.apply(overrides);
        next.validate()?;
        Ok(next)
    }
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .with_context(|| format!("parse {key}")),
        Err(_) => Ok(None),
    }
}

fn env_list(key: &str) -> Option<Vec<String>> {
    let value = std::env::var(key).ok()?;
    let items = value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();
    Some(items)
}

/// Compact duration rendering used in caller-facing messages, e.g. `1d`,
/// `61m`, `90s`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs != 0 && secs % 86_400 == 0 {
        format!("{}d", secs / 86_400)
    } else if secs != 0 && secs % 3_600 == 0 {
        format!("{}h", secs / 3_600)
    } else if secs != 0 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}

/// Cloneable handle to the process-wide settings cell.
#[derive(Debug, Clone)]
pub struct SettingsHandle {
    current: Arc<ArcSwap<LiveSettings>>,
}

impl SettingsHandle {
    pub fn new(settings: LiveSettings) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(settings)),
        }
    }

    pub fn snapshot(&self) -> Arc<LiveSettings> {
        self.current.load_full()
    }

    pub fn replace(&self, settings: LiveSettings) {
        self.current.store(Arc::new(settings));
    }

    /// Apply `change` to the latest snapshot and publish the result.
    pub fn update(&self, change: impl Fn(&mut LiveSettings)) {
        self.current.rcu(|current| {
            let mut next = LiveSettings::clone(current);
            change(&mut next);
            next
        });
    }
}

/// Poll `path` and publish a new snapshot whenever its contents change.
///
/// `base` supplies the values the file does not mention. Unreadable or invalid
/// files are logged and the previous snapshot stays in effect.
pub async fn watch_settings_file(
    path: PathBuf,
    base: LiveSettings,
    handle: SettingsHandle,
    interval: Duration,
) {
    let mut last_contents: Option<String> = None;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        reload_once(&path, &base, &handle, &mut last_contents).await;
    }
}

async fn reload_once(
    path: &Path,
    base: &LiveSettings,
    handle: &SettingsHandle,
    last_contents: &mut Option<String>,
) {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "settings file unreadable");
            return;
        }
    };
    if last_contents.as_deref() == Some(contents.as_str()) {
        return;
    }
    match base.overlay_yaml(&contents) {
        Ok(next) => {
            tracing::info!(
                path = %path.display(),
                max_monitors = next.max_monitors,
                allow_list = ?next.destination_allow_list,
                "live settings reloaded"
            );
            metrics::counter!("monitor_settings_reloads_total", "result" => "applied").increment(1);
            handle.replace(next);
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "settings file rejected");
            metrics::counter!("monitor_settings_reloads_total", "result" => "rejected")
                .increment(1);
        }
    }
    *last_contents = Some(contents);
}
