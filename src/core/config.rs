//! Watcher configuration: defaults, optional TOML file, CLI overrides.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, UwError};

/// Default state file, relative to the working directory.
pub const DEFAULT_STATE_FILE: &str = "systemd.state";
/// Default pause between two `list-units` calls.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);
/// Longest accepted pause between two `list-units` calls.
pub const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub const DEFAULT_SLACK_CHANNEL: &str = "systemd-state";
pub const DEFAULT_SLACK_USERNAME: &str = "systemd";
pub const DEFAULT_SLACK_ICON_URL: &str =
    "https://emoji.slack-edge.com/T043Q7UHW/garold/269d90c3a5ffe40f.png";

/// Everything the watcher and its notifier need, as plain values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    pub interval: Duration,
    pub state_file: PathBuf,
    pub slack: SlackConfig,
}

/// Notification channel parameters. Opaque to the watch loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlackConfig {
    pub webhook_url: Option<String>,
    pub channel: String,
    pub username: String,
    pub icon_url: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            channel: DEFAULT_SLACK_CHANNEL.to_string(),
            username: DEFAULT_SLACK_USERNAME.to_string(),
            icon_url: DEFAULT_SLACK_ICON_URL.to_string(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            slack: SlackConfig::default(),
        }
    }
}

/// On-disk TOML shape. Every key is optional; missing keys keep defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    interval_ms: Option<u64>,
    state_file: Option<PathBuf>,
    slack: Option<SlackConfig>,
}

impl WatchConfig {
    /// Parse a TOML document on top of the defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(raw)?;
        let mut config = Self::default();
        if let Some(ms) = file.interval_ms {
            config.interval = Duration::from_millis(ms);
        }
        if let Some(path) = file.state_file {
            config.state_file = path;
        }
        if let Some(slack) = file.slack {
            config.slack = slack;
        }
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| UwError::io(path, source))?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        check_interval(self.interval)?;
        if self.state_file.as_os_str().is_empty() {
            return Err(UwError::InvalidConfig {
                details: "state file path must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Poll intervals must be non-zero and at most [`MAX_INTERVAL`].
pub fn check_interval(interval: Duration) -> Result<()> {
    if interval.is_zero() {
        return Err(UwError::InvalidConfig {
            details: "interval must be greater than zero".to_string(),
        });
    }
    if interval > MAX_INTERVAL {
        return Err(UwError::InvalidConfig {
            details: format!(
                "interval {}s exceeds the {}s maximum",
                interval.as_secs(),
                MAX_INTERVAL.as_secs()
            ),
        });
    }
    Ok(())
}

/// Parse a humane duration: `250ms`, `2s`, `1m`, `1h`. A bare number is
/// taken as milliseconds.
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let value: u64 = digits.parse().map_err(|_| UwError::InvalidConfig {
        details: format!("invalid duration {raw:?}"),
    })?;
    let secs = |factor: u64| {
        value
            .checked_mul(factor)
            .map(Duration::from_secs)
            .ok_or_else(|| UwError::InvalidConfig {
                details: format!("duration {raw:?} is out of range"),
            })
    };
    match unit {
        "" | "ms" => Ok(Duration::from_millis(value)),
        "s" => secs(1),
        "m" => secs(60),
        "h" => secs(3600),
        other => Err(UwError::InvalidConfig {
            details: format!("unknown duration unit {other:?} in {raw:?}"),
        }),
    }
}
