//! Configuration for clustertopo

use crate::common::utils::parse_duration;
use crate::common::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "clustertopo.toml";

/// Environment prefix (`CLUSTERTOPO__HEARTBEAT__STALE_AFTER=90s`)
pub const ENV_PREFIX: &str = "CLUSTERTOPO";

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Store backend selection
    #[serde(default)]
    pub store: StoreConfig,

    /// Liveness classification
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            store: StoreConfig::default(),
            heartbeat: HeartbeatConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sled,
}

/// Store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Database directory (sled only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Heartbeat staleness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// A heartbeat older than this counts as missing ("30s", "5m", ...)
    #[serde(default = "default_stale_after")]
    pub stale_after: String,

    /// When set and `Sync/HeartbeatIntervalMs` is stored, the cutoff becomes
    /// `interval * missed_beats` instead of `stale_after`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missed_beats: Option<u32>,
}

fn default_stale_after() -> String {
    "60s".to_string()
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            stale_after: default_stale_after(),
            missed_beats: None,
        }
    }
}

impl HeartbeatConfig {
    /// Fixed staleness cutoff
    pub fn stale_after(&self) -> Result<Duration> {
        parse_duration(&self.stale_after)
    }

    /// Shorthand for tests and embedders that already hold a `Duration`
    pub fn with_stale_after(stale_after: Duration) -> Self {
        Self {
            stale_after: format!("{}ms", stale_after.as_millis()),
            missed_beats: None,
        }
    }
}

impl Config {
    /// Load `clustertopo.toml` (if present) and `CLUSTERTOPO__*` env overrides
    pub fn load() -> Result<Self> {
        Self::build(config::File::with_name(DEFAULT_CONFIG_FILE).required(false))
    }

    /// Load an explicit config file plus env overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::build(config::File::from(path.as_ref()).required(true))
    }

    fn build<S>(file: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config: Config = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        tracing::debug!(?config, "configuration loaded");
        Ok(config)
    }

    /// Reject settings that would break liveness classification or store setup
    pub fn validate(&self) -> Result<()> {
        let stale_after = self.heartbeat.stale_after()?;
        if stale_after.is_zero() {
            return Err(crate::Error::InvalidConfig(
                "heartbeat.stale_after must be positive".into(),
            ));
        }
        if self.heartbeat.missed_beats == Some(0) {
            return Err(crate::Error::InvalidConfig(
                "heartbeat.missed_beats must be at least 1".into(),
            ));
        }
        if self.store.backend == StoreBackend::Sled && self.store.path.is_none() {
            return Err(crate::Error::InvalidConfig(
                "store.path is required for the sled backend".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(
            config.heartbeat.stale_after().unwrap(),
            Duration::from_secs(60)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
log_level = "debug"

[heartbeat]
stale_after = "5m"
missed_beats = 4
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(
            config.heartbeat.stale_after().unwrap(),
            Duration::from_secs(300)
        );
        assert_eq!(config.heartbeat.missed_beats, Some(4));
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut config = Config::default();
        config.heartbeat.stale_after = "0s".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.heartbeat.missed_beats = Some(0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.store.backend = StoreBackend::Sled;
        assert!(config.validate().is_err());
        config.store.path = Some(PathBuf::from("./agency-data"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_stale_after() {
        let hb = HeartbeatConfig::with_stale_after(Duration::from_secs(90));
        assert_eq!(hb.stale_after().unwrap(), Duration::from_secs(90));
    }
}
