//! Heartbeat and liveness classification (`Sync/ServerStates`)

use crate::common::{decode_segment, parse_timestamp, HeartbeatConfig, Result};
use crate::store::{AgencyStore, ServerRegistry};
use crate::topology::paths::{self, EntityClass, Namespace};
use crate::topology::roster::DBServers;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Replication/serving status reported in a heartbeat
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServerStatus {
    ServingSync,
    ServingAsync,
    InSync,
    Syncing,
    /// Any status this layer does not classify (startup, shutdown, ...)
    Other(String),
}

impl ServerStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ServerStatus::ServingSync => "SERVINGSYNC",
            ServerStatus::ServingAsync => "SERVINGASYNC",
            ServerStatus::InSync => "INSYNC",
            ServerStatus::Syncing => "SYNCING",
            ServerStatus::Other(s) => s,
        }
    }

    pub fn is_serving(&self) -> bool {
        matches!(self, ServerStatus::ServingSync | ServerStatus::ServingAsync)
    }
}

impl From<&str> for ServerStatus {
    /// Case-insensitive; `_` and `-` are ignored (`ServingSync`, `SERVING_SYNC`)
    fn from(s: &str) -> Self {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        match normalized.as_str() {
            "SERVINGSYNC" => ServerStatus::ServingSync,
            "SERVINGASYNC" => ServerStatus::ServingAsync,
            "INSYNC" => ServerStatus::InSync,
            "SYNCING" => ServerStatus::Syncing,
            _ => ServerStatus::Other(s.to_string()),
        }
    }
}

impl FromStr for ServerStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(ServerStatus::from(s))
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ServerStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ServerStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ServerStatus::from(s.as_str()))
    }
}

/// Last heartbeat of one server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeartbeatRecord {
    pub status: ServerStatus,
    pub time: DateTime<Utc>,
}

impl HeartbeatRecord {
    fn from_value(path: &str, value: &Value) -> Result<Self> {
        let status = value
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| crate::Error::malformed(path, "heartbeat without status"))?;
        let time = value
            .get("time")
            .and_then(parse_timestamp)
            .ok_or_else(|| crate::Error::malformed(path, "heartbeat without valid time"))?;
        Ok(Self {
            status: ServerStatus::from(status),
            time,
        })
    }

    /// Store representation: `{"status": "...", "time": "<rfc3339>"}`
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "status": self.status.as_str(),
            "time": self.time.to_rfc3339(),
        })
    }
}

/// Liveness view over `Sync`, paired against the Target roster
pub struct Heartbeats<'a> {
    store: &'a dyn AgencyStore,
    registry: &'a dyn ServerRegistry,
    config: &'a HeartbeatConfig,
}

impl<'a> Heartbeats<'a> {
    pub fn new(
        store: &'a dyn AgencyStore,
        registry: &'a dyn ServerRegistry,
        config: &'a HeartbeatConfig,
    ) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// Raw heartbeat records keyed by server id
    pub fn list(&self) -> Result<BTreeMap<String, HeartbeatRecord>> {
        let root = paths::resolve(Namespace::Sync, EntityClass::ServerStates, &[]);
        let Some(node) = self.store.get(&root, true)? else {
            return Ok(BTreeMap::new());
        };
        let Value::Object(entries) = node else {
            return Err(crate::Error::malformed(root, "server states is not a directory"));
        };
        entries
            .iter()
            .map(|(key, value)| {
                let record = HeartbeatRecord::from_value(&format!("{}/{}", root, key), value)?;
                Ok((decode_segment(key)?, record))
            })
            .collect()
    }

    /// Servers reporting a serving status, sorted
    pub fn get_serving(&self) -> Result<Vec<String>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|(_, beat)| beat.status.is_serving())
            .map(|(id, _)| id)
            .collect())
    }

    /// Target pairs whose secondary is in sync with a serving primary,
    /// flattened as `[primary, secondary, ...]` in roster order
    pub fn get_in_sync(&self) -> Result<Vec<String>> {
        let beats = self.list()?;
        self.flatten_pairs(&beats, |primary, secondary| {
            secondary == Some(&ServerStatus::InSync)
                && primary.is_some_and(ServerStatus::is_serving)
        })
    }

    /// Target pairs whose secondary is still syncing
    pub fn get_out_sync(&self) -> Result<Vec<String>> {
        let beats = self.list()?;
        self.flatten_pairs(&beats, |_, secondary| {
            secondary == Some(&ServerStatus::Syncing)
        })
    }

    fn flatten_pairs<F>(
        &self,
        beats: &BTreeMap<String, HeartbeatRecord>,
        keep: F,
    ) -> Result<Vec<String>>
    where
        F: Fn(Option<&ServerStatus>, Option<&ServerStatus>) -> bool,
    {
        let status = |id: &str| beats.get(id).map(|beat| &beat.status);
        Ok(DBServers::new(self.store, Namespace::Target)
            .pairs()?
            .into_iter()
            .filter(|(primary, secondary)| keep(status(primary), status(secondary)))
            .flat_map(|(primary, secondary)| [primary, secondary])
            .collect())
    }

    /// Registered servers that never sent a heartbeat, sorted
    pub fn get_inactive(&self) -> Result<Vec<String>> {
        let beats = self.list()?;
        let registered: BTreeSet<String> = self.registry.servers()?.into_iter().collect();
        Ok(registered
            .into_iter()
            .filter(|id| !beats.contains_key(id))
            .collect())
    }

    /// `Sync/HeartbeatIntervalMs`, if stored
    pub fn heartbeat_interval(&self) -> Result<Option<Duration>> {
        let path = paths::resolve(Namespace::Sync, EntityClass::HeartbeatIntervalMs, &[]);
        match self.store.get(&path, false)? {
            None => Ok(None),
            Some(value) => {
                let ms = value
                    .as_u64()
                    .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
                    .ok_or_else(|| crate::Error::malformed(path, "expected milliseconds"))?;
                Ok(Some(Duration::from_millis(ms)))
            }
        }
    }

    /// Age beyond which a heartbeat is stale
    pub fn threshold(&self) -> Result<Duration> {
        if let Some(beats) = self.config.missed_beats {
            if let Some(interval) = self.heartbeat_interval()? {
                return interval.checked_mul(beats).ok_or_else(|| {
                    crate::Error::malformed(
                        paths::resolve(Namespace::Sync, EntityClass::HeartbeatIntervalMs, &[]),
                        format!("interval {:?} x {} missed beats overflows", interval, beats),
                    )
                });
            }
        }
        self.config.stale_after()
    }

    /// Servers whose last heartbeat is older than [`Heartbeats::threshold`]
    pub fn no_beat(&self) -> Result<Vec<String>> {
        self.no_beat_at(Utc::now())
    }

    /// [`Heartbeats::no_beat`] against an explicit clock
    pub fn no_beat_at(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let threshold = self.threshold()?;
        let cutoff = chrono::Duration::from_std(threshold)
            .map_err(|e| crate::Error::InvalidConfig(format!("staleness threshold: {}", e)))?;
        let stale: Vec<String> = self
            .list()?
            .into_iter()
            .filter(|(_, beat)| now - beat.time > cutoff)
            .map(|(id, _)| id)
            .collect();
        if !stale.is_empty() {
            tracing::warn!(?stale, ?threshold, "servers missed heartbeats");
        }
        Ok(stale)
    }
}
