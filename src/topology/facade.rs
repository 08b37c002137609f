//! Single entry point over the topology views

use crate::common::{Config, HeartbeatConfig, Result};
use crate::store::{AgencyStore, ServerRegistry, Storage, StoreRegistry};
use crate::topology::databases::Databases;
use crate::topology::diff::{DiffEngine, DiffReport, ShardDistribution, TierDiff};
use crate::topology::heartbeat::Heartbeats;
use crate::topology::paths::Namespace;
use crate::topology::roster::{Coordinators, DBServers, ServerInfo};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Cluster topology facade.
///
/// Stateless over the store: every call re-reads what it needs, nothing is
/// cached between calls. Mutators always target the `Target` namespace.
pub struct Agency {
    store: Arc<dyn AgencyStore>,
    registry: Arc<dyn ServerRegistry>,
    heartbeat: HeartbeatConfig,
}

impl Agency {
    pub fn new(store: Arc<dyn AgencyStore>, registry: Arc<dyn ServerRegistry>) -> Self {
        Self {
            store,
            registry,
            heartbeat: HeartbeatConfig::default(),
        }
    }

    /// Open the configured store, with the registry kept in that same store
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let store = Storage::open(&config.store)?.backend();
        let registry = Arc::new(StoreRegistry::new(store.clone()));
        tracing::info!(backend = ?config.store.backend, "agency facade ready");
        Ok(Self::new(store, registry).with_heartbeat_config(config.heartbeat.clone()))
    }

    pub fn with_heartbeat_config(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn store(&self) -> &dyn AgencyStore {
        self.store.as_ref()
    }

    pub fn registry(&self) -> &dyn ServerRegistry {
        self.registry.as_ref()
    }

    // === Views ===

    pub fn db_servers(&self, ns: Namespace) -> DBServers<'_> {
        DBServers::new(self.store(), ns)
    }

    pub fn coordinators(&self, ns: Namespace) -> Coordinators<'_> {
        Coordinators::new(self.store(), ns)
    }

    pub fn databases(&self, ns: Namespace) -> Databases<'_> {
        Databases::new(self.store(), ns)
    }

    pub fn heartbeats(&self) -> Heartbeats<'_> {
        Heartbeats::new(self.store(), self.registry(), &self.heartbeat)
    }

    /// Current DB servers with `address`/`protocol`; fails on a registry miss
    pub fn current_db_servers(&self) -> Result<BTreeMap<String, ServerInfo>> {
        self.db_servers(Namespace::Current)
            .get_list_with_endpoints(self.registry())
    }

    /// Current coordinators with `address`/`protocol`; fails on a registry miss
    pub fn current_coordinators(&self) -> Result<BTreeMap<String, ServerInfo>> {
        self.coordinators(Namespace::Current)
            .get_list_with_endpoints(self.registry())
    }

    /// Registered endpoint URL of every `Current` coordinator, keyed by id.
    ///
    /// A coordinator missing from the registry fails the call.
    pub fn coordinator_endpoints(&self) -> Result<BTreeMap<String, String>> {
        self.coordinators(Namespace::Current)
            .get_list()?
            .into_keys()
            .map(|id| {
                let endpoint = self
                    .registry
                    .endpoint(&id)?
                    .ok_or_else(|| crate::Error::Unregistered(id.clone()))?;
                Ok((id, endpoint))
            })
            .collect()
    }

    // === Target mutators ===

    pub fn add_primary(&self, name: &str) -> Result<bool> {
        self.db_servers(Namespace::Target).add_primary(name)
    }

    pub fn add_secondary(&self, secondary: &str, primary: &str) -> Result<bool> {
        self.db_servers(Namespace::Target)
            .add_secondary(secondary, primary)
    }

    pub fn add_pair(&self, name: &str, secondary: &str) -> Result<bool> {
        self.db_servers(Namespace::Target).add_pair(name, secondary)
    }

    pub fn remove_server(&self, name: &str) -> Result<bool> {
        self.db_servers(Namespace::Target).remove_server(name)
    }

    pub fn add_coordinator(&self, name: &str) -> Result<bool> {
        self.coordinators(Namespace::Target).add(name)
    }

    pub fn remove_coordinator(&self, name: &str) -> Result<bool> {
        self.coordinators(Namespace::Target).remove(name)
    }

    // === Diff ===

    pub fn diff(&self) -> DiffEngine<'_> {
        DiffEngine::new(self.store(), self.registry())
    }

    /// `diff().plan()`
    pub fn diff_plan(&self) -> TierDiff<'_> {
        self.diff().plan()
    }

    /// `diff().current()`
    pub fn diff_current(&self) -> TierDiff<'_> {
        self.diff().current()
    }

    /// Plan vs Current shard placement for `database`, see
    /// [`DiffEngine::shard_distribution`]
    pub fn shard_distribution(
        &self,
        database: &str,
    ) -> Result<Option<BTreeMap<String, ShardDistribution>>> {
        self.diff().shard_distribution(database)
    }

    /// Both roster classes against Plan and Current
    pub fn reconcile_report(&self) -> Result<[DiffReport; 2]> {
        Ok([self.diff_plan().report()?, self.diff_current().report()?])
    }
}
