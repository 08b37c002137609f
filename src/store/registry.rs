//! Server registry: server id → endpoint URL (`tcp://host:port`)

use super::AgencyStore;
use crate::common::{decode_segment, split_endpoint, Result};
use crate::topology::paths::{self, EntityClass, Namespace};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Address and protocol of a registered server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub address: String,
    pub protocol: String,
}

impl Endpoint {
    pub fn parse(server: &str, endpoint: &str) -> Result<Self> {
        let (protocol, address) =
            split_endpoint(endpoint).ok_or_else(|| crate::Error::InvalidEndpoint {
                server: server.to_string(),
                endpoint: endpoint.to_string(),
            })?;
        Ok(Self { address, protocol })
    }
}

/// Lookup of connection endpoints by server id
pub trait ServerRegistry: Send + Sync {
    /// Raw endpoint URL, `Ok(None)` when the server is not registered
    fn endpoint(&self, server: &str) -> Result<Option<String>>;

    /// Ids of every registered server
    fn servers(&self) -> Result<Vec<String>>;

    /// Resolved endpoint; a registry miss is an error
    fn resolve(&self, server: &str) -> Result<Endpoint> {
        let endpoint = self
            .endpoint(server)?
            .ok_or_else(|| crate::Error::Unregistered(server.to_string()))?;
        Endpoint::parse(server, &endpoint)
    }

    /// Resolved endpoint; a miss or an unparsable URL yields `None`
    fn try_resolve(&self, server: &str) -> Result<Option<Endpoint>> {
        match self.resolve(server) {
            Ok(endpoint) => Ok(Some(endpoint)),
            Err(crate::Error::Unregistered(_)) | Err(crate::Error::InvalidEndpoint { .. }) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Fixed id → endpoint map
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    endpoints: HashMap<String, String>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, server: impl Into<String>, endpoint: impl Into<String>) -> Self {
        self.register(server, endpoint);
        self
    }

    pub fn register(&mut self, server: impl Into<String>, endpoint: impl Into<String>) {
        self.endpoints.insert(server.into(), endpoint.into());
    }
}

impl ServerRegistry for StaticRegistry {
    fn endpoint(&self, server: &str) -> Result<Option<String>> {
        Ok(self.endpoints.get(server).cloned())
    }

    fn servers(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.endpoints.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// Registry kept in the agency under `Current/ServersRegistered/<id>`.
///
/// An entry is either the endpoint string or `{"endpoint": "..."}`.
#[derive(Clone)]
pub struct StoreRegistry {
    store: Arc<dyn AgencyStore>,
}

impl StoreRegistry {
    pub fn new(store: Arc<dyn AgencyStore>) -> Self {
        Self { store }
    }

    /// Register (or re-register) a server's endpoint
    pub fn register(&self, server: &str, endpoint: &str) -> Result<()> {
        let path = registry_path(server);
        tracing::info!(server, endpoint, %path, "registering server endpoint");
        self.store
            .set(&path, serde_json::json!({ "endpoint": endpoint }))
    }
}

impl ServerRegistry for StoreRegistry {
    fn endpoint(&self, server: &str) -> Result<Option<String>> {
        let path = registry_path(server);
        match self.store.get(&path, true)? {
            None => Ok(None),
            Some(Value::String(endpoint)) => Ok(Some(endpoint)),
            Some(Value::Object(entry)) => match entry.get("endpoint") {
                Some(Value::String(endpoint)) => Ok(Some(endpoint.clone())),
                _ => Err(crate::Error::malformed(path, "registry entry without endpoint")),
            },
            Some(other) => Err(crate::Error::malformed(
                path,
                format!("unexpected registry entry {}", other),
            )),
        }
    }

    fn servers(&self) -> Result<Vec<String>> {
        let path = paths::resolve(Namespace::Current, EntityClass::ServersRegistered, &[]);
        self.store
            .list(&path, false, false)?
            .iter()
            .map(|id| decode_segment(id))
            .collect()
    }
}

/// Store path of a server's registry entry
pub fn registry_path(server: &str) -> String {
    paths::resolve(Namespace::Current, EntityClass::ServersRegistered, &[server])
}
