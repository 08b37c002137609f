//! Server roster views (`DBServers`, `Coordinators`)
//!
//! The store keeps one scalar per primary: `"none"` when it has no secondary,
//! otherwise the secondary's id. Secondaries have no key of their own; their
//! role is derived here, in [`materialize_roster`], and nowhere else.

use crate::common::{decode_segment, Result};
use crate::store::registry::Endpoint;
use crate::store::{AgencyStore, ServerRegistry, WriteOp};
use crate::topology::paths::{self, EntityClass, Namespace};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Stored value meaning "primary without secondary"
pub const NO_SECONDARY: &str = "none";

/// Role of a server in a roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Role {
    Primary {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        secondary: Option<String>,
    },
    Secondary,
}

impl Role {
    pub fn primary() -> Self {
        Role::Primary { secondary: None }
    }

    pub fn kind(&self) -> RoleKind {
        match self {
            Role::Primary { .. } => RoleKind::Primary,
            Role::Secondary => RoleKind::Secondary,
        }
    }

    pub fn secondary(&self) -> Option<&str> {
        match self {
            Role::Primary { secondary } => secondary.as_deref(),
            Role::Secondary => None,
        }
    }
}

/// Role without the pairing payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleKind {
    Primary,
    Secondary,
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleKind::Primary => write!(f, "primary"),
            RoleKind::Secondary => write!(f, "secondary"),
        }
    }
}

/// Materialized roster keyed by server id
pub type Roster = BTreeMap<String, Role>;

/// Roster entry enriched with its registered endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    #[serde(flatten)]
    pub role: Role,
    pub address: String,
    pub protocol: String,
}

/// Build a roster from raw `primary -> pointer` entries.
///
/// Every key is a primary. A pointer other than `"none"` pairs a secondary,
/// which is synthesized unless it is a primary key itself.
pub fn materialize_roster<I>(pointers: I) -> Roster
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut roster = Roster::new();
    let mut paired = Vec::new();
    for (id, pointer) in pointers {
        let secondary = (pointer != NO_SECONDARY).then_some(pointer);
        if let Some(s) = &secondary {
            paired.push(s.clone());
        }
        roster.insert(id, Role::Primary { secondary });
    }
    for secondary in paired {
        roster.entry(secondary).or_insert(Role::Secondary);
    }
    roster
}

/// Attach endpoints to every roster entry; a registry miss fails the call
pub fn enrich(roster: Roster, registry: &dyn ServerRegistry) -> Result<BTreeMap<String, ServerInfo>> {
    roster
        .into_iter()
        .map(|(id, role)| {
            let Endpoint { address, protocol } = registry.resolve(&id)?;
            Ok((
                id,
                ServerInfo {
                    role,
                    address,
                    protocol,
                },
            ))
        })
        .collect()
}

/// Pairing invariant violation found by [`DBServers::validate`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RosterViolation {
    /// One secondary referenced by several primaries
    SharedSecondary {
        secondary: String,
        primaries: Vec<String>,
    },
    /// A secondary that is itself a primary with its own secondary
    ChainedSecondary { primary: String, secondary: String },
    /// A primary naming itself as secondary
    SelfPaired { server: String },
}

/// Read the flat `id -> scalar` entries under a roster path, in store order
fn read_pointers(store: &dyn AgencyStore, path: &str) -> Result<Vec<(String, String)>> {
    let Some(node) = store.get(path, false)? else {
        return Ok(Vec::new());
    };
    let Value::Object(entries) = node else {
        return Err(crate::Error::malformed(path, "roster is not a directory"));
    };
    entries
        .into_iter()
        .map(|(key, value)| {
            let id = decode_segment(&key)?;
            match value {
                Value::String(pointer) => Ok((id, pointer)),
                other => Err(crate::Error::malformed(
                    format!("{}/{}", path, key),
                    format!("expected server id or \"none\", got {}", other),
                )),
            }
        })
        .collect()
}

fn ensure_writable(ns: Namespace) -> Result<()> {
    if ns.is_writable() {
        Ok(())
    } else {
        Err(crate::Error::ReadOnly(ns))
    }
}

/// DB server roster of one namespace
#[derive(Clone, Copy)]
pub struct DBServers<'a> {
    store: &'a dyn AgencyStore,
    ns: Namespace,
}

impl<'a> DBServers<'a> {
    pub fn new(store: &'a dyn AgencyStore, ns: Namespace) -> Self {
        Self { store, ns }
    }

    pub fn namespace(&self) -> Namespace {
        self.ns
    }

    fn root(&self) -> String {
        paths::resolve(self.ns, EntityClass::DBServers, &[])
    }

    /// Raw `(primary, "none" | secondary)` entries in store order
    pub fn pointers(&self) -> Result<Vec<(String, String)>> {
        read_pointers(self.store, &self.root())
    }

    /// Materialized roster, secondaries included
    pub fn get_list(&self) -> Result<Roster> {
        let roster = materialize_roster(self.pointers()?);
        tracing::debug!(ns = %self.ns, servers = roster.len(), "read db server roster");
        Ok(roster)
    }

    /// Roster with `address`/`protocol` from the registry; fails on a registry miss
    pub fn get_list_with_endpoints(
        &self,
        registry: &dyn ServerRegistry,
    ) -> Result<BTreeMap<String, ServerInfo>> {
        enrich(self.get_list()?, registry)
    }

    /// `(primary, secondary)` pairs in store order
    pub fn pairs(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .pointers()?
            .into_iter()
            .filter(|(_, pointer)| pointer != NO_SECONDARY)
            .collect())
    }

    /// Pairing invariant violations in the stored roster
    pub fn validate(&self) -> Result<Vec<RosterViolation>> {
        let pointers: BTreeMap<String, String> = self.pointers()?.into_iter().collect();
        let mut violations = Vec::new();
        let mut referenced: BTreeMap<&str, Vec<String>> = BTreeMap::new();

        for (primary, pointer) in &pointers {
            if pointer == NO_SECONDARY {
                continue;
            }
            if pointer == primary {
                violations.push(RosterViolation::SelfPaired {
                    server: primary.clone(),
                });
                continue;
            }
            referenced.entry(pointer.as_str()).or_default().push(primary.clone());
            if pointers
                .get(pointer)
                .is_some_and(|own| own != NO_SECONDARY)
            {
                violations.push(RosterViolation::ChainedSecondary {
                    primary: primary.clone(),
                    secondary: pointer.clone(),
                });
            }
        }
        for (secondary, primaries) in referenced {
            if primaries.len() > 1 {
                violations.push(RosterViolation::SharedSecondary {
                    secondary: secondary.to_string(),
                    primaries,
                });
            }
        }
        Ok(violations)
    }

    /// Register `name` as a primary without secondary
    pub fn add_primary(&self, name: &str) -> Result<bool> {
        ensure_writable(self.ns)?;
        let path = paths::db_server(self.ns, name);
        tracing::info!(server = name, %path, "adding primary");
        self.store.set(&path, Value::from(NO_SECONDARY))?;
        Ok(true)
    }

    /// Pair `secondary` with `primary`, replacing any previous secondary.
    ///
    /// A secondary already paired with another primary is released from it in
    /// the same write, so one secondary never serves two primaries.
    pub fn add_secondary(&self, secondary: &str, primary: &str) -> Result<bool> {
        ensure_writable(self.ns)?;
        let mut ops = Vec::new();
        for (other, pointer) in self.pointers()? {
            if pointer == secondary && other != primary {
                tracing::info!(server = secondary, previous = %other, "releasing secondary from previous primary");
                ops.push(WriteOp::set(paths::db_server(self.ns, &other), NO_SECONDARY));
            }
        }
        let path = paths::db_server(self.ns, primary);
        tracing::info!(primary, secondary, %path, "pairing secondary");
        ops.push(WriteOp::set(path, secondary));
        self.store.transact(&ops)?;
        Ok(true)
    }

    /// Register `name` as primary paired with `secondary` in one write
    pub fn add_pair(&self, name: &str, secondary: &str) -> Result<bool> {
        self.add_secondary(secondary, name)
    }

    /// Remove a server from the roster.
    ///
    /// - primary with secondary: the secondary is promoted, then the primary deleted
    /// - primary without secondary: deleted
    /// - referenced as secondary: its primary is reset to `"none"`
    ///
    /// Returns `false` when `name` is unknown. The writes go through
    /// [`AgencyStore::transact`]; on stores without transactions a concurrent
    /// reader can see the intermediate state.
    pub fn remove_server(&self, name: &str) -> Result<bool> {
        ensure_writable(self.ns)?;
        let pointers = self.pointers()?;
        let mut ops = Vec::new();

        if let Some((_, pointer)) = pointers.iter().find(|(id, _)| id == name) {
            if pointer != NO_SECONDARY && pointer != name {
                tracing::info!(server = name, promoted = %pointer, "promoting secondary");
                ops.push(WriteOp::set(paths::db_server(self.ns, pointer), NO_SECONDARY));
            }
            ops.push(WriteOp::remove(paths::db_server(self.ns, name)));
        }
        for (primary, pointer) in &pointers {
            if pointer == name && primary != name {
                tracing::info!(server = name, %primary, "detaching secondary");
                ops.push(WriteOp::set(paths::db_server(self.ns, primary), NO_SECONDARY));
            }
        }

        if ops.is_empty() {
            tracing::debug!(server = name, "remove_server: not in roster");
            return Ok(false);
        }
        self.store.transact(&ops)?;
        Ok(true)
    }
}

/// Coordinator roster of one namespace; every entry is a primary
#[derive(Clone, Copy)]
pub struct Coordinators<'a> {
    store: &'a dyn AgencyStore,
    ns: Namespace,
}

impl<'a> Coordinators<'a> {
    pub fn new(store: &'a dyn AgencyStore, ns: Namespace) -> Self {
        Self { store, ns }
    }

    pub fn get_list(&self) -> Result<Roster> {
        let root = paths::resolve(self.ns, EntityClass::Coordinators, &[]);
        let roster: Roster = read_pointers(self.store, &root)?
            .into_iter()
            .map(|(id, _)| (id, Role::primary()))
            .collect();
        tracing::debug!(ns = %self.ns, coordinators = roster.len(), "read coordinator roster");
        Ok(roster)
    }

    pub fn get_list_with_endpoints(
        &self,
        registry: &dyn ServerRegistry,
    ) -> Result<BTreeMap<String, ServerInfo>> {
        enrich(self.get_list()?, registry)
    }

    pub fn add(&self, name: &str) -> Result<bool> {
        ensure_writable(self.ns)?;
        let path = paths::coordinator(self.ns, name);
        tracing::info!(coordinator = name, %path, "adding coordinator");
        self.store.set(&path, Value::from(NO_SECONDARY))?;
        Ok(true)
    }

    /// Delete `name`; `false` when it is not in the roster
    pub fn remove(&self, name: &str) -> Result<bool> {
        ensure_writable(self.ns)?;
        let path = paths::coordinator(self.ns, name);
        if self.store.get(&path, false)?.is_none() {
            tracing::debug!(coordinator = name, "remove: not in roster");
            return Ok(false);
        }
        tracing::info!(coordinator = name, %path, "removing coordinator");
        self.store.remove(&path)?;
        Ok(true)
    }
}
