//! Agency path layout
//!
//! ```text
//! <ns>/DBServers/<id>                          "none" | <secondary id>
//! <ns>/Coordinators/<id>                       "none"
//! <ns>/Databases/<db>/Collections/<collId>     collection record
//! Current/ServersRegistered/<id>               {"endpoint": "tcp://host:port"}
//! Sync/ServerStates/<id>                       {"status": ..., "time": ...}
//! Sync/HeartbeatIntervalMs                     integer
//! ```
//!
//! Caller-supplied segments are percent-encoded.

use crate::common::encode_segment;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level agency namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Namespace {
    /// Desired state, written by this layer
    Target,
    /// State scheduled for rollout
    Plan,
    /// State reported by running servers
    Current,
    /// Heartbeats and liveness
    Sync,
}

impl Namespace {
    pub const ALL: [Namespace; 4] = [
        Namespace::Target,
        Namespace::Plan,
        Namespace::Current,
        Namespace::Sync,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Target => "Target",
            Namespace::Plan => "Plan",
            Namespace::Current => "Current",
            Namespace::Sync => "Sync",
        }
    }

    /// Only `Target` accepts mutations from this layer
    pub fn is_writable(&self) -> bool {
        matches!(self, Namespace::Target)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity class below a namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityClass {
    DBServers,
    Coordinators,
    Databases,
    /// Keyed by `[db, collId]`
    Collections,
    ServersRegistered,
    ServerStates,
    HeartbeatIntervalMs,
}

impl EntityClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityClass::DBServers => "DBServers",
            EntityClass::Coordinators => "Coordinators",
            EntityClass::Databases => "Databases",
            EntityClass::Collections => "Collections",
            EntityClass::ServersRegistered => "ServersRegistered",
            EntityClass::ServerStates => "ServerStates",
            EntityClass::HeartbeatIntervalMs => "HeartbeatIntervalMs",
        }
    }
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the store path for `class` under `ns`, followed by `keys`.
///
/// `Collections` nests under its database: `[db]` gives the collections
/// directory, `[db, collId]` a single record, `[]` the databases directory.
pub fn resolve(ns: Namespace, class: EntityClass, keys: &[&str]) -> String {
    let mut path = String::from(ns.as_str());
    let mut push = |segment: &str| {
        path.push('/');
        path.push_str(segment);
    };

    match class {
        EntityClass::Collections => {
            push(EntityClass::Databases.as_str());
            if let Some((db, rest)) = keys.split_first() {
                push(&encode_segment(db));
                push(class.as_str());
                for key in rest {
                    push(&encode_segment(key));
                }
            }
        }
        _ => {
            push(class.as_str());
            for key in keys {
                push(&encode_segment(key));
            }
        }
    }
    path
}

pub fn db_server(ns: Namespace, id: &str) -> String {
    resolve(ns, EntityClass::DBServers, &[id])
}

pub fn coordinator(ns: Namespace, id: &str) -> String {
    resolve(ns, EntityClass::Coordinators, &[id])
}

pub fn database(ns: Namespace, db: &str) -> String {
    resolve(ns, EntityClass::Databases, &[db])
}

pub fn collections(ns: Namespace, db: &str) -> String {
    resolve(ns, EntityClass::Collections, &[db])
}

pub fn collection(ns: Namespace, db: &str, collection_id: &str) -> String {
    resolve(ns, EntityClass::Collections, &[db, collection_id])
}

pub fn server_state(id: &str) -> String {
    resolve(Namespace::Sync, EntityClass::ServerStates, &[id])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_paths() {
        assert_eq!(resolve(Namespace::Target, EntityClass::DBServers, &[]), "Target/DBServers");
        assert_eq!(db_server(Namespace::Target, "pavel"), "Target/DBServers/pavel");
        assert_eq!(coordinator(Namespace::Plan, "carlos"), "Plan/Coordinators/carlos");
    }

    #[test]
    fn test_collection_paths() {
        assert_eq!(
            resolve(Namespace::Current, EntityClass::Collections, &[]),
            "Current/Databases"
        );
        assert_eq!(database(Namespace::Plan, "_system"), "Plan/Databases/_system");
        assert_eq!(
            collections(Namespace::Plan, "_system"),
            "Plan/Databases/_system/Collections"
        );
        assert_eq!(
            collection(Namespace::Current, "shop", "1001"),
            "Current/Databases/shop/Collections/1001"
        );
    }

    #[test]
    fn test_sync_paths() {
        assert_eq!(server_state("sally"), "Sync/ServerStates/sally");
        assert_eq!(
            resolve(Namespace::Sync, EntityClass::HeartbeatIntervalMs, &[]),
            "Sync/HeartbeatIntervalMs"
        );
        assert_eq!(
            resolve(Namespace::Current, EntityClass::ServersRegistered, &["pavel"]),
            "Current/ServersRegistered/pavel"
        );
    }

    #[test]
    fn test_segments_are_encoded() {
        assert_eq!(
            db_server(Namespace::Target, "../Plan/x"),
            "Target/DBServers/..%2FPlan%2Fx"
        );
    }

    #[test]
    fn test_namespace_writability() {
        let writable: Vec<_> = Namespace::ALL.iter().filter(|ns| ns.is_writable()).collect();
        assert_eq!(writable, vec![&Namespace::Target]);
        assert_eq!(Namespace::Current.to_string(), "Current");
    }
}
