//! Database and collection views
//!
//! Collection records are read and written whole. A shard move rewrites the
//! entire record in one `set`, so readers never see a half-updated shard map.

use crate::common::{decode_segment, Result};
use crate::store::AgencyStore;
use crate::topology::paths::{self, EntityClass, Namespace};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Responsible server of a shard: a single id, or a replica list whose first
/// entry is the leader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShardOwner {
    Server(String),
    Replicas(Vec<String>),
}

impl ShardOwner {
    pub fn server(&self) -> Option<&str> {
        match self {
            ShardOwner::Server(id) => Some(id),
            ShardOwner::Replicas(ids) => ids.first().map(String::as_str),
        }
    }

    /// Every server holding the shard, leader first
    pub fn replicas(&self) -> &[String] {
        match self {
            ShardOwner::Server(id) => std::slice::from_ref(id),
            ShardOwner::Replicas(ids) => ids,
        }
    }

    /// Hand responsibility to `target`, keeping the stored shape.
    ///
    /// A follower becoming leader trades places with the old leader; any other
    /// server replaces the leader in place. The replica count never changes.
    fn reassign(&mut self, target: &str) {
        match self {
            ShardOwner::Server(id) => *id = target.to_string(),
            ShardOwner::Replicas(ids) => {
                let held = ids.iter().position(|id| id == target);
                match held {
                    Some(pos) => ids.swap(0, pos),
                    None if ids.is_empty() => ids.push(target.to_string()),
                    None => ids[0] = target.to_string(),
                }
            }
        }
    }
}

/// Collection record as stored under `<ns>/Databases/<db>/Collections/<id>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub name: String,
    #[serde(default)]
    pub shards: BTreeMap<String, ShardOwner>,
    /// `shardKeys`, `status` and anything else, passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CollectionRecord {
    /// Shard id → responsible server
    pub fn shard_servers(&self) -> BTreeMap<String, String> {
        self.shards
            .iter()
            .filter_map(|(shard, owner)| Some((shard.clone(), owner.server()?.to_string())))
            .collect()
    }
}

fn decode_record(path: &str, value: Value) -> Result<CollectionRecord> {
    serde_json::from_value(value).map_err(|e| crate::Error::malformed(path, e))
}

/// Databases of one namespace
#[derive(Clone, Copy)]
pub struct Databases<'a> {
    store: &'a dyn AgencyStore,
    ns: Namespace,
}

impl<'a> Databases<'a> {
    pub fn new(store: &'a dyn AgencyStore, ns: Namespace) -> Self {
        Self { store, ns }
    }

    /// Database names, sorted case-insensitively
    pub fn get_list(&self) -> Result<Vec<String>> {
        let root = paths::resolve(self.ns, EntityClass::Databases, &[]);
        let mut names = self
            .store
            .list(&root, false, false)?
            .iter()
            .map(|name| decode_segment(name))
            .collect::<Result<Vec<_>>>()?;
        names.sort_by(|a, b| {
            a.to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| a.cmp(b))
        });
        Ok(names)
    }

    /// Bind to `name`; `None` when the database does not exist
    pub fn select(&self, name: &str) -> Result<Option<Database<'a>>> {
        if !self.get_list()?.iter().any(|db| db == name) {
            tracing::debug!(ns = %self.ns, database = name, "database not found");
            return Ok(None);
        }
        Ok(Some(Database {
            store: self.store,
            ns: self.ns,
            name: name.to_string(),
        }))
    }
}

/// One database of one namespace
#[derive(Clone)]
pub struct Database<'a> {
    store: &'a dyn AgencyStore,
    ns: Namespace,
    name: String,
}

impl<'a> Database<'a> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All collection records keyed by collection id
    pub fn collection_records(&self) -> Result<BTreeMap<String, CollectionRecord>> {
        let root = paths::collections(self.ns, &self.name);
        let Some(node) = self.store.get(&root, true)? else {
            return Ok(BTreeMap::new());
        };
        let Value::Object(entries) = node else {
            return Err(crate::Error::malformed(root, "collections is not a directory"));
        };
        entries
            .into_iter()
            .map(|(key, value)| {
                let record = decode_record(&format!("{}/{}", root, key), value)?;
                Ok((decode_segment(&key)?, record))
            })
            .collect()
    }

    /// Collection names, sorted
    pub fn get_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .collection_records()?
            .into_values()
            .map(|record| record.name)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Bind to the collection called `name`; `None` when no record matches
    pub fn collection(&self, name: &str) -> Result<Option<Collection<'a>>> {
        let found = self
            .collection_records()?
            .into_iter()
            .find(|(_, record)| record.name == name);
        Ok(found.map(|(id, record)| Collection {
            store: self.store,
            ns: self.ns,
            database: self.name.clone(),
            id,
            name: record.name,
        }))
    }
}

/// One collection, addressed by its internal id
#[derive(Clone)]
pub struct Collection<'a> {
    store: &'a dyn AgencyStore,
    ns: Namespace,
    database: String,
    id: String,
    name: String,
}

impl<'a> Collection<'a> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> String {
        paths::collection(self.ns, &self.database, &self.id)
    }

    /// Raw collection record, read fresh
    pub fn info(&self) -> Result<CollectionRecord> {
        let path = self.path();
        let value = self
            .store
            .get(&path, true)?
            .ok_or_else(|| crate::Error::NotFound(path.clone()))?;
        decode_record(&path, value)
    }

    /// Shard id → responsible server
    pub fn get_shards(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.info()?.shard_servers())
    }

    /// Shards owned by `server`, sorted
    pub fn get_shards_for_server(&self, server: &str) -> Result<Vec<String>> {
        Ok(self
            .get_shards()?
            .into_iter()
            .filter(|(_, owner)| owner == server)
            .map(|(shard, _)| shard)
            .collect())
    }

    /// Responsible server of `shard`; `None` when the shard does not exist
    pub fn get_server_for_shard(&self, shard: &str) -> Result<Option<String>> {
        Ok(self.get_shards()?.remove(shard))
    }

    /// Declare `target` responsible for `shard` (Target only).
    ///
    /// Rewrites the whole record in one store write and returns it. No data
    /// moves; this changes declared responsibility only.
    pub fn move_shard(&self, shard: &str, target: &str) -> Result<CollectionRecord> {
        if !self.ns.is_writable() {
            return Err(crate::Error::ReadOnly(self.ns));
        }
        let mut record = self.info()?;
        let owner = record
            .shards
            .get_mut(shard)
            .ok_or_else(|| crate::Error::ShardNotFound {
                collection: self.name.clone(),
                shard: shard.to_string(),
            })?;
        let previous = owner.server().map(str::to_string);
        owner.reassign(target);

        let path = self.path();
        tracing::info!(
            database = %self.database,
            collection = %self.name,
            shard,
            from = ?previous,
            to = target,
            "moving shard responsibility"
        );
        self.store.set(&path, serde_json::to_value(&record)?)?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use serde_json::json;

    fn fixture() -> MemStore {
        MemStore::from_tree(json!({
            "Target": {"Databases": {
                "_system": {"Collections": {
                    "1001": {
                        "name": "users",
                        "shardKeys": ["_key"],
                        "status": 3,
                        "shards": {"v1": "pavel", "v2": "paul", "v3": "pavel"}
                    },
                    "1002": {"name": "audit", "shards": {"a1": ["paul", "pavel"]}}
                }},
                "Shop": {},
                "archive": {}
            }},
            "Plan": {"Databases": {"_system": {"Collections": {
                "1001": {"name": "users", "shards": {"v1": "pavel"}}
            }}}}
        }))
    }

    #[test]
    fn test_database_list_case_insensitive() {
        let store = fixture();
        let dbs = Databases::new(&store, Namespace::Target);
        assert_eq!(dbs.get_list().unwrap(), vec!["_system", "archive", "Shop"]);
        assert!(Databases::new(&store, Namespace::Current)
            .get_list()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_select_unknown_database() {
        let store = fixture();
        let dbs = Databases::new(&store, Namespace::Target);
        assert!(dbs.select("missing").unwrap().is_none());
        assert_eq!(dbs.select("Shop").unwrap().unwrap().name(), "Shop");
    }

    #[test]
    fn test_collections() {
        let store = fixture();
        let db = Databases::new(&store, Namespace::Target)
            .select("_system")
            .unwrap()
            .unwrap();
        assert_eq!(db.get_collections().unwrap(), vec!["audit", "users"]);
        assert!(db.collection("nope").unwrap().is_none());

        let users = db.collection("users").unwrap().unwrap();
        assert_eq!(users.id(), "1001");
        let info = users.info().unwrap();
        assert_eq!(info.extra["shardKeys"], json!(["_key"]));
        assert_eq!(info.extra["status"], json!(3));
    }

    #[test]
    fn test_shard_lookups() {
        let store = fixture();
        let db = Databases::new(&store, Namespace::Target)
            .select("_system")
            .unwrap()
            .unwrap();
        let users = db.collection("users").unwrap().unwrap();

        assert_eq!(users.get_shards().unwrap().len(), 3);
        assert_eq!(users.get_shards_for_server("pavel").unwrap(), vec!["v1", "v3"]);
        assert_eq!(
            users.get_server_for_shard("v2").unwrap().as_deref(),
            Some("paul")
        );
        assert!(users.get_server_for_shard("v9").unwrap().is_none());

        let audit = db.collection("audit").unwrap().unwrap();
        assert_eq!(
            audit.get_server_for_shard("a1").unwrap().as_deref(),
            Some("paul")
        );
    }

    #[test]
    fn test_move_shard() {
        let store = fixture();
        let db = Databases::new(&store, Namespace::Target)
            .select("_system")
            .unwrap()
            .unwrap();
        let users = db.collection("users").unwrap().unwrap();

        let record = users.move_shard("v1", "paul").unwrap();
        assert_eq!(record.shards["v1"], ShardOwner::Server("paul".into()));
        assert_eq!(
            users.get_server_for_shard("v1").unwrap().as_deref(),
            Some("paul")
        );
        assert_eq!(users.get_shards_for_server("pavel").unwrap(), vec!["v3"]);

        let stored = store
            .get("Target/Databases/_system/Collections/1001", true)
            .unwrap()
            .unwrap();
        assert_eq!(stored["shardKeys"], json!(["_key"]));
        assert_eq!(stored["shards"]["v1"], json!("paul"));
    }

    #[test]
    fn test_move_shard_keeps_replica_shape() {
        let store = fixture();
        let db = Databases::new(&store, Namespace::Target)
            .select("_system")
            .unwrap()
            .unwrap();
        let audit = db.collection("audit").unwrap().unwrap();

        // Promoting the follower keeps the old leader as a follower
        audit.move_shard("a1", "pavel").unwrap();
        assert_eq!(
            audit.info().unwrap().shards["a1"],
            ShardOwner::Replicas(vec!["pavel".into(), "paul".into()])
        );

        audit.move_shard("a1", "sally").unwrap();
        assert_eq!(
            audit.info().unwrap().shards["a1"],
            ShardOwner::Replicas(vec!["sally".into(), "paul".into()])
        );

        // Moving to the current leader changes nothing
        audit.move_shard("a1", "sally").unwrap();
        assert_eq!(
            audit.info().unwrap().shards["a1"],
            ShardOwner::Replicas(vec!["sally".into(), "paul".into()])
        );
    }

    #[test]
    fn test_move_shard_errors() {
        let store = fixture();
        let users = Databases::new(&store, Namespace::Target)
            .select("_system")
            .unwrap()
            .unwrap()
            .collection("users")
            .unwrap()
            .unwrap();
        assert!(matches!(
            users.move_shard("v9", "paul"),
            Err(crate::Error::ShardNotFound { .. })
        ));

        let planned = Databases::new(&store, Namespace::Plan)
            .select("_system")
            .unwrap()
            .unwrap()
            .collection("users")
            .unwrap()
            .unwrap();
        assert!(matches!(
            planned.move_shard("v1", "paul"),
            Err(crate::Error::ReadOnly(Namespace::Plan))
        ));
    }

    #[test]
    fn test_info_after_collection_dropped() {
        let store = fixture();
        let users = Databases::new(&store, Namespace::Target)
            .select("_system")
            .unwrap()
            .unwrap()
            .collection("users")
            .unwrap()
            .unwrap();
        store
            .remove("Target/Databases/_system/Collections/1001")
            .unwrap();
        assert!(matches!(users.info(), Err(crate::Error::NotFound(_))));
    }
}
