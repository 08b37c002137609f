//! Persistent agency tree on sled
//!
//! Every leaf is one sled key (its full path) holding the JSON-encoded value.
//! Directories are implied by key prefixes; an empty directory is kept as a
//! `{}` leaf.

use super::{tree, AgencyStore, WriteOp};
use crate::common::Result;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Sled store
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)?;
        tracing::info!(recovered = db.was_recovered(), "opened sled agency store");
        Ok(Self { db })
    }

    /// Flush to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn normalize(path: &str) -> String {
        tree::segments(path).join("/")
    }

    fn in_subtree(key: &str, path: &str) -> bool {
        path.is_empty()
            || key == path
            || (key.starts_with(path) && key.as_bytes().get(path.len()) == Some(&b'/'))
    }

    /// All `(key, leaf)` pairs at or below `path`
    fn scan(&self, op: &'static str, path: &str) -> Result<Vec<(String, Value)>> {
        let mut out = Vec::new();
        for item in self.db.scan_prefix(path.as_bytes()) {
            let (key, value) = item.map_err(|e| crate::Error::store(op, path, e))?;
            let key = String::from_utf8(key.to_vec())
                .map_err(|_| crate::Error::malformed(path, "non UTF-8 key"))?;
            if !Self::in_subtree(&key, path) {
                continue;
            }
            let value: Value = serde_json::from_slice(&value)
                .map_err(|e| crate::Error::malformed(key.as_str(), e))?;
            out.push((key, value));
        }
        Ok(out)
    }

    /// Rebuild the subtree at `path` from its leaves
    fn load(&self, op: &'static str, path: &str) -> Result<Option<Value>> {
        let leaves = self.scan(op, path)?;
        if leaves.is_empty() {
            return Ok(None);
        }
        let mut root = Value::Object(Map::new());
        for (key, value) in leaves {
            let rel = key[path.len()..].trim_start_matches('/');
            tree::insert(&mut root, &tree::segments(rel), value);
        }
        Ok(Some(root))
    }

    /// Stage `ops` against the current keys, last write per key wins
    fn stage(&self, ops: &[WriteOp]) -> Result<BTreeMap<String, Option<Value>>> {
        let mut staged: BTreeMap<String, Option<Value>> = BTreeMap::new();
        for op in ops {
            let path = Self::normalize(op.path());
            for (key, _) in self.scan("transact", &path)? {
                staged.insert(key, None);
            }
            for (key, slot) in staged.iter_mut() {
                if Self::in_subtree(key, &path) {
                    *slot = None;
                }
            }
            if let WriteOp::Set { value, .. } = op {
                for (key, leaf) in tree::flatten(&path, value) {
                    staged.insert(key.trim_start_matches('/').to_string(), Some(leaf));
                }
            }
        }
        Ok(staged)
    }

    fn commit(&self, ops: &[WriteOp]) -> Result<()> {
        let mut batch = sled::Batch::default();
        for (key, slot) in self.stage(ops)? {
            match slot {
                Some(value) => batch.insert(key.as_bytes(), serde_json::to_vec(&value)?),
                None => batch.remove(key.as_bytes()),
            }
        }
        let path = ops.first().map(WriteOp::path).unwrap_or_default();
        self.db
            .apply_batch(batch)
            .map_err(|e| crate::Error::store("transact", path, e))
    }
}

impl AgencyStore for SledStore {
    fn get(&self, path: &str, recursive: bool) -> Result<Option<Value>> {
        let path = Self::normalize(path);
        Ok(self
            .load("get", &path)?
            .map(|node| tree::render(&node, recursive)))
    }

    fn list(&self, path: &str, recursive: bool, flat: bool) -> Result<Vec<String>> {
        let path = Self::normalize(path);
        Ok(self
            .load("list", &path)?
            .map(|node| tree::children(&node, recursive, flat))
            .unwrap_or_default())
    }

    fn set(&self, path: &str, value: Value) -> Result<()> {
        self.commit(&[WriteOp::Set {
            path: path.to_string(),
            value,
        }])
    }

    fn remove(&self, path: &str) -> Result<()> {
        self.commit(&[WriteOp::remove(path)])
    }

    fn supports_transactions(&self) -> bool {
        true
    }

    fn transact(&self, ops: &[WriteOp]) -> Result<()> {
        self.commit(ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_sled_roundtrip_and_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = SledStore::open(dir.path().join("agency")).unwrap();
            store.set("Target/DBServers/pavel", json!("none")).unwrap();
            store
                .set(
                    "Target/Databases/db/Collections/9",
                    json!({"name": "c", "shards": {"s1": "pavel"}}),
                )
                .unwrap();
            store.flush().unwrap();
        }

        let store = SledStore::open(dir.path().join("agency")).unwrap();
        assert_eq!(
            store.get("Target/DBServers", false).unwrap(),
            Some(json!({"pavel": "none"}))
        );
        assert_eq!(
            store.get("Target/Databases/db/Collections/9", true).unwrap(),
            Some(json!({"name": "c", "shards": {"s1": "pavel"}}))
        );
        assert_eq!(
            store.list("Target/Databases", false, false).unwrap(),
            vec!["db"]
        );
    }

    #[test]
    fn test_sled_empty_directory_lists_as_leaf() {
        let dir = tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        store
            .set(
                "Current/Databases",
                json!({"_system": {"Collections": {"1001": {"name": "users"}}}, "shop": {}}),
            )
            .unwrap();
        assert_eq!(
            store.list("Current/Databases", true, true).unwrap(),
            vec!["_system/Collections/1001/name", "shop"]
        );
        assert_eq!(
            store.get("Current/Databases", false).unwrap(),
            Some(json!({"_system": {}, "shop": {}}))
        );
    }

    #[test]
    fn test_sled_prefix_does_not_leak_into_siblings() {
        let dir = tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        store.set("Target/DBServers/pa", json!("none")).unwrap();
        store.set("Target/DBServers/paul", json!("none")).unwrap();

        store.remove("Target/DBServers/pa").unwrap();
        assert_eq!(
            store.get("Target/DBServers/paul", false).unwrap(),
            Some(json!("none"))
        );
        assert!(store.get("Target/DBServers/pa", false).unwrap().is_none());
    }

    #[test]
    fn test_sled_transact() {
        let dir = tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        store.set("Target/DBServers/paul", json!("sally")).unwrap();
        store
            .transact(&[
                WriteOp::set("Target/DBServers/sally", "none"),
                WriteOp::remove("Target/DBServers/paul"),
            ])
            .unwrap();
        assert_eq!(
            store.get("Target/DBServers", false).unwrap(),
            Some(json!({"sally": "none"}))
        );
    }
}
