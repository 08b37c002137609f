//! In-memory agency tree

use super::{tree, AgencyStore, WriteOp};
use crate::common::Result;
use serde_json::{Map, Value};
use std::sync::{Mutex, MutexGuard};

/// In-memory store (default)
///
/// One JSON tree behind a mutex; `transact` applies all writes under a single
/// lock, so readers never observe a partial multi-key mutation.
pub struct MemStore {
    root: Mutex<Value>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            root: Mutex::new(Value::Object(Map::new())),
        }
    }

    /// Seed from a full tree, e.g. `json!({"Target": {"DBServers": {...}}})`
    pub fn from_tree(root: Value) -> Self {
        Self {
            root: Mutex::new(root),
        }
    }

    /// Copy of the whole tree
    pub fn snapshot(&self) -> Result<Value> {
        Ok(self.lock("snapshot", "")?.clone())
    }

    fn lock(&self, op: &'static str, path: &str) -> Result<MutexGuard<'_, Value>> {
        self.root
            .lock()
            .map_err(|_| crate::Error::store(op, path, "store lock poisoned"))
    }

    fn apply(root: &mut Value, op: &WriteOp) {
        match op {
            WriteOp::Set { path, value } => {
                tree::insert(root, &tree::segments(path), value.clone());
            }
            WriteOp::Remove { path } => {
                tree::remove(root, &tree::segments(path));
            }
        }
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AgencyStore for MemStore {
    fn get(&self, path: &str, recursive: bool) -> Result<Option<Value>> {
        let root = self.lock("get", path)?;
        Ok(tree::lookup(&root, &tree::segments(path)).map(|node| tree::render(node, recursive)))
    }

    fn list(&self, path: &str, recursive: bool, flat: bool) -> Result<Vec<String>> {
        let root = self.lock("list", path)?;
        Ok(tree::lookup(&root, &tree::segments(path))
            .map(|node| tree::children(node, recursive, flat))
            .unwrap_or_default())
    }

    fn set(&self, path: &str, value: Value) -> Result<()> {
        let mut root = self.lock("set", path)?;
        Self::apply(
            &mut root,
            &WriteOp::Set {
                path: path.to_string(),
                value,
            },
        );
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<()> {
        let mut root = self.lock("remove", path)?;
        Self::apply(&mut root, &WriteOp::remove(path));
        Ok(())
    }

    fn supports_transactions(&self) -> bool {
        true
    }

    fn transact(&self, ops: &[WriteOp]) -> Result<()> {
        let path = ops.first().map(WriteOp::path).unwrap_or_default();
        let mut root = self.lock("transact", path)?;
        for op in ops {
            Self::apply(&mut root, op);
        }
        Ok(())
    }
}
