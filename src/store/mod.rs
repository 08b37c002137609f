//! Coordination store seam
//!
//! The agency itself (consensus, replication) lives outside this crate; views
//! talk to it through [`AgencyStore`]. Two backends ship here: the in-memory
//! [`MemStore`] and, behind `sled-backend`, a persistent [`SledStore`].

pub mod memory;
pub mod registry;
#[cfg(feature = "sled-backend")]
pub mod sled_store;
pub mod tree;

use crate::common::{Result, StoreBackend, StoreConfig};
use serde_json::Value;
use std::sync::Arc;

pub use memory::MemStore;
pub use registry::{ServerRegistry, StaticRegistry, StoreRegistry};
#[cfg(feature = "sled-backend")]
pub use sled_store::SledStore;

/// One write inside a multi-key mutation
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Set { path: String, value: Value },
    Remove { path: String },
}

impl WriteOp {
    pub fn set(path: impl Into<String>, value: impl Into<Value>) -> Self {
        WriteOp::Set {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        WriteOp::Remove { path: path.into() }
    }

    pub fn path(&self) -> &str {
        match self {
            WriteOp::Set { path, .. } | WriteOp::Remove { path } => path,
        }
    }
}

/// Synchronous client for the hierarchical coordination store.
///
/// Paths are `/`-delimited and rooted at `Target`, `Plan`, `Current` or `Sync`.
/// Timeouts and cancellation belong to the implementation and surface as
/// [`crate::Error::Timeout`].
pub trait AgencyStore: Send + Sync {
    /// Read a leaf value or a directory. Non-recursive reads render child
    /// directories as `{}`. `Ok(None)` when the path does not exist.
    fn get(&self, path: &str, recursive: bool) -> Result<Option<Value>>;

    /// Child names, sorted. Recursive listings return descendant paths relative
    /// to `path`; `flat` keeps leaves only, where an empty directory (`{}`)
    /// counts as a leaf.
    fn list(&self, path: &str, recursive: bool, flat: bool) -> Result<Vec<String>>;

    /// Replace the value (or whole subtree) at `path`
    fn set(&self, path: &str, value: Value) -> Result<()>;

    /// Delete `path` and everything below it; deleting a missing path is Ok
    fn remove(&self, path: &str) -> Result<()>;

    /// Whether [`AgencyStore::transact`] applies its writes atomically
    fn supports_transactions(&self) -> bool {
        false
    }

    /// Apply several writes. The default applies them one by one: a reader
    /// between two writes sees the intermediate state, and a failure leaves
    /// the earlier writes in place.
    fn transact(&self, ops: &[WriteOp]) -> Result<()> {
        if ops.len() > 1 {
            tracing::warn!(
                writes = ops.len(),
                first = ops[0].path(),
                "store has no multi-key transactions; applying writes sequentially"
            );
        }
        for op in ops {
            match op {
                WriteOp::Set { path, value } => self.set(path, value.clone())?,
                WriteOp::Remove { path } => self.remove(path)?,
            }
        }
        Ok(())
    }
}

/// Shared store handle, backend picked from [`StoreConfig`]
#[derive(Clone)]
pub struct Storage {
    backend: Arc<dyn AgencyStore>,
}

impl Storage {
    pub fn new_memory() -> Self {
        Self {
            backend: Arc::new(MemStore::new()),
        }
    }

    #[cfg(feature = "sled-backend")]
    pub fn new_sled(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Ok(Self {
            backend: Arc::new(SledStore::open(path)?),
        })
    }

    pub fn from_backend(backend: Arc<dyn AgencyStore>) -> Self {
        Self { backend }
    }

    pub fn open(config: &StoreConfig) -> Result<Self> {
        match config.backend {
            StoreBackend::Memory => Ok(Self::new_memory()),
            #[cfg(feature = "sled-backend")]
            StoreBackend::Sled => {
                let path = config.path.as_ref().ok_or_else(|| {
                    crate::Error::InvalidConfig("store.path is required for sled".into())
                })?;
                Self::new_sled(path)
            }
            #[cfg(not(feature = "sled-backend"))]
            StoreBackend::Sled => Err(crate::Error::InvalidConfig(
                "sled backend requires the `sled-backend` feature".into(),
            )),
        }
    }

    pub fn backend(&self) -> Arc<dyn AgencyStore> {
        self.backend.clone()
    }
}

impl AgencyStore for Storage {
    fn get(&self, path: &str, recursive: bool) -> Result<Option<Value>> {
        self.backend.get(path, recursive)
    }
    fn list(&self, path: &str, recursive: bool, flat: bool) -> Result<Vec<String>> {
        self.backend.list(path, recursive, flat)
    }
    fn set(&self, path: &str, value: Value) -> Result<()> {
        self.backend.set(path, value)
    }
    fn remove(&self, path: &str) -> Result<()> {
        self.backend.remove(path)
    }
    fn supports_transactions(&self) -> bool {
        self.backend.supports_transactions()
    }
    fn transact(&self, ops: &[WriteOp]) -> Result<()> {
        self.backend.transact(ops)
    }
}
