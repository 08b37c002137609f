//! Error types for clustertopo

use crate::topology::paths::Namespace;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === Store Errors ===
    #[error("Store {op} failed on {path}: {reason}")]
    Store {
        op: &'static str,
        path: String,
        reason: String,
    },

    #[error("Store timeout on {path}")]
    Timeout { path: String },

    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Malformed value at {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[cfg(feature = "sled-backend")]
    #[error("Sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Registry Errors ===
    #[error("Server not registered: {0}")]
    Unregistered(String),

    #[error("Invalid endpoint for {server}: {endpoint}")]
    InvalidEndpoint { server: String, endpoint: String },

    // === Topology Errors ===
    #[error("Shard {shard} not found in collection {collection}")]
    ShardNotFound { collection: String, shard: String },

    #[error("Namespace {0} is read-only")]
    ReadOnly(Namespace),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl Error {
    /// Store failure on `path` during `op`
    pub fn store(op: &'static str, path: impl Into<String>, reason: impl ToString) -> Self {
        Error::Store {
            op,
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Value at `path` could not be decoded
    pub fn malformed(path: impl Into<String>, reason: impl ToString) -> Self {
        Error::Malformed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Is this a retryable error?
    ///
    /// Only a hint for callers; nothing in this crate retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Store { .. } | Error::Timeout { .. } => true,
            #[cfg(feature = "sled-backend")]
            Error::Sled(_) => true,
            _ => false,
        }
    }

    /// Failed store path, when the error carries one
    pub fn path(&self) -> Option<&str> {
        match self {
            Error::Store { path, .. } | Error::Timeout { path } | Error::Malformed { path, .. } => {
                Some(path)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::store("get", "Target/DBServers", "connection reset").is_retryable());
        assert!(Error::Timeout {
            path: "Plan/DBServers".into()
        }
        .is_retryable());
        assert!(!Error::Unregistered("pavel".into()).is_retryable());
        assert!(!Error::ReadOnly(Namespace::Plan).is_retryable());
    }

    #[test]
    fn test_error_carries_path() {
        let err = Error::store("set", "Target/DBServers/pavel", "refused");
        assert_eq!(err.path(), Some("Target/DBServers/pavel"));
        assert_eq!(
            err.to_string(),
            "Store set failed on Target/DBServers/pavel: refused"
        );
        assert_eq!(Error::InvalidConfig("x".into()).path(), None);
    }
}
