//! # clustertopo
//!
//! Cluster topology reconciliation over a hierarchical coordination store:
//! - `Target`: desired topology, written through this crate
//! - `Plan`: topology scheduled for rollout (read-only here)
//! - `Current`: topology reported by running servers (read-only here)
//! - `Sync`: heartbeats and liveness
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │                 Agency                   │
//! │  mutators (Target) · views · diff engine │
//! └───────┬───────────────┬──────────────────┘
//!         │               │
//! ┌───────▼──────┐ ┌──────▼─────────┐
//! │ AgencyStore  │ │ ServerRegistry │
//! │ get/list/set │ │ id → endpoint  │
//! │ /remove      │ │                │
//! └──────────────┘ └────────────────┘
//! ```
//!
//! The store and registry are external; [`store::MemStore`] and, behind the
//! `sled-backend` feature, `store::SledStore` are provided for embedding and
//! tests.
//!
//! ## Usage
//!
//! ```
//! use clustertopo::{Agency, Namespace};
//! use clustertopo::store::{MemStore, StaticRegistry};
//! use std::sync::Arc;
//!
//! let registry = StaticRegistry::new().with("pavel", "tcp://10.0.0.1:8629");
//! let agency = Agency::new(Arc::new(MemStore::new()), Arc::new(registry));
//!
//! agency.add_pair("pavel", "sandro")?;
//! let roster = agency.db_servers(Namespace::Target).get_list()?;
//! assert_eq!(roster.len(), 2);
//!
//! let missing = agency.diff_plan().db_servers()?.missing;
//! assert_eq!(missing[0].address.as_deref(), Some("10.0.0.1:8629"));
//! # Ok::<(), clustertopo::Error>(())
//! ```

pub mod common;
pub mod store;
pub mod topology;

// Re-export commonly used types
pub use common::{Config, Error, Result};
pub use store::{AgencyStore, ServerRegistry};
pub use topology::{Agency, Namespace};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
