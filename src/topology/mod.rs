//! Cluster topology views over the agency
//!
//! - `paths`: namespace/entity → store path
//! - `roster`: DBServers and Coordinators per namespace
//! - `databases`: databases, collections, shard responsibility
//! - `heartbeat`: liveness classification from `Sync`
//! - `diff`: Target against Plan/Current, Plan against Current shard placement
//! - `facade`: the [`Agency`] entry point

pub mod databases;
pub mod diff;
pub mod facade;
pub mod heartbeat;
pub mod paths;
pub mod roster;

pub use databases::{Collection, CollectionRecord, Database, Databases, ShardOwner};
pub use diff::{
    DiffEngine, DiffReport, DiffResult, Divergence, MissingEntry, PartialRecord, ShardDistribution,
    ShardPlacement, TierDiff,
};
pub use facade::Agency;
pub use heartbeat::{HeartbeatRecord, Heartbeats, ServerStatus};
pub use paths::{EntityClass, Namespace};
pub use roster::{Coordinators, DBServers, Role, RoleKind, Roster, RosterViolation, ServerInfo};
