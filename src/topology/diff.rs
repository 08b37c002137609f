//! Divergence between Target and Plan/Current rosters
//!
//! Target is ground truth: entries only present on the other side are not
//! reported.

use crate::common::Result;
use crate::store::{AgencyStore, ServerRegistry};
use crate::topology::databases::{CollectionRecord, Databases, ShardOwner};
use crate::topology::paths::Namespace;
use crate::topology::roster::{Coordinators, DBServers, Role, RoleKind, Roster};
use serde::Serialize;
use std::collections::BTreeMap;

/// Target entry absent from the compared namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingEntry {
    pub id: String,
    #[serde(flatten)]
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

/// The facets of one side that differ; `secondary: Some(None)` means "no secondary"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartialRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<RoleKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<Option<String>>,
}

impl PartialRecord {
    fn is_empty(&self) -> bool {
        self.role.is_none() && self.secondary.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Divergence {
    pub target: PartialRecord,
    pub other: PartialRecord,
}

/// Result of one comparison, computed fresh per call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub missing: Vec<MissingEntry>,
    pub difference: BTreeMap<String, Divergence>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.difference.is_empty()
    }
}

/// Both roster classes compared against one namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffReport {
    pub against: Namespace,
    #[serde(rename = "DBServers")]
    pub db_servers: DiffResult,
    #[serde(rename = "Coordinators")]
    pub coordinators: DiffResult,
}

impl DiffReport {
    pub fn is_converged(&self) -> bool {
        self.db_servers.is_empty() && self.coordinators.is_empty()
    }
}

/// Leader and followers of one shard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShardPlacement {
    pub leader: Option<String>,
    pub followers: Vec<String>,
}

impl From<&ShardOwner> for ShardPlacement {
    fn from(owner: &ShardOwner) -> Self {
        match owner.replicas().split_first() {
            Some((leader, followers)) => ShardPlacement {
                leader: Some(leader.clone()),
                followers: followers.to_vec(),
            },
            None => ShardPlacement::default(),
        }
    }
}

/// Planned and reported placement of every planned shard of one collection.
///
/// A shard with no `Current` entry shows up with an empty placement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShardDistribution {
    #[serde(rename = "Plan")]
    pub plan: BTreeMap<String, ShardPlacement>,
    #[serde(rename = "Current")]
    pub current: BTreeMap<String, ShardPlacement>,
}

impl ShardDistribution {
    fn compare(plan: &CollectionRecord, current: Option<&CollectionRecord>) -> Self {
        let mut dist = ShardDistribution::default();
        for (shard, owner) in &plan.shards {
            let reported = current
                .and_then(|record| record.shards.get(shard))
                .map(ShardPlacement::from)
                .unwrap_or_default();
            dist.plan.insert(shard.clone(), owner.into());
            dist.current.insert(shard.clone(), reported);
        }
        dist
    }

    /// Shards whose reported placement differs from the plan, sorted
    pub fn diverging(&self) -> Vec<String> {
        self.plan
            .iter()
            .filter(|(shard, planned)| self.current.get(*shard) != Some(*planned))
            .map(|(shard, _)| shard.clone())
            .collect()
    }

    pub fn is_converged(&self) -> bool {
        self.diverging().is_empty()
    }
}

fn divergence(target: &Role, other: &Role) -> Option<Divergence> {
    let mut t = PartialRecord::default();
    let mut o = PartialRecord::default();
    if target.kind() != other.kind() {
        t.role = Some(target.kind());
        o.role = Some(other.kind());
    }
    if target.secondary() != other.secondary() {
        t.secondary = Some(target.secondary().map(str::to_string));
        o.secondary = Some(other.secondary().map(str::to_string));
    }
    (!t.is_empty()).then_some(Divergence {
        target: t,
        other: o,
    })
}

/// Compare two materialized rosters.
///
/// Missing entries are sorted by id and carry `address`/`protocol` when the
/// registry resolves them.
pub fn diff_rosters(
    target: &Roster,
    other: &Roster,
    registry: &dyn ServerRegistry,
) -> Result<DiffResult> {
    let mut result = DiffResult::default();
    for (id, role) in target {
        match other.get(id) {
            None => {
                let endpoint = registry.try_resolve(id)?;
                result.missing.push(MissingEntry {
                    id: id.clone(),
                    role: role.clone(),
                    address: endpoint.as_ref().map(|e| e.address.clone()),
                    protocol: endpoint.map(|e| e.protocol),
                });
            }
            Some(other_role) => {
                if let Some(d) = divergence(role, other_role) {
                    result.difference.insert(id.clone(), d);
                }
            }
        }
    }
    Ok(result)
}

/// Diff entry point bound to a store and registry
#[derive(Clone, Copy)]
pub struct DiffEngine<'a> {
    store: &'a dyn AgencyStore,
    registry: &'a dyn ServerRegistry,
}

impl<'a> DiffEngine<'a> {
    pub fn new(store: &'a dyn AgencyStore, registry: &'a dyn ServerRegistry) -> Self {
        Self { store, registry }
    }

    pub fn db_servers(&self, against: Namespace) -> Result<DiffResult> {
        let target = DBServers::new(self.store, Namespace::Target).get_list()?;
        let other = DBServers::new(self.store, against).get_list()?;
        let result = diff_rosters(&target, &other, self.registry)?;
        tracing::debug!(
            %against,
            missing = result.missing.len(),
            differing = result.difference.len(),
            "diffed db servers"
        );
        Ok(result)
    }

    pub fn coordinators(&self, against: Namespace) -> Result<DiffResult> {
        let target = Coordinators::new(self.store, Namespace::Target).get_list()?;
        let other = Coordinators::new(self.store, against).get_list()?;
        let result = diff_rosters(&target, &other, self.registry)?;
        tracing::debug!(
            %against,
            missing = result.missing.len(),
            differing = result.difference.len(),
            "diffed coordinators"
        );
        Ok(result)
    }

    pub fn report(&self, against: Namespace) -> Result<DiffReport> {
        Ok(DiffReport {
            against,
            db_servers: self.db_servers(against)?,
            coordinators: self.coordinators(against)?,
        })
    }

    /// Plan vs Current shard placement of every collection in `database`,
    /// keyed by collection name. `None` when the database is not planned.
    pub fn shard_distribution(
        &self,
        database: &str,
    ) -> Result<Option<BTreeMap<String, ShardDistribution>>> {
        let Some(planned) = Databases::new(self.store, Namespace::Plan).select(database)? else {
            return Ok(None);
        };
        let reported = match Databases::new(self.store, Namespace::Current).select(database)? {
            Some(db) => db.collection_records()?,
            None => BTreeMap::new(),
        };

        let mut result = BTreeMap::new();
        for (id, record) in planned.collection_records()? {
            let dist = ShardDistribution::compare(&record, reported.get(&id));
            let diverging = dist.diverging();
            if !diverging.is_empty() {
                tracing::debug!(
                    database,
                    collection = %record.name,
                    ?diverging,
                    "shard placement differs from plan"
                );
            }
            result.insert(record.name, dist);
        }
        Ok(Some(result))
    }

    /// Target vs Plan
    pub fn plan(self) -> TierDiff<'a> {
        TierDiff {
            engine: self,
            against: Namespace::Plan,
        }
    }

    /// Target vs Current
    pub fn current(self) -> TierDiff<'a> {
        TierDiff {
            engine: self,
            against: Namespace::Current,
        }
    }
}

/// Diffs of Target against one fixed namespace
#[derive(Clone, Copy)]
pub struct TierDiff<'a> {
    engine: DiffEngine<'a>,
    against: Namespace,
}

impl TierDiff<'_> {
    pub fn db_servers(&self) -> Result<DiffResult> {
        self.engine.db_servers(self.against)
    }

    pub fn coordinators(&self) -> Result<DiffResult> {
        self.engine.coordinators(self.against)
    }

    pub fn report(&self) -> Result<DiffReport> {
        self.engine.report(self.against)
    }
}
