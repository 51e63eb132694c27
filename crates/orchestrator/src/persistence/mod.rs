#![forbid(unsafe_code)]

mod repo;
mod store;

pub use repo::{KeyValueRepository, NoopRepository, StateRepository};
pub use store::{KeyValueStore, MemoryStore, SqliteStore};

use crate::domain::{NavigationEvent, Route};
use crate::error::Error;
use crate::stores::Stores;
use config::Model;
use serde::{Deserialize, Serialize};

pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub schema_version: u32,
    pub created_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub from: Route,
    pub to: Route,
    pub weight: f32,
}

/// Scorer history: the rolling navigation window plus the per-route
/// counters derived from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub events: Vec<NavigationEvent>,
    pub total_observed: u64,
    pub interactions: Vec<(Route, u32)>,
    pub hourly: Vec<(Route, [u32; 24])>,
}

/// Everything needed to rebuild [`Stores`] after a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoresSnapshot {
    pub meta: SnapshotMeta,
    pub transitions: Vec<EdgeRecord>,
    pub history: HistorySnapshot,
}

impl StoresSnapshot {
    pub fn from_stores(stores: &Stores, created_at_ms: u64) -> Self {
        let mut transitions: Vec<EdgeRecord> = stores
            .transitions
            .iter()
            .map(|(from, to, weight)| EdgeRecord {
                from: from.clone(),
                to: to.clone(),
                weight,
            })
            .collect();
        transitions.sort_by(|a, b| a.from.cmp(&b.from).then_with(|| a.to.cmp(&b.to)));

        let mut interactions: Vec<(Route, u32)> = stores
            .interactions
            .iter()
            .map(|(route, count)| (route.clone(), count))
            .collect();
        interactions.sort();

        let mut hourly: Vec<(Route, [u32; 24])> = stores
            .history
            .hourly()
            .map(|(route, hours)| (route.clone(), *hours))
            .collect();
        hourly.sort();

        Self {
            meta: SnapshotMeta {
                schema_version: SNAPSHOT_SCHEMA_VERSION,
                created_at_ms,
            },
            transitions,
            history: HistorySnapshot {
                events: stores.history.events().cloned().collect(),
                total_observed: stores.history.total_observed(),
                interactions,
                hourly,
            },
        }
    }

    /// Rebuild stores. Edges that could never have been learned (self
    /// loops, non-positive or non-finite weights) are dropped.
    pub fn into_stores(self, model: &Model) -> Result<Stores, Error> {
        if self.meta.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(Error::SchemaMismatch {
                found: self.meta.schema_version,
                expected: SNAPSHOT_SCHEMA_VERSION,
            });
        }

        let mut stores = Stores::new(model);
        for edge in self.transitions {
            stores.transitions.set_weight(edge.from, edge.to, edge.weight);
        }
        stores.history.restore(
            self.history.events,
            self.history.total_observed,
            self.history.hourly,
        );
        stores.interactions.restore(self.history.interactions);
        Ok(stores)
    }
}
