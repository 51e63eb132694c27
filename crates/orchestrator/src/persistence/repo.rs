#![forbid(unsafe_code)]

use crate::error::Error;
use crate::persistence::{EdgeRecord, HistorySnapshot, KeyValueStore, SnapshotMeta, StoresSnapshot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[async_trait]
pub trait StateRepository: Send + Sync {
    /// Load the last saved snapshot. `None` means nothing was saved yet.
    async fn load(&self) -> Result<Option<StoresSnapshot>, Error>;
    /// Persist a snapshot, replacing the previous one.
    async fn save(&self, snapshot: &StoresSnapshot) -> Result<(), Error>;
}

#[derive(Debug, Default)]
pub struct NoopRepository;

#[async_trait]
impl StateRepository for NoopRepository {
    async fn load(&self) -> Result<Option<StoresSnapshot>, Error> {
        Ok(None)
    }

    async fn save(&self, _snapshot: &StoresSnapshot) -> Result<(), Error> {
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct TransitionsDocument {
    meta: SnapshotMeta,
    edges: Vec<EdgeRecord>,
}

/// Stores a snapshot as two JSON documents: the transition graph and the
/// scorer history.
#[derive(Debug)]
pub struct KeyValueRepository<S> {
    store: S,
}

impl<S: KeyValueStore> KeyValueRepository<S> {
    pub const TRANSITIONS_KEY: &'static str = "prefetch.transitions";
    pub const HISTORY_KEY: &'static str = "prefetch.history";

    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Drop any saved state.
    pub async fn clear(&self) -> Result<(), Error> {
        self.store.remove(Self::TRANSITIONS_KEY).await?;
        self.store.remove(Self::HISTORY_KEY).await
    }
}

#[async_trait]
impl<S: KeyValueStore> StateRepository for KeyValueRepository<S> {
    async fn load(&self) -> Result<Option<StoresSnapshot>, Error> {
        let Some(transitions) = self.store.get(Self::TRANSITIONS_KEY).await? else {
            return Ok(None);
        };
        let transitions: TransitionsDocument = serde_json::from_str(&transitions)?;
        let history = match self.store.get(Self::HISTORY_KEY).await? {
            Some(history) => serde_json::from_str(&history)?,
            None => HistorySnapshot::default(),
        };
        debug!(
            edges = transitions.edges.len(),
            events = history.events.len(),
            "snapshot loaded"
        );
        Ok(Some(StoresSnapshot {
            meta: transitions.meta,
            transitions: transitions.edges,
            history,
        }))
    }

    async fn save(&self, snapshot: &StoresSnapshot) -> Result<(), Error> {
        let transitions = serde_json::to_string(&TransitionsDocument {
            meta: snapshot.meta.clone(),
            edges: snapshot.transitions.clone(),
        })?;
        let history = serde_json::to_string(&snapshot.history)?;
        self.store
            .set_many(&[
                (Self::TRANSITIONS_KEY, transitions.as_str()),
                (Self::HISTORY_KEY, history.as_str()),
            ])
            .await?;
        debug!(edges = snapshot.transitions.len(), "snapshot persisted");
        Ok(())
    }
}

#[async_trait]
impl<T: StateRepository + ?Sized> StateRepository for std::sync::Arc<T> {
    async fn load(&self) -> Result<Option<StoresSnapshot>, Error> {
        (**self).load().await
    }

    async fn save(&self, snapshot: &StoresSnapshot) -> Result<(), Error> {
        (**self).save(snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{MemoryStore, SNAPSHOT_SCHEMA_VERSION};
    use crate::domain::Route;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn snapshot() -> StoresSnapshot {
        StoresSnapshot {
            meta: SnapshotMeta {
                schema_version: SNAPSHOT_SCHEMA_VERSION,
                created_at_ms: 7,
            },
            transitions: vec![EdgeRecord {
                from: Route::new("/a"),
                to: Route::new("/b"),
                weight: 0.3,
            }],
            history: HistorySnapshot {
                total_observed: 1,
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn empty_store_is_a_cold_start() {
        let repo = KeyValueRepository::new(MemoryStore::default());
        assert!(repo.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_returns_the_snapshot() {
        let repo = KeyValueRepository::new(MemoryStore::default());
        repo.save(&snapshot()).await.unwrap();
        assert_eq!(repo.load().await.unwrap(), Some(snapshot()));

        let raw = repo
            .store()
            .get(KeyValueRepository::<MemoryStore>::TRANSITIONS_KEY)
            .await
            .unwrap()
            .unwrap();
        assert!(raw.contains("\"/a\""));

        repo.clear().await.unwrap();
        assert!(repo.load().await.unwrap().is_none());
    }

    /// Accepts a limited number of key writes, then fails.
    #[derive(Default)]
    struct WearingStore {
        inner: MemoryStore,
        writes_left: AtomicUsize,
    }

    impl WearingStore {
        fn take(&self, writes: usize) -> Result<(), Error> {
            self.writes_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(writes))
                .map(drop)
                .map_err(|_| Error::Store("disk full".into()))
        }
    }

    #[async_trait]
    impl KeyValueStore for WearingStore {
        async fn get(&self, key: &str) -> Result<Option<String>, Error> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
            self.take(1)?;
            self.inner.set(key, value).await
        }

        async fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), Error> {
            self.take(entries.len())?;
            self.inner.set_many(entries).await
        }

        async fn remove(&self, key: &str) -> Result<(), Error> {
            self.inner.remove(key).await
        }
    }

    #[tokio::test]
    async fn failed_save_keeps_the_previous_snapshot_whole() {
        let repo = KeyValueRepository::new(WearingStore::default());
        repo.store().writes_left.store(2, Ordering::SeqCst);
        repo.save(&snapshot()).await.unwrap();

        let mut newer = snapshot();
        newer.meta.created_at_ms = 99;
        newer.transitions.clear();
        newer.history.total_observed = 42;
        repo.store().writes_left.store(1, Ordering::SeqCst);
        assert!(repo.save(&newer).await.is_err());

        assert_eq!(repo.load().await.unwrap(), Some(snapshot()));
    }

    #[tokio::test]
    async fn corrupt_documents_surface_as_errors() {
        let store = MemoryStore::default();
        store
            .set(KeyValueRepository::<MemoryStore>::TRANSITIONS_KEY, "{not json")
            .await
            .unwrap();
        let repo = KeyValueRepository::new(store);
        assert!(matches!(repo.load().await, Err(Error::Snapshot(_))));
    }
}
