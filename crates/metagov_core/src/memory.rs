//! In-memory port implementations.
//!
//! `InMemoryLocalStore` backs the server when no database is configured.
//! `InMemoryBackend` stands in for the governance server in tests and can be
//! told to fail for specific URNs.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{BackendError, GovError};
use crate::ports::{DeleteOutcome, LocalStore, MetadataBackend, Result};
use crate::sync_status::SyncStatus;
use crate::types::{Entity, EntityKind, LocalId};
use crate::urn::Urn;

// ── Local store ───────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryLocalStore {
    inner: RwLock<LocalTables>,
}

#[derive(Default)]
struct LocalTables {
    next_id: i64,
    rows: BTreeMap<(EntityKind, LocalId), Entity>,
}

impl InMemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalStore for InMemoryLocalStore {
    async fn list(&self, kind: EntityKind) -> Result<Vec<Entity>> {
        let tables = self.inner.read().await;
        Ok(tables
            .rows
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, e)| e.clone())
            .collect())
    }

    async fn get(&self, kind: EntityKind, id: LocalId) -> Result<Option<Entity>> {
        Ok(self.inner.read().await.rows.get(&(kind, id)).cloned())
    }

    async fn find_by_urn(&self, kind: EntityKind, urn: &Urn) -> Result<Option<Entity>> {
        let tables = self.inner.read().await;
        Ok(tables
            .rows
            .iter()
            .find(|((k, _), e)| *k == kind && &e.urn == urn)
            .map(|(_, e)| e.clone()))
    }

    async fn insert(&self, entity: &Entity) -> Result<Entity> {
        let mut tables = self.inner.write().await;
        let kind = entity.kind();
        if tables
            .rows
            .iter()
            .any(|((k, _), e)| *k == kind && e.urn == entity.urn)
        {
            return Err(GovError::Conflict(format!("{kind} {} already exists", entity.urn)));
        }
        tables.next_id += 1;
        let id = LocalId(tables.next_id);
        let mut row = entity.clone();
        row.local_id = Some(id);
        if row.sync_status == SyncStatus::RemoteOnly {
            row.sync_status = SyncStatus::LocalOnly;
        }
        tables.rows.insert((kind, id), row.clone());
        Ok(row)
    }

    async fn update(&self, entity: &Entity) -> Result<Entity> {
        let id = entity
            .local_id
            .ok_or_else(|| GovError::MissingId(format!("update of {} without id", entity.urn)))?;
        let kind = entity.kind();
        let mut tables = self.inner.write().await;
        if tables
            .rows
            .iter()
            .any(|((k, other_id), e)| *k == kind && *other_id != id && e.urn == entity.urn)
        {
            return Err(GovError::Conflict(format!("{kind} {} already exists", entity.urn)));
        }
        match tables.rows.get_mut(&(kind, id)) {
            Some(row) => {
                *row = entity.clone();
                Ok(row.clone())
            }
            None => Err(GovError::NotFound(format!("{kind} {id}"))),
        }
    }

    async fn delete(&self, kind: EntityKind, id: LocalId) -> Result<DeleteOutcome> {
        Ok(match self.inner.write().await.rows.remove(&(kind, id)) {
            Some(_) => DeleteOutcome::Deleted,
            None => DeleteOutcome::AlreadyAbsent,
        })
    }
}

// ── Backend ───────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryBackend {
    entities: RwLock<BTreeMap<Urn, Entity>>,
    failing: RwLock<HashSet<Urn>>,
    unavailable: RwLock<bool>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with remote records.
    pub fn with_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        let map = entities
            .into_iter()
            .map(|mut e| {
                e.local_id = None;
                e.sync_status = SyncStatus::RemoteOnly;
                (e.urn.clone(), e)
            })
            .collect();
        Self {
            entities: RwLock::new(map),
            ..Self::default()
        }
    }

    /// Make every call touching `urn` fail with a backend error.
    pub async fn fail_on(&self, urn: Urn) {
        self.failing.write().await.insert(urn);
    }

    /// Make every call fail, as if the server were down.
    pub async fn set_unavailable(&self, down: bool) {
        *self.unavailable.write().await = down;
    }

    pub async fn snapshot(&self) -> Vec<Entity> {
        self.entities.read().await.values().cloned().collect()
    }

    async fn check(&self, urn: Option<&Urn>) -> Result<()> {
        if *self.unavailable.read().await {
            return Err(BackendError::Transport("connection refused".into()).into());
        }
        if let Some(urn) = urn {
            if self.failing.read().await.contains(urn) {
                return Err(BackendError::Http {
                    status: 500,
                    body: format!("failure injected for {urn}"),
                }
                .into());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataBackend for InMemoryBackend {
    async fn list(&self, kind: EntityKind) -> Result<Vec<Entity>> {
        self.check(None).await?;
        Ok(self
            .entities
            .read()
            .await
            .values()
            .filter(|e| e.kind() == kind)
            .cloned()
            .collect())
    }

    async fn get(&self, kind: EntityKind, urn: &Urn) -> Result<Option<Entity>> {
        self.check(Some(urn)).await?;
        Ok(self
            .entities
            .read()
            .await
            .get(urn)
            .filter(|e| e.kind() == kind)
            .cloned())
    }

    async fn upsert(&self, entity: &Entity) -> Result<Urn> {
        self.check(Some(&entity.urn)).await?;
        let mut remote = entity.clone();
        remote.local_id = None;
        remote.sync_status = SyncStatus::RemoteOnly;
        remote.last_synced_at = None;
        self.entities
            .write()
            .await
            .insert(entity.urn.clone(), remote);
        Ok(entity.urn.clone())
    }

    async fn delete(&self, _kind: EntityKind, urn: &Urn) -> Result<DeleteOutcome> {
        self.check(Some(urn)).await?;
        Ok(match self.entities.write().await.remove(urn) {
            Some(_) => DeleteOutcome::Deleted,
            None => DeleteOutcome::AlreadyAbsent,
        })
    }
}
