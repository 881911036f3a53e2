//! SyncService: orchestrates the local store, the remote backend and the
//! staging writer for every user-triggered action.
//!
//! Takes port traits via `Arc<dyn Port>` so the same logic runs against
//! Postgres + GraphQL in production and the in-memory doubles in tests.
//!
//! Status transitions start from the *observed* status (local vs remote diff),
//! not the stored one.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::bulk::{run_bulk, BulkItemResult, BulkReport, DEFAULT_BULK_CONCURRENCY};
use crate::error::GovError;
use crate::listing::{build_listing, build_local_listing, ListQuery, ListingData, ListingResponse, Page};
use crate::normalize::{check_allowed_values, entity_from_payload, EntityRef};
use crate::ports::{DeleteOutcome, LocalStore, MetadataBackend, Result};
use crate::proto::{ActionOutcome, SyncAction};
use crate::reconcile::{diff_entities, reconcile, Reconciliation};
use crate::staging::{StageRequest, StageResult, StagingWriter};
use crate::sync_status::{SyncEvent, SyncStatus};
use crate::types::{dedup_owners, Entity, EntityBody, EntityDraft, EntityKind, LocalId};
use crate::urn::Urn;

pub struct SyncService {
    pub local: Arc<dyn LocalStore>,
    pub remote: Arc<dyn MetadataBackend>,
    pub staging: StagingWriter,
    bulk_concurrency: usize,
}

impl SyncService {
    pub fn new(
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn MetadataBackend>,
        staging: StagingWriter,
    ) -> Self {
        Self {
            local,
            remote,
            staging,
            bulk_concurrency: DEFAULT_BULK_CONCURRENCY,
        }
    }

    pub fn with_bulk_concurrency(mut self, n: usize) -> Self {
        self.bulk_concurrency = n.max(1);
        self
    }

    pub fn bulk_concurrency(&self) -> usize {
        self.bulk_concurrency
    }

    // ── Listings ──────────────────────────────────────────────

    /// Local rows with their stored status. Never touches the backend.
    pub async fn local_listing(
        &self,
        kind: EntityKind,
        query: ListQuery,
    ) -> Result<ListingResponse<Page<Entity>>> {
        let rows = self.local.list(kind).await?;
        Ok(build_local_listing(rows, query))
    }

    pub async fn reconciled_listing(
        &self,
        kind: EntityKind,
        query: ListQuery,
    ) -> Result<ListingResponse<ListingData>> {
        Ok(build_listing(self.reconcile(kind).await?, query))
    }

    /// Fetch both sides and reconcile. A backend failure fails the whole call.
    pub async fn reconcile(&self, kind: EntityKind) -> Result<Reconciliation> {
        let (local, remote) = futures::try_join!(self.local.list(kind), self.remote.list(kind))?;
        tracing::debug!(%kind, local = local.len(), remote = remote.len(), "reconciling");
        Ok(reconcile(local, remote))
    }

    // ── Local CRUD ────────────────────────────────────────────

    pub async fn create_local(&self, kind: EntityKind, draft: EntityDraft) -> Result<Entity> {
        check_draft(kind, &draft)?;
        let key = match &draft.body {
            EntityBody::StructuredProperty(p) if !p.qualified_name.trim().is_empty() => {
                p.qualified_name.trim()
            }
            _ => draft.name.trim(),
        };
        let urn = Urn::mint(kind, key)?;
        let entity = Entity {
            urn,
            local_id: None,
            name: draft.name.trim().to_string(),
            description: draft.description,
            owners: dedup_owners(draft.owners),
            body: draft.body,
            sync_status: SyncStatus::LocalOnly,
            last_synced_at: None,
        };
        let created = self.local.insert(&entity).await?;
        tracing::info!(%kind, urn = %created.urn, "created local entity");
        Ok(created)
    }

    /// Edit a local row in place. The URN never changes.
    pub async fn update_local(
        &self,
        kind: EntityKind,
        id: LocalId,
        draft: EntityDraft,
    ) -> Result<Entity> {
        check_draft(kind, &draft)?;
        let mut row = self.require_local(kind, id).await?;
        row.sync_status = row.sync_status.apply(SyncEvent::EditedLocally)?;
        row.name = draft.name.trim().to_string();
        row.description = draft.description;
        row.owners = dedup_owners(draft.owners);
        row.body = draft.body;
        let updated = self.local.update(&row).await?;
        tracing::info!(%kind, urn = %updated.urn, status = %updated.sync_status, "updated local entity");
        Ok(updated)
    }

    // ── Sync actions ──────────────────────────────────────────

    /// Copy the remote entity into the local store.
    pub async fn pull(&self, kind: EntityKind, target: &EntityRef) -> Result<Entity> {
        let urn = self.resolve_urn(kind, target).await?;
        let remote = self.require_remote(kind, &urn).await?;
        let now = Utc::now();

        let saved = match self.local.find_by_urn(kind, &urn).await? {
            Some(mut row) => {
                let next = observed_status(&row, Some(&remote)).apply(SyncEvent::Pulled)?;
                row.overwrite_from(&remote);
                row.sync_status = next;
                row.last_synced_at = Some(now);
                self.local.update(&row).await?
            }
            None => {
                let mut row = remote.clone();
                row.local_id = None;
                row.sync_status = SyncStatus::RemoteOnly.apply(SyncEvent::Pulled)?;
                row.last_synced_at = Some(now);
                self.local.insert(&row).await?
            }
        };
        tracing::info!(%kind, %urn, "pulled entity to local");
        Ok(saved)
    }

    /// Send the local state to the backend (create or update).
    pub async fn push(&self, kind: EntityKind, target: &EntityRef) -> Result<Entity> {
        let mut row = self.resolve_local(kind, target).await?;
        let remote = self.remote.get(kind, &row.urn).await?;
        let next = observed_status(&row, remote.as_ref()).apply(SyncEvent::Pushed)?;

        let urn = self.remote.upsert(&row).await?;
        row.urn = urn;
        row.sync_status = next;
        row.last_synced_at = Some(Utc::now());
        let saved = self.local.update(&row).await?;
        tracing::info!(%kind, urn = %saved.urn, created = remote.is_none(), "pushed entity to backend");
        Ok(saved)
    }

    /// Overwrite the local row from the remote entity.
    pub async fn resync(&self, kind: EntityKind, target: &EntityRef) -> Result<Entity> {
        let mut row = self.resolve_local(kind, target).await?;
        let remote = self.require_remote(kind, &row.urn).await?;
        let next = observed_status(&row, Some(&remote)).apply(SyncEvent::Resynced)?;

        row.overwrite_from(&remote);
        row.sync_status = next;
        row.last_synced_at = Some(Utc::now());
        let saved = self.local.update(&row).await?;
        tracing::info!(%kind, urn = %saved.urn, "resynced entity from backend");
        Ok(saved)
    }

    /// Delete the local row only. The remote entity is untouched.
    pub async fn delete_local(&self, kind: EntityKind, target: &EntityRef) -> Result<DeleteOutcome> {
        let id = match target {
            EntityRef::Local(id) => Some(*id),
            EntityRef::Remote(urn) => {
                check_urn_kind(kind, urn)?;
                self.local
                    .find_by_urn(kind, urn)
                    .await?
                    .and_then(|row| row.local_id)
            }
        };
        let outcome = match id {
            Some(id) => self.local.delete(kind, id).await?,
            None => DeleteOutcome::AlreadyAbsent,
        };
        tracing::info!(%kind, %target, ?outcome, "deleted local entity");
        Ok(outcome)
    }

    /// Delete the remote entity. A linked local row stays and becomes
    /// LOCAL_ONLY.
    pub async fn delete_remote(&self, kind: EntityKind, target: &EntityRef) -> Result<DeleteOutcome> {
        let urn = self.resolve_urn(kind, target).await?;
        let outcome = self.remote.delete(kind, &urn).await?;

        if let Some(mut row) = self.local.find_by_urn(kind, &urn).await? {
            row.sync_status = match row.sync_status {
                SyncStatus::Synced | SyncStatus::Modified => {
                    row.sync_status.apply(SyncEvent::RemoteDeleted)?
                }
                _ => SyncStatus::LocalOnly,
            };
            self.local.update(&row).await?;
        }
        tracing::info!(%kind, %urn, ?outcome, "deleted remote entity");
        Ok(outcome)
    }

    // ── Staging ───────────────────────────────────────────────

    /// Stage a change file. A URN with no local row goes through the remote
    /// entity instead.
    pub async fn stage(
        &self,
        kind: EntityKind,
        target: &EntityRef,
        req: &StageRequest,
    ) -> Result<StageResult> {
        let entity = match target {
            EntityRef::Local(id) => self.require_local(kind, *id).await?,
            EntityRef::Remote(urn) => {
                check_urn_kind(kind, urn)?;
                match self.local.find_by_urn(kind, urn).await? {
                    Some(row) => row,
                    None => {
                        tracing::debug!(%kind, %urn, "no local row, staging remote entity");
                        self.require_remote(kind, urn).await?
                    }
                }
            }
        };
        self.staging.write(&entity, req).await
    }

    /// Stage a raw payload without consulting either store.
    pub async fn stage_payload(
        &self,
        kind: EntityKind,
        payload: &Value,
        req: &StageRequest,
    ) -> Result<StageResult> {
        let entity = entity_from_payload(kind, payload)?;
        self.staging.write(&entity, req).await
    }

    // ── Dispatch ──────────────────────────────────────────────

    /// Run one action against one target.
    pub async fn run_action(
        &self,
        kind: EntityKind,
        action: SyncAction,
        target: &EntityRef,
        stage: Option<&StageRequest>,
    ) -> Result<ActionOutcome> {
        Ok(match action {
            SyncAction::SyncToLocal => ActionOutcome::Entity(self.pull(kind, target).await?),
            SyncAction::SyncToDatahub => ActionOutcome::Entity(self.push(kind, target).await?),
            SyncAction::Resync => ActionOutcome::Entity(self.resync(kind, target).await?),
            SyncAction::Delete => ActionOutcome::Deleted(self.delete_local(kind, target).await?),
            SyncAction::DeleteRemote => {
                ActionOutcome::Deleted(self.delete_remote(kind, target).await?)
            }
            SyncAction::StageChanges => {
                let req = stage.ok_or_else(|| {
                    GovError::InvalidInput("stage_changes requires an environment".into())
                })?;
                ActionOutcome::Staged(self.stage(kind, target, req).await?)
            }
        })
    }

    /// Apply `action` to every id, continuing past failures.
    pub async fn bulk(
        &self,
        kind: EntityKind,
        action: SyncAction,
        ids: Vec<String>,
        stage: Option<StageRequest>,
    ) -> Result<BulkReport> {
        if action == SyncAction::StageChanges && stage.is_none() {
            return Err(GovError::InvalidInput(
                "stage_changes requires an environment".into(),
            ));
        }
        let stage = stage.as_ref();

        // Ids naming the same entity run once; repeats share that result.
        let mut first_by_key: HashMap<String, usize> = HashMap::new();
        let mut unique: Vec<String> = Vec::new();
        let mut slots = Vec::with_capacity(ids.len());
        for id in &ids {
            let key = self.bulk_key(kind, id).await;
            let slot = *first_by_key.entry(key).or_insert_with(|| {
                unique.push(id.clone());
                unique.len() - 1
            });
            slots.push(slot);
        }
        if unique.len() < ids.len() {
            tracing::debug!(%kind, repeats = ids.len() - unique.len(), "bulk targets deduplicated");
        }

        let ran = run_bulk(unique, self.bulk_concurrency, |id: String| async move {
            let target = EntityRef::parse(&id)?;
            self.run_action(kind, action, &target, stage).await
        })
        .await;
        let report = BulkReport::from_results(
            ids.into_iter()
                .zip(slots)
                .map(|(id, slot)| BulkItemResult {
                    target: id,
                    ..ran.results[slot].clone()
                })
                .collect(),
        );
        tracing::info!(
            %kind,
            %action,
            total = report.total,
            failed = report.failed,
            "bulk action finished"
        );
        Ok(report)
    }

    // ── Resolution helpers ────────────────────────────────────

    /// Identity of a bulk target: the URN when it can be resolved, so a
    /// local id and its URN collapse to one key.
    async fn bulk_key(&self, kind: EntityKind, id: &str) -> String {
        match EntityRef::parse(id) {
            Ok(EntityRef::Remote(urn)) => urn.to_string(),
            Ok(EntityRef::Local(local_id)) => match self.local.get(kind, local_id).await {
                Ok(Some(row)) => row.urn.to_string(),
                _ => format!("local:{local_id}"),
            },
            Err(_) => format!("raw:{}", id.trim()),
        }
    }

    async fn require_local(&self, kind: EntityKind, id: LocalId) -> Result<Entity> {
        self.local
            .get(kind, id)
            .await?
            .ok_or_else(|| GovError::NotFound(format!("local {kind} {id}")))
    }

    async fn require_remote(&self, kind: EntityKind, urn: &Urn) -> Result<Entity> {
        self.remote
            .get(kind, urn)
            .await?
            .ok_or_else(|| GovError::NotFound(format!("remote {kind} {urn}")))
    }

    /// The local row a target points at.
    pub async fn resolve_local(&self, kind: EntityKind, target: &EntityRef) -> Result<Entity> {
        match target {
            EntityRef::Local(id) => self.require_local(kind, *id).await,
            EntityRef::Remote(urn) => {
                check_urn_kind(kind, urn)?;
                self.local
                    .find_by_urn(kind, urn)
                    .await?
                    .ok_or_else(|| GovError::NotFound(format!("local {kind} {urn}")))
            }
        }
    }

    /// The URN a target points at. Local ids are looked up.
    pub async fn resolve_urn(&self, kind: EntityKind, target: &EntityRef) -> Result<Urn> {
        match target {
            EntityRef::Remote(urn) => {
                check_urn_kind(kind, urn)?;
                Ok(urn.clone())
            }
            EntityRef::Local(id) => Ok(self.require_local(kind, *id).await?.urn),
        }
    }
}

/// Status as it actually is right now, from comparing both sides.
fn observed_status(local: &Entity, remote: Option<&Entity>) -> SyncStatus {
    match remote {
        None => SyncStatus::LocalOnly,
        Some(r) if diff_entities(local, r).is_empty() => SyncStatus::Synced,
        Some(_) => SyncStatus::Modified,
    }
}

fn check_urn_kind(kind: EntityKind, urn: &Urn) -> Result<()> {
    match urn.kind() {
        Some(k) if k != kind => Err(GovError::InvalidInput(format!(
            "urn {urn} is a {k}, expected {kind}"
        ))),
        _ => Ok(()),
    }
}

fn check_draft(kind: EntityKind, draft: &EntityDraft) -> Result<()> {
    if draft.body.kind() != kind {
        return Err(GovError::InvalidInput(format!(
            "body is a {}, expected {kind}",
            draft.body.kind()
        )));
    }
    if draft.name.trim().is_empty() {
        return Err(GovError::InvalidInput("name is required".into()));
    }
    if let EntityBody::StructuredProperty(p) = &draft.body {
        check_allowed_values(&p.allowed_values)?;
    }
    Ok(())
}
