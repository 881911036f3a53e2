//! Request/response types shared by `SyncService` and the HTTP layer.

use serde::{Deserialize, Serialize};

use crate::bulk::BulkReport;
use crate::ports::DeleteOutcome;
use crate::staging::{StageAction, StageRequest, StageResult};
use crate::types::Entity;

// ── Actions ───────────────────────────────────────────────────

/// User-triggered action on one entity. The string form is the URL segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    SyncToLocal,
    SyncToDatahub,
    Resync,
    Delete,
    DeleteRemote,
    StageChanges,
}

impl SyncAction {
    pub const ALL: [SyncAction; 6] = [
        Self::SyncToLocal,
        Self::SyncToDatahub,
        Self::Resync,
        Self::Delete,
        Self::DeleteRemote,
        Self::StageChanges,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SyncToLocal => "sync_to_local",
            Self::SyncToDatahub => "sync_to_datahub",
            Self::Resync => "resync",
            Self::Delete => "delete",
            Self::DeleteRemote => "delete_remote",
            Self::StageChanges => "stage_changes",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == s)
    }
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a single action produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ActionOutcome {
    Entity(Entity),
    Deleted(DeleteOutcome),
    Staged(StageResult),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Entity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub outcome: DeleteOutcome,
    pub message: String,
}

// ── Staging ───────────────────────────────────────────────────

/// Body of `POST /{kind}/remote/stage_changes/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagePayloadRequest {
    #[serde(flatten)]
    pub stage: StageRequest,
    /// Raw entity payload in any of the accepted shapes.
    pub entity: serde_json::Value,
}

// ── Bulk ──────────────────────────────────────────────────────

/// Body of `POST /{kind}/bulk/{action}/`. `ids` holds database ids or URNs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkRequest {
    pub ids: Vec<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub mutation: Option<String>,
    #[serde(default)]
    pub stage_action: StageAction,
}

impl BulkRequest {
    pub fn stage_request(&self) -> Option<StageRequest> {
        self.environment.as_ref().map(|env| StageRequest {
            environment: env.clone(),
            mutation: self.mutation.clone(),
            action: self.stage_action,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkResponse {
    pub success: bool,
    pub action: SyncAction,
    #[serde(flatten)]
    pub report: BulkReport,
}

// ── Health ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
