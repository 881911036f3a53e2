//! POST /{kind}/{id-or-urn}/{action}/

use std::sync::Arc;

use axum::extract::Path;
use axum::{Extension, Json};
use metagov_core::error::GovError;
use metagov_core::normalize::EntityRef;
use metagov_core::ports::DeleteOutcome;
use metagov_core::proto::{ActionOutcome, ActionResponse, DeleteResponse, SyncAction};
use metagov_core::service::SyncService;
use metagov_core::staging::StageRequest;
use serde_json::Value;

use super::parse_kind;
use crate::error::AppError;

pub async fn run_action(
    Extension(service): Extension<Arc<SyncService>>,
    Path((kind, id, action)): Path<(String, String, String)>,
    body: Option<Json<StageRequest>>,
) -> Result<Json<Value>, AppError> {
    let kind = parse_kind(&kind)?;
    let action = SyncAction::parse(&action)
        .ok_or_else(|| GovError::NotFound(format!("unknown action {action:?}")))?;
    let target = EntityRef::parse(&id)?;
    let stage = body.map(|Json(req)| req);

    tracing::debug!(%kind, %action, %target, "running action");
    let outcome = service
        .run_action(kind, action, &target, stage.as_ref())
        .await?;

    let json = match outcome {
        ActionOutcome::Entity(entity) => serde_json::to_value(ActionResponse {
            success: true,
            message: action_message(action, entity.display_name()),
            data: Some(entity),
        })?,
        ActionOutcome::Deleted(outcome) => serde_json::to_value(DeleteResponse {
            success: true,
            outcome,
            message: match outcome {
                DeleteOutcome::Deleted => format!("Deleted {target}"),
                DeleteOutcome::AlreadyAbsent => format!("{target} was already absent"),
            },
        })?,
        ActionOutcome::Staged(result) => serde_json::to_value(result)?,
    };
    Ok(Json(json))
}

fn action_message(action: SyncAction, name: &str) -> String {
    match action {
        SyncAction::SyncToLocal => format!("Pulled {name} to local"),
        SyncAction::SyncToDatahub => format!("Pushed {name} to DataHub"),
        SyncAction::Resync => format!("Resynced {name} from DataHub"),
        _ => format!("{action} applied to {name}"),
    }
}
