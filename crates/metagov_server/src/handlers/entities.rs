//! POST /{kind}/create/ and POST /{kind}/{id}/update/

use std::sync::Arc;

use axum::extract::Path;
use axum::{Extension, Json};
use metagov_core::error::GovError;
use metagov_core::normalize::EntityRef;
use metagov_core::proto::ActionResponse;
use metagov_core::service::SyncService;
use metagov_core::types::{EntityDraft, EntityKind};
use serde_json::Value;

use super::parse_kind;
use crate::error::AppError;

/// The kind comes from the path; a body may omit it.
fn draft_from_json(kind: EntityKind, mut body: Value) -> Result<EntityDraft, GovError> {
    let obj = body
        .as_object_mut()
        .ok_or_else(|| GovError::InvalidInput("expected a JSON object".into()))?;
    obj.entry("kind")
        .or_insert_with(|| Value::String(kind.as_str().to_string()));
    serde_json::from_value(body).map_err(|e| GovError::InvalidInput(e.to_string()))
}

pub async fn create(
    Extension(service): Extension<Arc<SyncService>>,
    Path(kind): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<ActionResponse>, AppError> {
    let kind = parse_kind(&kind)?;
    let draft = draft_from_json(kind, body)?;
    let entity = service.create_local(kind, draft).await?;
    Ok(Json(ActionResponse {
        success: true,
        message: format!("Created {} {}", kind, entity.display_name()),
        data: Some(entity),
    }))
}

pub async fn update(
    Extension(service): Extension<Arc<SyncService>>,
    Path((kind, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<ActionResponse>, AppError> {
    let kind = parse_kind(&kind)?;
    let target = EntityRef::parse(&id)?;
    let draft = draft_from_json(kind, body)?;
    let id = match target {
        EntityRef::Local(id) => id,
        remote @ EntityRef::Remote(_) => service
            .resolve_local(kind, &remote)
            .await?
            .local_id
            .ok_or_else(|| GovError::MissingId(format!("{remote} has no local row")))?,
    };
    let entity = service.update_local(kind, id, draft).await?;
    Ok(Json(ActionResponse {
        success: true,
        message: format!("Updated {} {}", kind, entity.display_name()),
        data: Some(entity),
    }))
}
