//! POST /{kind}/remote/stage_changes/: stage a raw entity payload.

use std::sync::Arc;

use axum::extract::Path;
use axum::{Extension, Json};
use metagov_core::proto::StagePayloadRequest;
use metagov_core::service::SyncService;
use metagov_core::staging::StageResult;

use super::parse_kind;
use crate::error::AppError;

pub async fn stage_remote(
    Extension(service): Extension<Arc<SyncService>>,
    Path(kind): Path<String>,
    Json(req): Json<StagePayloadRequest>,
) -> Result<Json<StageResult>, AppError> {
    let kind = parse_kind(&kind)?;
    Ok(Json(
        service.stage_payload(kind, &req.entity, &req.stage).await?,
    ))
}
