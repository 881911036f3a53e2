//! POST /{kind}/bulk/{action}/

use std::sync::Arc;

use axum::extract::Path;
use axum::{Extension, Json};
use metagov_core::error::GovError;
use metagov_core::proto::{BulkRequest, BulkResponse, SyncAction};
use metagov_core::service::SyncService;

use super::parse_kind;
use crate::error::AppError;

/// Always 200 once the batch runs; per-item failures are in `results`.
pub async fn run_bulk(
    Extension(service): Extension<Arc<SyncService>>,
    Path((kind, action)): Path<(String, String)>,
    Json(req): Json<BulkRequest>,
) -> Result<Json<BulkResponse>, AppError> {
    let kind = parse_kind(&kind)?;
    let action = SyncAction::parse(&action)
        .ok_or_else(|| GovError::NotFound(format!("unknown action {action:?}")))?;
    let stage = req.stage_request();
    let report = service.bulk(kind, action, req.ids, stage).await?;
    Ok(Json(BulkResponse {
        success: report.all_succeeded(),
        action,
        report,
    }))
}
