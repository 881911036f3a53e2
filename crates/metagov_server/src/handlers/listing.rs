//! GET /{kind}/data/ and GET /{kind}/remote-data/

use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::{Extension, Json};
use metagov_core::listing::{ListQuery, ListingData, ListingResponse, Page};
use metagov_core::service::SyncService;
use metagov_core::types::Entity;

use super::parse_kind;
use crate::error::AppError;

/// Local rows only, stored status. No backend call.
pub async fn local_data(
    Extension(service): Extension<Arc<SyncService>>,
    Path(kind): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListingResponse<Page<Entity>>>, AppError> {
    let kind = parse_kind(&kind)?;
    Ok(Json(service.local_listing(kind, query).await?))
}

/// Full reconciliation against the backend.
pub async fn remote_data(
    Extension(service): Extension<Arc<SyncService>>,
    Path(kind): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListingResponse<ListingData>>, AppError> {
    let kind = parse_kind(&kind)?;
    Ok(Json(service.reconciled_listing(kind, query).await?))
}
