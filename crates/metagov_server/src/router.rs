//! Router construction.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use metagov_core::service::SyncService;
use tower_http::trace::TraceLayer;

use crate::handlers;

/// Build the full axum router. `{kind}` is a path segment such as `tags` or
/// `glossary-terms`; `{id}` is a database id or a URN.
pub fn build_router(service: Arc<SyncService>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/:kind/data/", get(handlers::listing::local_data))
        .route("/:kind/remote-data/", get(handlers::listing::remote_data))
        .route("/:kind/create/", post(handlers::entities::create))
        .route(
            "/:kind/remote/stage_changes/",
            post(handlers::staging::stage_remote),
        )
        .route("/:kind/bulk/:action/", post(handlers::bulk::run_bulk))
        .route("/:kind/:id/update/", post(handlers::entities::update))
        .route("/:kind/:id/:action/", post(handlers::actions::run_action))
        .layer(Extension(service))
        .layer(TraceLayer::new_for_http())
}
