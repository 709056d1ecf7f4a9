pub mod dto;
pub mod errors;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use handlers::ApiDoc;

use crate::{
    display::DisplayBoard, history::HistoryService, ingest::IngestService,
    liveness::LivenessHandle,
};

/// Shared handler state. Every field is a cheap clone over shared internals.
#[derive(Clone)]
pub struct AppState {
    pub history: HistoryService,
    pub ingest: IngestService,
    pub board: DisplayBoard,
    pub liveness: LivenessHandle,
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/api/sensor/{greenhouse_id}", post(handlers::ingest_reading))
        .route("/api/realtime/{greenhouse_id}", post(handlers::ingest_reading))
        .route("/api/greenhouses", get(handlers::list_greenhouses))
        .route("/api/greenhouses/history", get(handlers::get_history))
        .route(
            "/api/greenhouses/history/latest",
            get(handlers::get_history_latest),
        )
        .route("/api/dashboard", get(handlers::get_dashboard))
        .route("/api/dashboard/{site_id}", get(handlers::get_site_dashboard))
        .with_state(state)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
}
