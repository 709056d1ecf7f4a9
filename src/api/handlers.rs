use axum::{
    extract::{Path, Query, State},
    Json,
};
use utoipa::OpenApi;

use super::{
    dto::{HistoryParams, IngestResponse, LatestParams, ReadingDto},
    errors::AppError,
    AppState,
};
use crate::{
    db::models::{NewReading, SensorValues, Site},
    display::{
        board::{FieldView, LiveValue},
        classify::Band,
        SiteView,
    },
    liveness::Liveness,
    time::{parse_range_bound, DayEdge},
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn require_gh(gh: Option<String>) -> Result<String, AppError> {
    gh.map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("missing query parameter: gh".to_owned()))
}

fn parse_bound(
    name: &str,
    raw: Option<&str>,
    edge: DayEdge,
) -> Result<Option<chrono::DateTime<chrono::Utc>>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => parse_range_bound(s, edge)
            .map(Some)
            .ok_or_else(|| AppError::BadRequest(format!("invalid {name}: {s:?}"))),
    }
}

// ---------------------------------------------------------------------------
// Ingest
// ---------------------------------------------------------------------------

/// Store one reading for a greenhouse. Every sensor field is optional and
/// stored as sent.
#[utoipa::path(
    post,
    path = "/api/sensor/{greenhouse_id}",
    params(("greenhouse_id" = String, Path, description = "Greenhouse id")),
    request_body = NewReading,
    responses(
        (status = 200, description = "Reading stored", body = IngestResponse),
        (status = 400, description = "Blank greenhouse id"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "sensors"
)]
pub async fn ingest_reading(
    State(state): State<AppState>,
    Path(greenhouse_id): Path<String>,
    Json(reading): Json<NewReading>,
) -> Result<Json<IngestResponse>, AppError> {
    let id = state.ingest.ingest(&greenhouse_id, &reading).await?;
    Ok(Json(IngestResponse { success: true, id }))
}

// ---------------------------------------------------------------------------
// Greenhouses & history
// ---------------------------------------------------------------------------

/// List every known greenhouse.
#[utoipa::path(
    get,
    path = "/api/greenhouses",
    responses(
        (status = 200, description = "Greenhouses ordered by id", body = Vec<Site>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "greenhouses"
)]
pub async fn list_greenhouses(State(state): State<AppState>) -> Result<Json<Vec<Site>>, AppError> {
    Ok(Json(state.history.sites().await?))
}

/// Readings for one greenhouse within `[date_from, date_to]`, newest first.
/// An inverted range yields an empty array.
#[utoipa::path(
    get,
    path = "/api/greenhouses/history",
    params(HistoryParams),
    responses(
        (status = 200, description = "Readings, newest first", body = Vec<ReadingDto>),
        (status = 400, description = "Missing gh or unparsable date"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "greenhouses"
)]
pub async fn get_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<ReadingDto>>, AppError> {
    let gh = require_gh(params.gh)?;
    let from = parse_bound("date_from", params.date_from.as_deref(), DayEdge::Start)?;
    let to = parse_bound("date_to", params.date_to.as_deref(), DayEdge::End)?;

    let rows = state.history.query(&gh, from, to).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// The most recent reading for one greenhouse, or `null`.
#[utoipa::path(
    get,
    path = "/api/greenhouses/history/latest",
    params(LatestParams),
    responses(
        (status = 200, description = "Latest reading, or null when none is stored", body = ReadingDto),
        (status = 400, description = "Missing gh"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "greenhouses"
)]
pub async fn get_history_latest(
    State(state): State<AppState>,
    Query(params): Query<LatestParams>,
) -> Result<Json<Option<ReadingDto>>, AppError> {
    let gh = require_gh(params.gh)?;
    let row = state.history.latest(&gh).await?;
    Ok(Json(row.map(Into::into)))
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

/// Live dashboard state for every greenhouse.
#[utoipa::path(
    get,
    path = "/api/dashboard",
    responses(
        (status = 200, description = "Per-site display state", body = Vec<SiteView>),
    ),
    tag = "dashboard"
)]
pub async fn get_dashboard(State(state): State<AppState>) -> Json<Vec<SiteView>> {
    Json(state.board.all().await)
}

/// Live dashboard state for one greenhouse. Viewing a site also puts it under
/// liveness evaluation, so it falls back to stored data once found silent.
///
/// Only greenhouses already on the board or listed in storage are served.
#[utoipa::path(
    get,
    path = "/api/dashboard/{site_id}",
    params(("site_id" = String, Path, description = "Greenhouse id")),
    responses(
        (status = 200, description = "Display state of the site", body = SiteView),
        (status = 404, description = "Unknown greenhouse"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "dashboard"
)]
pub async fn get_site_dashboard(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
) -> Result<Json<SiteView>, AppError> {
    if let Some(view) = state.board.get(&site_id).await {
        state.liveness.watch(&site_id).await;
        return Ok(Json(view));
    }

    let sites = state.history.sites().await?;
    let site = sites
        .iter()
        .find(|site| site.id == site_id)
        .ok_or_else(|| AppError::NotFound(format!("unknown greenhouse: {site_id}")))?;

    state.board.register(site).await;
    state.liveness.watch(&site.id).await;
    let view = state
        .board
        .get(&site.id)
        .await
        .unwrap_or_else(|| SiteView::new(&site.id));
    Ok(Json(view))
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        ingest_reading,
        list_greenhouses,
        get_history,
        get_history_latest,
        get_dashboard,
        get_site_dashboard,
        health
    ),
    components(schemas(
        ReadingDto,
        IngestResponse,
        NewReading,
        SensorValues,
        Site,
        SiteView,
        FieldView,
        LiveValue,
        Band,
        Liveness
    )),
    tags(
        (name = "sensors",     description = "Reading ingest"),
        (name = "greenhouses", description = "Greenhouses and stored history"),
        (name = "dashboard",   description = "Live display state"),
        (name = "system",      description = "System endpoints"),
    ),
    info(
        title = "Greenhouse Monitor API",
        version = "0.1.0",
        description = "Sensor ingest, history queries and live dashboard state for greenhouse sites"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
