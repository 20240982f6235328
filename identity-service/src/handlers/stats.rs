use axum::{
    extract::{Query, State},
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::stats::EventsQuery,
    models::EventLog,
    services::StatsSnapshot,
    AppState,
};

/// Aggregate counts across the service
#[utoipa::path(
    get,
    path = "/stats",
    responses(
        (status = 200, description = "Counts of users, apps and authorizations", body = StatsSnapshot),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Stats"
)]
pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsSnapshot>, AppError> {
    Ok(Json(state.stats.snapshot().await?))
}

/// Latest audit events, newest first
#[utoipa::path(
    get,
    path = "/stats/events",
    params(EventsQuery),
    responses(
        (status = 200, description = "Audit events", body = [EventLog]),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Stats"
)]
pub async fn events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<EventLog>>, AppError> {
    Ok(Json(state.stats.events(query.limit).await?))
}
