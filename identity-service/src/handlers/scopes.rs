use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::{models::Scope, AppState};

/// List the permission catalog
#[utoipa::path(
    get,
    path = "/scopes",
    responses(
        (status = 200, description = "Every scope an application can be granted", body = [Scope])
    ),
    tag = "OAuth"
)]
pub async fn list_scopes(State(state): State<AppState>) -> Result<Json<Vec<Scope>>, AppError> {
    Ok(Json(state.catalog.list().await?))
}
