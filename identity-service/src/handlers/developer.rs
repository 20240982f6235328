use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{
        developer::{
            AppCreatedResponse, AppUpdatedResponse, CreateAppRequest, UpdateAppQuery,
            UpdateAppRequest,
        },
        MessageResponse,
    },
    middleware::AuthenticatedUser,
    models::{ClientAppView, ScopeSet},
    services::NewClient,
    utils::{ClientIp, ValidatedJson},
    AppState,
};

/// List applications owned by the caller
#[utoipa::path(
    get,
    path = "/developer/apps",
    responses(
        (status = 200, description = "Owned applications", body = [ClientAppView]),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Developer"
)]
pub async fn list_apps(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<ClientAppView>>, AppError> {
    Ok(Json(state.registry.list(user.user_id).await?))
}

/// Register a new client application
#[utoipa::path(
    post,
    path = "/developer/apps",
    request_body = CreateAppRequest,
    responses(
        (status = 201, description = "Application registered", body = AppCreatedResponse),
        (status = 400, description = "Validation error or unknown scope", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Developer"
)]
pub async fn create_app(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ClientIp(ip): ClientIp,
    ValidatedJson(req): ValidatedJson<CreateAppRequest>,
) -> Result<(StatusCode, Json<AppCreatedResponse>), AppError> {
    let registered = state
        .registry
        .register(
            NewClient {
                owner_id: user.user_id,
                name: req.name,
                description: req.description,
                redirect_uri: req.redirect_uri,
                scopes: req.scopes.into_iter().collect::<ScopeSet>(),
            },
            Some(&ip),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AppCreatedResponse {
            app: registered.app,
            client_secret: registered.client_secret,
        }),
    ))
}

/// Update an application; `?regen_secret=1` also rotates its secret
#[utoipa::path(
    put,
    path = "/developer/apps/{client_id}",
    params(
        ("client_id" = String, Path, description = "Application to update"),
        UpdateAppQuery
    ),
    request_body = UpdateAppRequest,
    responses(
        (status = 200, description = "Application updated", body = AppUpdatedResponse),
        (status = 400, description = "Validation error or unknown scope", body = ErrorResponse),
        (status = 404, description = "Application not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Developer"
)]
pub async fn update_app(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ClientIp(ip): ClientIp,
    Path(client_id): Path<String>,
    Query(query): Query<UpdateAppQuery>,
    ValidatedJson(req): ValidatedJson<UpdateAppRequest>,
) -> Result<Json<AppUpdatedResponse>, AppError> {
    state.registry.owned_by(&client_id, user.user_id).await?;

    let updated = state
        .registry
        .update(&client_id, req.into(), query.regenerate_secret(), Some(&ip))
        .await?;

    Ok(Json(AppUpdatedResponse {
        app: updated.app,
        client_secret: updated.client_secret,
        scopes_added: updated.scope_diff.added,
        scopes_removed: updated.scope_diff.removed,
    }))
}

/// Delete an application together with its grants and sessions
#[utoipa::path(
    delete,
    path = "/developer/apps/{client_id}",
    params(("client_id" = String, Path, description = "Application to delete")),
    responses(
        (status = 200, description = "Application deleted", body = MessageResponse),
        (status = 404, description = "Application not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Developer"
)]
pub async fn delete_app(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ClientIp(ip): ClientIp,
    Path(client_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.registry.owned_by(&client_id, user.user_id).await?;
    state.registry.delete(&client_id, Some(&ip)).await?;

    Ok(Json(MessageResponse {
        message: "Application deleted".to_string(),
    }))
}
