use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{
        oauth::RevokeResponse,
        user::{AuthorizationView, UpdateProfileRequest, UserInfoResponse},
    },
    middleware::AuthenticatedUser,
    models::SanitizedUser,
    utils::{ClientIp, ValidatedJson},
    AppState,
};

/// Get the signed-in user's profile
#[utoipa::path(
    get,
    path = "/user/profile",
    responses(
        (status = 200, description = "Profile", body = SanitizedUser),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Delegated token", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<SanitizedUser>, AppError> {
    let profile = state.accounts.profile(user.user_id).await?;
    Ok(Json(profile.into()))
}

/// Update profile fields; omitted fields are left unchanged
#[utoipa::path(
    put,
    path = "/user/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = SanitizedUser),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ClientIp(ip): ClientIp,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> Result<Json<SanitizedUser>, AppError> {
    let updated = state
        .accounts
        .update_profile(user.user_id, req.into(), Some(&ip))
        .await?;
    Ok(Json(updated.into()))
}

/// Claims about the token's subject, filtered by the token's scopes
#[utoipa::path(
    get,
    path = "/user/userinfo",
    responses(
        (status = 200, description = "User claims", body = UserInfoResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn userinfo(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UserInfoResponse>, AppError> {
    let profile = state.accounts.profile(user.user_id).await?;
    Ok(Json(UserInfoResponse::for_scopes(
        profile,
        user.scopes.as_ref(),
    )))
}

/// Authorizations the user has granted, latest expiry first
#[utoipa::path(
    get,
    path = "/user/authorizations",
    responses(
        (status = 200, description = "Authorization history", body = [AuthorizationView]),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn authorizations(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<AuthorizationView>>, AppError> {
    let history = state.ledger.history(user.user_id).await?;
    Ok(Json(history.into_iter().map(Into::into).collect()))
}

/// Revoke everything an application holds for the user
#[utoipa::path(
    post,
    path = "/user/revoke/{client_id}",
    params(("client_id" = String, Path, description = "Application to revoke")),
    responses(
        (status = 200, description = "Access revoked", body = RevokeResponse),
        (status = 404, description = "Client not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn revoke(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ClientIp(ip): ClientIp,
    Path(client_id): Path<String>,
) -> Result<Json<RevokeResponse>, AppError> {
    let summary = state
        .engine
        .revoke_access(user.user_id, &client_id, Some(&ip))
        .await?;

    Ok(Json(RevokeResponse {
        client_id,
        sessions_removed: summary.sessions_removed,
        scopes_stripped: summary.scopes_stripped,
    }))
}
