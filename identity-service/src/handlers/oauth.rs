use axum::{
    extract::State,
    http::{header, HeaderMap},
    Form, Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use service_core::error::AppError;

use crate::{
    dtos::oauth::{AuthorizeRequest, AuthorizeResponse, RevokeRequest, RevokeResponse, TokenRequest},
    middleware::AuthenticatedUser,
    services::TokenResponse,
    utils::{ClientIp, ValidatedJson, ValidatedQuery},
    AppState,
};

const AUTHORIZATION_CODE_GRANT: &str = "authorization_code";

/// Issue an authorization code (query string form)
#[utoipa::path(
    get,
    path = "/oauth/authorize",
    params(AuthorizeRequest),
    responses(
        (status = 200, description = "Code issued", body = AuthorizeResponse),
        (status = 400, description = "Redirect mismatch or invalid scope", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Client not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "OAuth"
)]
pub async fn authorize_query(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ClientIp(ip): ClientIp,
    ValidatedQuery(req): ValidatedQuery<AuthorizeRequest>,
) -> Result<Json<AuthorizeResponse>, AppError> {
    authorize(state, user, ip, req).await.map(Json)
}

/// Issue an authorization code (JSON body form)
#[utoipa::path(
    post,
    path = "/oauth/authorize",
    request_body = AuthorizeRequest,
    responses(
        (status = 200, description = "Code issued", body = AuthorizeResponse),
        (status = 400, description = "Redirect mismatch or invalid scope", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Client not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "OAuth"
)]
pub async fn authorize_json(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ClientIp(ip): ClientIp,
    ValidatedJson(req): ValidatedJson<AuthorizeRequest>,
) -> Result<Json<AuthorizeResponse>, AppError> {
    authorize(state, user, ip, req).await.map(Json)
}

async fn authorize(
    state: AppState,
    user: AuthenticatedUser,
    ip: String,
    req: AuthorizeRequest,
) -> Result<AuthorizeResponse, AppError> {
    if req.response_type.as_deref().is_some_and(|t| t != "code") {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "unsupported_response_type"
        )));
    }

    let grant = state
        .engine
        .authorize(
            user.user_id,
            &req.client_id,
            &req.scope,
            req.redirect_uri.as_deref(),
            Some(&ip),
        )
        .await?;

    Ok(AuthorizeResponse {
        redirect_to: grant.redirect_url(req.state.as_deref()),
        code: grant.code,
        redirect_uri: grant.redirect_uri,
        scope: grant.scope,
        expires_in: grant.expires_in,
        state: req.state,
    })
}

/// Exchange an authorization code for an access token
#[utoipa::path(
    post,
    path = "/oauth/token",
    request_body(content = TokenRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Delegated access token", body = TokenResponse),
        (status = 400, description = "invalid_grant or unsupported_grant_type", body = ErrorResponse),
        (status = 401, description = "invalid_client", body = ErrorResponse)
    ),
    tag = "OAuth"
)]
pub async fn token(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    Form(req): Form<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    if req.grant_type != AUTHORIZATION_CODE_GRANT {
        return Err(AppError::BadRequest(anyhow::anyhow!("unsupported_grant_type")));
    }

    let (client_id, client_secret) = match basic_credentials(&headers) {
        Some(credentials) if req.client_id.is_empty() => credentials,
        _ => (req.client_id, req.client_secret),
    };

    let token = state
        .engine
        .exchange(
            &req.code,
            &client_id,
            &client_secret,
            req.redirect_uri.as_deref(),
            Some(&ip),
        )
        .await?;
    Ok(Json(token))
}

/// Revoke the caller's grants to an application
#[utoipa::path(
    post,
    path = "/oauth/token/revoke",
    request_body = RevokeRequest,
    responses(
        (status = 200, description = "Access revoked", body = RevokeResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Client not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "OAuth"
)]
pub async fn revoke_token(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ClientIp(ip): ClientIp,
    ValidatedJson(req): ValidatedJson<RevokeRequest>,
) -> Result<Json<RevokeResponse>, AppError> {
    let summary = state
        .engine
        .revoke_access(user.user_id, &req.client_id, Some(&ip))
        .await?;

    Ok(Json(RevokeResponse {
        client_id: req.client_id,
        sessions_removed: summary.sessions_removed,
        scopes_stripped: summary.scopes_stripped,
    }))
}

/// Client credentials from an `Authorization: Basic` header.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let encoded = headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Basic ")?;
    let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
    let (id, secret) = decoded.split_once(':')?;
    let id = urlencoding::decode(id).ok()?.into_owned();
    let secret = urlencoding::decode(secret).ok()?.into_owned();
    Some((id, secret))
}
