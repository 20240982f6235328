use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::models::ScopeSet;
use crate::services::{AccessTokenClaims, ServiceError};
use crate::AppState;

/// Caller identity established by `auth_middleware`.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub email: String,
    /// Set when the token was obtained through a code exchange.
    pub client_id: Option<String>,
    pub scopes: Option<ScopeSet>,
}

impl AuthenticatedUser {
    fn from_claims(claims: AccessTokenClaims) -> Result<Self, ServiceError> {
        let user_id = claims.subject_id()?;
        let scopes = claims.is_delegated().then(|| claims.scopes());
        Ok(Self {
            user_id,
            email: claims.email,
            client_id: claims.client_id,
            scopes,
        })
    }

    pub fn is_delegated(&self) -> bool {
        self.client_id.is_some()
    }
}

/// Middleware to require a valid bearer token.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .unwrap_or_default();

    let claims = state.tokens.validate(token).await.map_err(|e| {
        if e.is_token_error() {
            tracing::debug!(error = %e, "Rejected bearer token");
        } else {
            tracing::error!(error = %e, "Bearer token check failed");
        }
        AppError::from(e)
    })?;

    let user = AuthenticatedUser::from_claims(claims)?;
    tracing::Span::current().record("user_id", user.user_id);
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// Refuses tokens delegated to a client application. Runs after `auth_middleware`.
pub async fn require_first_party(req: Request, next: Next) -> Result<Response, AppError> {
    let delegated = req
        .extensions()
        .get::<AuthenticatedUser>()
        .map(AuthenticatedUser::is_delegated)
        .ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Authenticated user missing from request extensions"
            ))
        })?;

    if delegated {
        return Err(AppError::Forbidden(anyhow::anyhow!("insufficient_scope")));
    }

    Ok(next.run(req).await)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "Authenticated user missing from request extensions"
                ))
            })
    }
}
