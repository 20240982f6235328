pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{openapi::security::SecurityScheme, Modify, OpenApi};

use crate::config::IdentityConfig;
use crate::services::{
    AccountService, AuditLog, AuthorizationEngine, ClientRegistry, ClientRepository, Clock,
    EventRepository, Repositories, ScopeCatalog, ScopeRepository, SessionLedger,
    SessionRepository, StatsService, StoreHealth, TokenService, UserRepository,
};
use crate::utils::{Argon2Hasher, CredentialHasher};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::scopes::list_scopes,
        handlers::auth::register,
        handlers::auth::login,
        handlers::oauth::authorize_query,
        handlers::oauth::authorize_json,
        handlers::oauth::token,
        handlers::oauth::revoke_token,
        handlers::user::get_profile,
        handlers::user::update_profile,
        handlers::user::userinfo,
        handlers::user::authorizations,
        handlers::user::revoke,
        handlers::developer::list_apps,
        handlers::developer::create_app,
        handlers::developer::update_app,
        handlers::developer::delete_app,
        handlers::stats::stats,
        handlers::stats::events,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::MessageResponse,
            dtos::auth::RegisterRequest,
            dtos::auth::RegisterResponse,
            dtos::auth::LoginRequest,
            dtos::oauth::AuthorizeRequest,
            dtos::oauth::AuthorizeResponse,
            dtos::oauth::TokenRequest,
            dtos::oauth::RevokeRequest,
            dtos::oauth::RevokeResponse,
            dtos::user::UpdateProfileRequest,
            dtos::user::UserInfoResponse,
            dtos::user::AuthorizationView,
            dtos::developer::CreateAppRequest,
            dtos::developer::UpdateAppRequest,
            dtos::developer::AppCreatedResponse,
            dtos::developer::AppUpdatedResponse,
            services::TokenResponse,
            services::StatsSnapshot,
            services::IpCount,
            models::SanitizedUser,
            models::ClientAppView,
            models::Scope,
            models::EventLog,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Account registration and login"),
        (name = "OAuth", description = "Authorization code grant"),
        (name = "User", description = "Profile and granted authorizations"),
        (name = "Developer", description = "Client application registry"),
        (name = "Stats", description = "Aggregate counts and audit feed"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<IdentityConfig>,
    pub repos: Arc<Repositories>,
    pub tokens: TokenService,
    pub accounts: AccountService,
    pub registry: ClientRegistry,
    pub catalog: ScopeCatalog,
    pub ledger: SessionLedger,
    pub engine: AuthorizationEngine,
    pub audit: AuditLog,
    pub stats: StatsService,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire every service over one store. The signing secret, clock and
    /// hasher are fixed here for the life of the process.
    pub fn new<S>(
        config: IdentityConfig,
        store: Arc<S>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError>
    where
        S: UserRepository
            + ClientRepository
            + ScopeRepository
            + SessionRepository
            + EventRepository
            + StoreHealth
            + 'static,
    {
        let hasher: Arc<dyn CredentialHasher> =
            Arc::new(Argon2Hasher::new(&config.password).map_err(AppError::ConfigError)?);
        Self::with_hasher(config, Repositories::from_store(store), clock, hasher)
    }

    pub fn with_hasher(
        config: IdentityConfig,
        repos: Repositories,
        clock: Arc<dyn Clock>,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Result<Self, AppError> {
        let audit = AuditLog::new(repos.events.clone(), clock.clone());
        let tokens = TokenService::new(&config.jwt, repos.users.clone(), clock.clone())
            .map_err(AppError::ConfigError)?;
        let catalog = ScopeCatalog::new(repos.scopes.clone());
        let ledger = SessionLedger::new(repos.sessions.clone(), clock.clone());

        let accounts = AccountService::new(
            repos.users.clone(),
            hasher,
            tokens.clone(),
            audit.clone(),
            clock.clone(),
        );
        let registry = ClientRegistry::new(
            repos.clients.clone(),
            repos.users.clone(),
            catalog.clone(),
            audit.clone(),
            clock,
        );
        let engine = AuthorizationEngine::new(
            &config.oauth,
            registry.clone(),
            catalog.clone(),
            ledger.clone(),
            tokens.clone(),
            repos.users.clone(),
            audit.clone(),
        );

        let repos = Arc::new(repos);
        Ok(Self {
            config: Arc::new(config),
            stats: StatsService::new(repos.clone(), audit.clone()),
            repos,
            tokens,
            accounts,
            registry,
            catalog,
            ledger,
            engine,
            audit,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    let cors = cors_layer(&state.config.security.allowed_origins)?;

    // Session-only routes: delegated tokens are refused.
    let first_party = Router::new()
        .route(
            "/oauth/authorize",
            get(handlers::oauth::authorize_query).post(handlers::oauth::authorize_json),
        )
        .route("/oauth/token/revoke", post(handlers::oauth::revoke_token))
        .route(
            "/user/profile",
            get(handlers::user::get_profile).put(handlers::user::update_profile),
        )
        .route("/user/authorizations", get(handlers::user::authorizations))
        .route("/user/revoke/:client_id", post(handlers::user::revoke))
        .route(
            "/developer/apps",
            get(handlers::developer::list_apps).post(handlers::developer::create_app),
        )
        .route(
            "/developer/apps/:client_id",
            put(handlers::developer::update_app).delete(handlers::developer::delete_app),
        )
        .route("/stats", get(handlers::stats::stats))
        .route("/stats/events", get(handlers::stats::events))
        .route_layer(from_fn(middleware::require_first_party));

    let protected = Router::new()
        .route("/user/userinfo", get(handlers::user::userinfo))
        .merge(first_party)
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .route("/scopes", get(handlers::scopes::list_scopes))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/oauth/token", post(handlers::oauth::token))
        .merge(protected)
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                    user_id = tracing::field::Empty,
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors);

    Ok(app)
}

fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer, AppError> {
    let origin = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins = allowed_origins
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>().map_err(|e| {
                    AppError::ConfigError(anyhow::anyhow!("Invalid CORS origin '{}': {}", o, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
        ]))
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service and store are healthy"),
        (status = 503, description = "Store is unreachable")
    ),
    tag = "Observability"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (status, store) = match state.repos.health.ping().await {
        Ok(()) => (StatusCode::OK, "up"),
        Err(e) => {
            tracing::error!(error = %e, "Store health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "down")
        }
    };

    (
        status,
        Json(json!({
            "status": if status == StatusCode::OK { "healthy" } else { "unhealthy" },
            "service": state.config.service_name,
            "version": state.config.service_version,
            "store": store,
        })),
    )
}
