//! Test helpers for identity-service integration tests.
//!
//! Drives the full router in-process over the memory store and a manual
//! clock, so no database or network is needed.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use identity_service::{
    build_router,
    config::{
        DatabaseConfig, Environment, IdentityConfig, JwtConfig, OAuthConfig, PasswordConfig,
        ScopePolicy, SecurityConfig, StorageBackend,
    },
    services::{ManualClock, MemoryStore},
    AppState,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub const PASSWORD: &str = "correct horse battery";
pub const REDIRECT_URI: &str = "https://notes.example/callback";

pub fn test_config() -> IdentityConfig {
    IdentityConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "identity-service-test".to_string(),
        service_version: "0.0.0-test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        storage: StorageBackend::Memory,
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 0,
        },
        jwt: JwtConfig {
            secret: "integration-test-secret-integration-test".to_string(),
            access_token_expiry_seconds: 3600,
        },
        oauth: OAuthConfig {
            code_expiry_seconds: 600,
            scope_policy: ScopePolicy::Client,
            strip_scopes_on_revoke: false,
        },
        password: PasswordConfig {
            memory_kib: 256,
            iterations: 1,
            parallelism: 1,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub text: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.text)
            .unwrap_or_else(|e| panic!("Response is not JSON ({}): {}", e, self.text))
    }

    pub fn error(&self) -> String {
        self.json()["error"].as_str().unwrap_or_default().to_string()
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
}

pub struct RegisteredApp {
    pub client_id: String,
    pub client_secret: String,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    pub async fn spawn_with(customize: impl FnOnce(&mut IdentityConfig)) -> Self {
        let mut config = test_config();
        customize(&mut config);

        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::default());
        let state = AppState::new(config, store.clone(), clock.clone())
            .expect("Failed to build app state");
        let router = build_router(state.clone())
            .await
            .expect("Failed to build router");

        Self {
            router,
            state,
            store,
            clock,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");

        TestResponse {
            status,
            headers,
            text: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, path, token, None).await
    }

    pub async fn post_json(&self, path: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, path, token, Some(body)).await
    }

    pub async fn put_json(&self, path: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::PUT, path, token, Some(body)).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, path, token, None).await
    }

    pub async fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = serde_urlencoded::to_string(fields).unwrap();
        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Register a user and return their first-party token.
    pub async fn signed_in_user(&self, email: &str) -> String {
        let response = self
            .post_json(
                "/auth/register",
                None,
                json!({ "email": email, "password": PASSWORD, "name": "Test User" }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text);

        let response = self
            .post_json(
                "/auth/login",
                None,
                json!({ "email": email, "password": PASSWORD }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.text);
        response.json()["access_token"].as_str().unwrap().to_string()
    }

    pub async fn register_app(&self, token: &str, scopes: &[&str]) -> RegisteredApp {
        let response = self
            .post_json(
                "/developer/apps",
                Some(token),
                json!({
                    "name": "Notes",
                    "description": "Note taking",
                    "redirect_uri": REDIRECT_URI,
                    "scopes": scopes,
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text);

        let body = response.json();
        RegisteredApp {
            client_id: body["app"]["client_id"].as_str().unwrap().to_string(),
            client_secret: body["client_secret"].as_str().unwrap().to_string(),
        }
    }

    pub async fn authorize(&self, token: &str, client_id: &str, scope: &str) -> String {
        let response = self
            .post_json(
                "/oauth/authorize",
                Some(token),
                json!({ "client_id": client_id, "scope": scope, "redirect_uri": REDIRECT_URI }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.text);
        response.json()["code"].as_str().unwrap().to_string()
    }

    pub async fn exchange(&self, code: &str, app: &RegisteredApp) -> TestResponse {
        self.post_form(
            "/oauth/token",
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", &app.client_id),
                ("client_secret", &app.client_secret),
                ("redirect_uri", REDIRECT_URI),
            ],
        )
        .await
    }
}
