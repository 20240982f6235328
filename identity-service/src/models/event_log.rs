//! Audit trail records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Security-relevant event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    UserRegistered,
    UserLogin,
    LoginFailed,
    ProfileUpdated,
    ClientRegistered,
    ClientUpdated,
    ClientSecretRotated,
    ClientDeleted,
    AuthorizationRequested,
    AuthorizationDenied,
    TokenIssued,
    TokenExchangeFailed,
    AccessRevoked,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::UserRegistered => "user_registered",
            EventType::UserLogin => "user_login",
            EventType::LoginFailed => "login_failed",
            EventType::ProfileUpdated => "profile_updated",
            EventType::ClientRegistered => "client_registered",
            EventType::ClientUpdated => "client_updated",
            EventType::ClientSecretRotated => "client_secret_rotated",
            EventType::ClientDeleted => "client_deleted",
            EventType::AuthorizationRequested => "authorization_requested",
            EventType::AuthorizationDenied => "authorization_denied",
            EventType::TokenIssued => "token_issued",
            EventType::TokenExchangeFailed => "token_exchange_failed",
            EventType::AccessRevoked => "access_revoked",
        }
    }
}

/// Persisted event. Never updated or deleted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct EventLog {
    pub id: i64,
    pub event_type: String,
    pub user_id: Option<i64>,
    pub client_id: Option<String>,
    pub description: String,
    pub ip: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Event awaiting insertion.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_type: EventType,
    pub user_id: Option<i64>,
    pub client_id: Option<String>,
    pub description: String,
    pub ip: Option<String>,
    pub created_at: DateTime<Utc>,
}
