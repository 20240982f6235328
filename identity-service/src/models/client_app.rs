use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::ScopeSet;

/// Registered third-party application. Only a SHA-256 digest of the secret is kept.
#[derive(Debug, Clone, FromRow)]
pub struct ClientApp {
    pub client_id: String,
    pub client_secret_hash: String,
    pub name: String,
    pub description: Option<String>,
    pub redirect_uri: String,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Grant of one catalog scope to one application.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct AppScope {
    pub app_id: String,
    pub scope_id: String,
}

/// Partial update of an application. `scopes` replaces the whole grant set;
/// `description: Some(None)` clears the description.
#[derive(Debug, Clone, Default)]
pub struct ClientAppPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub redirect_uri: Option<String>,
    pub scopes: Option<ScopeSet>,
}

impl ClientAppPatch {
    pub fn apply(&self, app: &mut ClientApp) {
        if let Some(name) = &self.name {
            app.name = name.clone();
        }
        if let Some(description) = &self.description {
            app.description = description.clone();
        }
        if let Some(redirect_uri) = &self.redirect_uri {
            app.redirect_uri = redirect_uri.clone();
        }
    }
}

/// Additions and removals turning one grant set into another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl ScopeDiff {
    pub fn between(current: &ScopeSet, desired: &ScopeSet) -> Self {
        Self {
            added: desired.missing_from(current),
            removed: current.missing_from(desired),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    pub fn describe(&self) -> String {
        format!(
            "scopes added [{}] removed [{}]",
            self.added.join(" "),
            self.removed.join(" ")
        )
    }
}

/// Application with its granted scopes, as returned to owners.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClientAppView {
    pub client_id: String,
    pub name: String,
    pub description: Option<String>,
    pub redirect_uri: String,
    pub owner_id: i64,
    pub scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ClientAppView {
    pub fn new(app: ClientApp, scopes: ScopeSet) -> Self {
        Self {
            client_id: app.client_id,
            name: app.name,
            description: app.description,
            redirect_uri: app.redirect_uri,
            owner_id: app.owner_id,
            scopes: scopes.into_vec(),
            created_at: app.created_at,
        }
    }
}
