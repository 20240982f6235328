use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::nullable;
use crate::models::{ClientAppPatch, ClientAppView, ScopeSet};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAppRequest {
    #[validate(length(min = 1, max = 200, message = "App name is required"))]
    #[schema(example = "Notes")]
    pub name: String,

    #[validate(length(max = 1000, message = "Description is too long"))]
    #[schema(example = "Note taking for teams")]
    pub description: Option<String>,

    #[validate(length(min = 1, max = 2048, message = "Redirect URI is required"))]
    #[schema(example = "https://notes.example/callback")]
    pub redirect_uri: String,

    #[serde(default)]
    #[schema(example = json!(["openid", "profile", "email"]))]
    pub scopes: Vec<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateAppRequest {
    #[validate(length(min = 1, max = 200, message = "App name must not be empty"))]
    pub name: Option<String>,

    /// `null` clears the description.
    #[serde(default, deserialize_with = "nullable")]
    #[validate(length(max = 1000, message = "Description is too long"))]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,

    #[validate(length(min = 1, max = 2048, message = "Redirect URI must not be empty"))]
    pub redirect_uri: Option<String>,

    /// Replaces the whole grant set when present.
    #[schema(example = json!(["openid", "email"]))]
    pub scopes: Option<Vec<String>>,
}

impl From<UpdateAppRequest> for ClientAppPatch {
    fn from(req: UpdateAppRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            redirect_uri: req.redirect_uri,
            scopes: req.scopes.map(ScopeSet::from_iter),
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct UpdateAppQuery {
    /// `1` or `true` issues a new client secret.
    #[param(example = "1")]
    pub regen_secret: Option<String>,
}

impl UpdateAppQuery {
    pub fn regenerate_secret(&self) -> bool {
        matches!(
            self.regen_secret.as_deref().map(str::trim),
            Some("1") | Some("true") | Some("yes")
        )
    }
}

/// Returned once at registration; the secret cannot be read back later.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AppCreatedResponse {
    pub app: ClientAppView,
    #[schema(example = "q8Zl0mJc3hY-uQ2sV5xW7zA9bC1dE3fG5hI7jK9lM0n")]
    pub client_secret: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AppUpdatedResponse {
    pub app: ClientAppView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub scopes_added: Vec<String>,
    pub scopes_removed: Vec<String>,
}
