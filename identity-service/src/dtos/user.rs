use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::nullable;
use crate::models::{AuthSession, ProfilePatch, ScopeSet, User};

/// Omitted fields are left as they are; `null` clears a field.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[serde(default, deserialize_with = "nullable")]
    #[validate(length(max = 200, message = "Name is too long"))]
    #[schema(value_type = Option<String>, example = "Ada Lovelace")]
    pub name: Option<Option<String>>,

    #[serde(default, deserialize_with = "nullable")]
    #[validate(url(message = "Avatar must be a URL"))]
    #[schema(value_type = Option<String>, example = "https://cdn.example.com/ada.png")]
    pub avatar: Option<Option<String>>,

    #[serde(default, deserialize_with = "nullable")]
    #[validate(length(max = 40, message = "Phone is too long"))]
    #[schema(value_type = Option<String>, example = "+44 20 7946 0000")]
    pub phone: Option<Option<String>>,

    #[serde(default, deserialize_with = "nullable")]
    #[validate(length(max = 500, message = "Address is too long"))]
    #[schema(value_type = Option<String>, example = "12 St James's Square, London")]
    pub address: Option<Option<String>>,
}

impl From<UpdateProfileRequest> for ProfilePatch {
    fn from(req: UpdateProfileRequest) -> Self {
        Self {
            name: req.name,
            avatar: req.avatar,
            phone: req.phone,
            address: req.address,
        }
    }
}

/// Claims about the subject, limited to what the token's scopes allow.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UserInfoResponse {
    #[schema(example = "42")]
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl UserInfoResponse {
    /// `None` scopes means a first-party token, which sees everything.
    pub fn for_scopes(user: User, scopes: Option<&ScopeSet>) -> Self {
        let allows = |scope: &str| scopes.map_or(true, |s| s.contains(scope));
        let mut info = Self {
            sub: user.id.to_string(),
            ..Default::default()
        };
        if allows("email") {
            info.email = Some(user.email);
        }
        if allows("profile") {
            info.name = user.name;
            info.avatar = user.avatar;
        }
        if allows("phone") {
            info.phone = user.phone;
        }
        if allows("address") {
            info.address = user.address;
        }
        info
    }
}

/// One authorization a user has granted, without the code itself.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthorizationView {
    #[schema(example = "Xk3v9Qw2mZ8pL0aB7cD1eF")]
    pub client_id: String,
    #[schema(example = "openid profile")]
    pub scope: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

impl From<AuthSession> for AuthorizationView {
    fn from(session: AuthSession) -> Self {
        Self {
            client_id: session.client_id,
            scope: session.scope,
            expires_at: session.expires_at,
            used: session.used,
        }
    }
}
