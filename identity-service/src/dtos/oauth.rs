use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Authorization request, accepted as a query string or a JSON body.
#[derive(Debug, Deserialize, Validate, ToSchema, IntoParams)]
pub struct AuthorizeRequest {
    #[validate(length(min = 1, message = "client_id is required"))]
    #[schema(example = "Xk3v9Qw2mZ8pL0aB7cD1eF")]
    pub client_id: String,

    /// Space separated; empty means every scope granted to the client.
    #[serde(default)]
    #[schema(example = "openid profile")]
    pub scope: String,

    pub redirect_uri: Option<String>,

    /// Opaque value echoed back on the redirect.
    pub state: Option<String>,

    /// Only `code` is supported.
    #[schema(example = "code")]
    pub response_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthorizeResponse {
    pub code: String,
    pub redirect_uri: String,
    /// `redirect_uri` with `code` and `state` appended.
    pub redirect_to: String,
    #[schema(example = "openid profile")]
    pub scope: String,
    #[schema(example = 600)]
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// Form body of the token endpoint.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenRequest {
    #[serde(default)]
    #[schema(example = "authorization_code")]
    pub grant_type: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RevokeRequest {
    #[validate(length(min = 1, message = "client_id is required"))]
    pub client_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RevokeResponse {
    pub client_id: String,
    #[schema(example = 2)]
    pub sessions_removed: u64,
    #[schema(example = 0)]
    pub scopes_stripped: u64,
}
