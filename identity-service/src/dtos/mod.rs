pub mod auth;
pub mod developer;
pub mod oauth;
pub mod stats;
pub mod user;

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// For `#[serde(default, deserialize_with = "nullable")]`: an absent key stays
/// `None`, an explicit `null` becomes `Some(None)`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "invalid_grant")]
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "email: email")]
    pub details: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = "Application deleted")]
    pub message: String,
}
