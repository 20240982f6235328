use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use crate::dtos::ErrorResponse;

/// 400 `invalid_request`, with the offending fields in `details`.
#[derive(Debug)]
pub struct InvalidRequest(pub String);

impl IntoResponse for InvalidRequest {
    fn into_response(self) -> Response {
        tracing::debug!(details = %self.0, "Rejected request input");
        let body = ErrorResponse {
            error: "invalid_request".to_string(),
            details: Some(self.0),
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

impl From<ValidationErrors> for InvalidRequest {
    fn from(errors: ValidationErrors) -> Self {
        Self(describe(&errors))
    }
}

/// `field: rule` pairs, sorted by field so the message is stable.
fn describe(errors: &ValidationErrors) -> String {
    let mut fields: Vec<String> = errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let rules: Vec<String> = errs
                .iter()
                .map(|e| e.message.as_deref().unwrap_or(&e.code).to_string())
                .collect();
            format!("{}: {}", field, rules.join(", "))
        })
        .collect();
    fields.sort();
    fields.join("; ")
}

/// JSON body that has passed its `validator` rules.
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = InvalidRequest;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| InvalidRequest(e.body_text()))?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// Query string counterpart of [`ValidatedJson`], for the GET form of
/// `/oauth/authorize`.
pub struct ValidatedQuery<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = InvalidRequest;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| InvalidRequest(e.body_text()))?;
        value.validate()?;
        Ok(ValidatedQuery(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Signup {
        #[validate(email)]
        email: String,
        #[validate(length(min = 8, message = "too short"))]
        password: String,
    }

    async fn body_of(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(body: &str) -> Request {
        http::Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_rule_failures_name_every_field() {
        let rejection = ValidatedJson::<Signup>::from_request(
            json_request(r#"{"email":"nope","password":"short"}"#),
            &(),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(rejection.0, "email: email; password: too short");

        let response = rejection.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_of(response).await;
        assert_eq!(body["error"], "invalid_request");
        assert_eq!(body["details"], "email: email; password: too short");
    }

    #[tokio::test]
    async fn test_malformed_json_is_invalid_request() {
        let response = ValidatedJson::<Signup>::from_request(json_request("{"), &())
            .await
            .err()
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_of(response).await["error"], "invalid_request");
    }

    #[tokio::test]
    async fn test_valid_body_passes_through() {
        let ValidatedJson(signup) = ValidatedJson::<Signup>::from_request(
            json_request(r#"{"email":"ada@example.com","password":"long enough"}"#),
            &(),
        )
        .await
        .ok()
        .unwrap();
        assert_eq!(signup.email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_query_is_validated() {
        let (mut parts, _) = http::Request::builder()
            .uri("/signup?email=nope&password=long+enough")
            .body(())
            .unwrap()
            .into_parts();
        let rejection = ValidatedQuery::<Signup>::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        assert_eq!(rejection.0, "email: email");
    }
}
