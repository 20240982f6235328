use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::clock::Clock;
use super::store::UserRepository;
use super::ServiceError;
use crate::config::JwtConfig;
use crate::models::{ScopeSet, User};

/// Issues and validates HS256 bearer tokens with one process-wide secret.
/// Tokens are never stored; validity is signature plus expiry plus a live subject.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry_seconds: i64,
    users: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
}

/// Claims carried by every access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub jti: String,
    /// Application the token was delegated to; absent for first-party logins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Granted scopes, space separated; only on delegated tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl AccessTokenClaims {
    pub fn subject_id(&self) -> Result<i64, ServiceError> {
        self.sub.parse().map_err(|_| ServiceError::InvalidToken)
    }

    pub fn is_delegated(&self) -> bool {
        self.client_id.is_some()
    }

    pub fn scopes(&self) -> ScopeSet {
        self.scope.as_deref().map(ScopeSet::parse).unwrap_or_default()
    }
}

/// Token response returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenService {
    pub fn new(
        config: &JwtConfig,
        users: Arc<dyn UserRepository>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, anyhow::Error> {
        if config.secret.is_empty() {
            return Err(anyhow::anyhow!("JWT signing secret must not be empty"));
        }

        tracing::info!("Token service initialized with HS256 secret");

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            access_token_expiry_seconds: config.access_token_expiry_seconds,
            users,
            clock,
        })
    }

    /// First-party token for a user.
    pub fn issue_access_token(&self, user: &User) -> Result<TokenResponse, ServiceError> {
        self.sign(user, None, None)
    }

    /// Token delegated to `client_id` for `scope`.
    pub fn issue_delegated_token(
        &self,
        user: &User,
        client_id: &str,
        scope: &str,
    ) -> Result<TokenResponse, ServiceError> {
        self.sign(user, Some(client_id), Some(scope))
    }

    fn sign(
        &self,
        user: &User,
        client_id: Option<&str>,
        scope: Option<&str>,
    ) -> Result<TokenResponse, ServiceError> {
        let now = self.clock.now();
        let exp = now + Duration::seconds(self.access_token_expiry_seconds);

        let claims = AccessTokenClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            exp: ceil_seconds(exp),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            client_id: client_id.map(str::to_string),
            scope: scope.map(str::to_string),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode access token: {}", e))?;

        Ok(TokenResponse {
            access_token: token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry_seconds,
            scope: claims.scope,
        })
    }

    /// Signature and expiry only. Expiry is judged against the injected clock.
    pub fn decode(&self, token: &str) -> Result<AccessTokenClaims, ServiceError> {
        if token.trim().is_empty() {
            return Err(ServiceError::MissingToken);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected access token");
                match e.kind() {
                    ErrorKind::ExpiredSignature => ServiceError::TokenExpired,
                    _ => ServiceError::InvalidToken,
                }
            })?
            .claims;

        if claims.exp <= self.clock.now().timestamp() {
            return Err(ServiceError::TokenExpired);
        }

        Ok(claims)
    }

    /// Full validation: signature, expiry and that the subject still exists.
    pub async fn validate(&self, token: &str) -> Result<AccessTokenClaims, ServiceError> {
        let claims = self.decode(token)?;
        let user_id = claims.subject_id()?;

        if self.users.find_user_by_id(user_id).await?.is_none() {
            return Err(ServiceError::UnknownSubject);
        }

        Ok(claims)
    }
}

/// Whole seconds, rounded up so a token never expires before its TTL.
fn ceil_seconds(at: DateTime<Utc>) -> i64 {
    if at.timestamp_subsec_nanos() > 0 {
        at.timestamp() + 1
    } else {
        at.timestamp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;
    use crate::services::clock::ManualClock;
    use crate::services::memory::MemoryStore;
    use chrono::{TimeZone, Utc};

    const SECRET: &str = "test-secret-that-is-long-enough-for-hs256";

    struct Fixture {
        tokens: TokenService,
        clock: Arc<ManualClock>,
        user: User,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let user = store
            .insert_user(&NewUser {
                email: "ada@example.com".to_string(),
                password_hash: "digest".to_string(),
                name: None,
                created_at: clock.now(),
            })
            .await
            .unwrap();

        let tokens = TokenService::new(
            &JwtConfig {
                secret: SECRET.to_string(),
                access_token_expiry_seconds: 3600,
            },
            store,
            clock.clone(),
        )
        .unwrap();

        Fixture {
            tokens,
            clock,
            user,
        }
    }

    #[tokio::test]
    async fn test_round_trip_before_expiry() {
        let f = fixture().await;
        let issued = f.tokens.issue_access_token(&f.user).unwrap();
        assert_eq!(issued.token_type, "Bearer");
        assert_eq!(issued.expires_in, 3600);

        f.clock.advance(Duration::seconds(3599));
        let claims = f.tokens.validate(&issued.access_token).await.unwrap();
        assert_eq!(claims.subject_id().unwrap(), f.user.id);
        assert_eq!(claims.email, "ada@example.com");
        assert!(!claims.is_delegated());
    }

    #[tokio::test]
    async fn test_expired_after_ttl() {
        let f = fixture().await;
        let issued = f.tokens.issue_access_token(&f.user).unwrap();

        // `exp` is rounded up to a whole second.
        f.clock.advance(Duration::seconds(3601));
        let err = f.tokens.validate(&issued.access_token).await.unwrap_err();
        assert!(matches!(err, ServiceError::TokenExpired));
    }

    #[tokio::test]
    async fn test_fractional_issue_time_keeps_full_ttl() {
        let f = fixture().await;
        f.clock
            .set(Utc.timestamp_opt(1_700_000_000, 900_000_000).single().unwrap());
        let issued = f.tokens.issue_access_token(&f.user).unwrap();

        f.clock.advance(Duration::milliseconds(3_599_500));
        let claims = f.tokens.validate(&issued.access_token).await.unwrap();
        assert_eq!(claims.exp, 1_700_003_601);

        f.clock.advance(Duration::seconds(1));
        assert!(matches!(
            f.tokens.validate(&issued.access_token).await,
            Err(ServiceError::TokenExpired)
        ));
    }

    #[test]
    fn test_ceil_seconds() {
        let whole = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap();
        let fraction = Utc.timestamp_opt(1_700_000_000, 1).single().unwrap();
        assert_eq!(ceil_seconds(whole), 1_700_000_000);
        assert_eq!(ceil_seconds(fraction), 1_700_000_001);
    }

    #[tokio::test]
    async fn test_tampered_and_foreign_tokens_are_invalid() {
        let f = fixture().await;
        let issued = f.tokens.issue_access_token(&f.user).unwrap();

        let mut tampered = issued.access_token.clone();
        tampered.push('x');
        assert!(matches!(
            f.tokens.validate(&tampered).await,
            Err(ServiceError::InvalidToken)
        ));

        assert!(matches!(
            f.tokens.validate("not.a.jwt").await,
            Err(ServiceError::InvalidToken)
        ));
        assert!(matches!(
            f.tokens.validate("").await,
            Err(ServiceError::MissingToken)
        ));

        let other = TokenService::new(
            &JwtConfig {
                secret: "a-completely-different-signing-secret".to_string(),
                access_token_expiry_seconds: 3600,
            },
            Arc::new(MemoryStore::new()),
            f.clock.clone(),
        )
        .unwrap();
        let foreign = other.issue_access_token(&f.user).unwrap();
        assert!(matches!(
            f.tokens.validate(&foreign.access_token).await,
            Err(ServiceError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_unknown_subject() {
        let f = fixture().await;
        let ghost = User {
            id: 9_999,
            ..f.user.clone()
        };
        let issued = f.tokens.issue_access_token(&ghost).unwrap();

        assert!(matches!(
            f.tokens.validate(&issued.access_token).await,
            Err(ServiceError::UnknownSubject)
        ));
    }

    #[tokio::test]
    async fn test_delegated_token_carries_client_and_scope() {
        let f = fixture().await;
        let issued = f
            .tokens
            .issue_delegated_token(&f.user, "client-x", "openid email")
            .unwrap();
        assert_eq!(issued.scope.as_deref(), Some("openid email"));

        let claims = f.tokens.validate(&issued.access_token).await.unwrap();
        assert_eq!(claims.client_id.as_deref(), Some("client-x"));
        assert!(claims.scopes().contains("email"));
        assert!(!claims.scopes().contains("phone"));
    }

    #[test]
    fn test_empty_secret_rejected() {
        let result = TokenService::new(
            &JwtConfig {
                secret: String::new(),
                access_token_expiry_seconds: 60,
            },
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::default()),
        );
        assert!(result.is_err());
    }
}
