//! Authorization code ledger.
//!
//! A code is `issued` until it is either consumed (once) or passes its
//! expiry. Consumption is a single check-and-set in the store.

use chrono::Duration;
use std::sync::Arc;

use super::clock::Clock;
use super::store::SessionRepository;
use super::ServiceError;
use crate::models::{AuthSession, RejectReason};
use crate::utils::generate_token;

/// Bytes of randomness per code (256 bits).
const CODE_BYTES: usize = 32;
const ISSUE_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct SessionLedger {
    sessions: Arc<dyn SessionRepository>,
    clock: Arc<dyn Clock>,
}

impl SessionLedger {
    pub fn new(sessions: Arc<dyn SessionRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { sessions, clock }
    }

    /// Store a fresh code valid for `ttl` and return it.
    pub async fn issue(
        &self,
        user_id: i64,
        client_id: &str,
        scope: &str,
        ttl: Duration,
    ) -> Result<AuthSession, ServiceError> {
        let expires_at = self.clock.now() + ttl;

        for attempt in 1..=ISSUE_ATTEMPTS {
            let session = AuthSession::new(
                generate_token(CODE_BYTES),
                user_id,
                client_id.to_string(),
                scope.to_string(),
                expires_at,
            );
            match self.sessions.insert_session(&session).await {
                Ok(()) => return Ok(session),
                Err(ServiceError::Conflict(_)) => {
                    tracing::warn!(attempt, "Authorization code collision, regenerating");
                }
                Err(e) => return Err(e),
            }
        }

        Err(ServiceError::Internal(anyhow::anyhow!(
            "Could not allocate a unique authorization code"
        )))
    }

    /// Redeem a code regardless of which client it was issued to.
    pub async fn consume(&self, code: &str) -> Result<AuthSession, ServiceError> {
        self.redeem(code, None).await
    }

    /// Redeem a code on behalf of `client_id`. A code issued to another client
    /// is rejected without being used up.
    pub async fn consume_for_client(
        &self,
        code: &str,
        client_id: &str,
    ) -> Result<AuthSession, ServiceError> {
        self.redeem(code, Some(client_id)).await
    }

    /// Why a code was rejected, for diagnostics only.
    pub async fn reject_reason(
        &self,
        code: &str,
        client_id: Option<&str>,
    ) -> Result<RejectReason, ServiceError> {
        Ok(match self.sessions.find_session(code).await? {
            Some(session) => session.reject_reason(client_id, self.clock.now()),
            None => RejectReason::Unknown,
        })
    }

    async fn redeem(
        &self,
        code: &str,
        client_id: Option<&str>,
    ) -> Result<AuthSession, ServiceError> {
        if code.is_empty() {
            return Err(ServiceError::InvalidGrant);
        }

        let now = self.clock.now();
        match self.sessions.consume_session(code, client_id, now).await? {
            Some(session) => Ok(session),
            None => Err(ServiceError::InvalidGrant),
        }
    }

    /// Sessions for a user, latest expiry first.
    pub async fn history(&self, user_id: i64) -> Result<Vec<AuthSession>, ServiceError> {
        self.sessions.sessions_for_user(user_id).await
    }

    /// Delete every session for the pair; returns how many were removed.
    pub async fn revoke(&self, user_id: i64, client_id: &str) -> Result<u64, ServiceError> {
        self.sessions.delete_sessions(user_id, client_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClientApp, NewUser, ScopeSet};
    use crate::services::clock::ManualClock;
    use crate::services::memory::MemoryStore;
    use crate::services::store::{ClientRepository, UserRepository};
    use chrono::Utc;

    struct Fixture {
        ledger: SessionLedger,
        clock: Arc<ManualClock>,
        user_id: i64,
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

        for client_id in ["X", "Y"] {
            store
                .insert_client(
                    &ClientApp {
                        client_id: client_id.to_string(),
                        client_secret_hash: "digest".to_string(),
                        name: client_id.to_string(),
                        description: None,
                        redirect_uri: "https://app.example/cb".to_string(),
                        owner_id: user.id,
                        created_at: clock.now(),
                    },
                    &ScopeSet::parse("openid"),
                )
                .await
                .unwrap();
        }

        Fixture {
            ledger: SessionLedger::new(store, clock.clone()),
            clock,
            user_id: user.id,
        }
    }

    #[tokio::test]
    async fn test_code_is_consumable_once() {
        let f = fixture().await;
        let session = f
            .ledger
            .issue(f.user_id, "X", "openid", Duration::seconds(600))
            .await
            .unwrap();
        assert!(!session.used);
        assert!(session.code.len() >= 43);

        let consumed = f.ledger.consume(&session.code).await.unwrap();
        assert!(consumed.used);
        assert_eq!(consumed.user_id, f.user_id);

        assert!(matches!(
            f.ledger.consume(&session.code).await,
            Err(ServiceError::InvalidGrant)
        ));
        assert_eq!(
            f.ledger.reject_reason(&session.code, None).await.unwrap(),
            RejectReason::AlreadyUsed
        );
    }

    #[tokio::test]
    async fn test_expired_code_is_rejected() {
        let f = fixture().await;
        let session = f
            .ledger
            .issue(f.user_id, "X", "openid", Duration::seconds(600))
            .await
            .unwrap();

        f.clock.advance(Duration::seconds(600) + Duration::milliseconds(1));

        assert!(matches!(
            f.ledger.consume(&session.code).await,
            Err(ServiceError::InvalidGrant)
        ));
        assert_eq!(
            f.ledger.reject_reason(&session.code, None).await.unwrap(),
            RejectReason::Expired
        );
    }

    #[tokio::test]
    async fn test_wrong_client_does_not_burn_code() {
        let f = fixture().await;
        let session = f
            .ledger
            .issue(f.user_id, "X", "openid", Duration::seconds(600))
            .await
            .unwrap();

        assert!(matches!(
            f.ledger.consume_for_client(&session.code, "Y").await,
            Err(ServiceError::InvalidGrant)
        ));
        assert!(f
            .ledger
            .consume_for_client(&session.code, "X")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_unknown_and_empty_codes() {
        let f = fixture().await;
        assert!(matches!(
            f.ledger.consume("nope").await,
            Err(ServiceError::InvalidGrant)
        ));
        assert!(matches!(
            f.ledger.consume("").await,
            Err(ServiceError::InvalidGrant)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_consumption_has_one_winner() {
        let f = fixture().await;
        let session = f
            .ledger
            .issue(f.user_id, "X", "openid", Duration::seconds(600))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let ledger = f.ledger.clone();
            let code = session.code.clone();
            handles.push(tokio::spawn(async move {
                ledger.consume_for_client(&code, "X").await.is_ok()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_history_order_and_revoke() {
        let f = fixture().await;
        let short = f
            .ledger
            .issue(f.user_id, "X", "openid", Duration::seconds(60))
            .await
            .unwrap();
        let long = f
            .ledger
            .issue(f.user_id, "X", "openid", Duration::seconds(600))
            .await
            .unwrap();
        let other = f
            .ledger
            .issue(f.user_id, "Y", "openid", Duration::seconds(300))
            .await
            .unwrap();

        let history = f.ledger.history(f.user_id).await.unwrap();
        let codes: Vec<&str> = history.iter().map(|s| s.code.as_str()).collect();
        assert_eq!(codes, vec![long.code.as_str(), other.code.as_str(), short.code.as_str()]);

        assert_eq!(f.ledger.revoke(f.user_id, "X").await.unwrap(), 2);

        let history = f.ledger.history(f.user_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].client_id, "Y");
    }
}
