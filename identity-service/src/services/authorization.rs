//! Authorization code grant: issuing codes to signed-in users and trading
//! them for delegated access tokens.

use chrono::Duration;
use std::sync::Arc;

use super::audit::{AuditEntry, AuditLog};
use super::clients::ClientRegistry;
use super::jwt::{TokenResponse, TokenService};
use super::ledger::SessionLedger;
use super::scopes::ScopeCatalog;
use super::store::UserRepository;
use super::ServiceError;
use crate::config::{OAuthConfig, ScopePolicy};
use crate::models::{EventType, ScopeSet};

/// A freshly issued code and where the user agent should be sent with it.
#[derive(Debug, Clone)]
pub struct AuthorizationGrant {
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub expires_in: i64,
}

impl AuthorizationGrant {
    /// Redirect target carrying the code and, when present, the caller's state.
    pub fn redirect_url(&self, state: Option<&str>) -> String {
        let separator = if self.redirect_uri.contains('?') { '&' } else { '?' };
        let mut url = format!(
            "{}{}code={}",
            self.redirect_uri,
            separator,
            urlencoding::encode(&self.code)
        );
        if let Some(state) = state.filter(|s| !s.is_empty()) {
            url.push_str("&state=");
            url.push_str(&urlencoding::encode(state));
        }
        url
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevocationSummary {
    pub sessions_removed: u64,
    pub scopes_stripped: u64,
}

#[derive(Clone)]
pub struct AuthorizationEngine {
    registry: ClientRegistry,
    catalog: ScopeCatalog,
    ledger: SessionLedger,
    tokens: TokenService,
    users: Arc<dyn UserRepository>,
    audit: AuditLog,
    policy: ScopePolicy,
    code_ttl: Duration,
    strip_scopes_on_revoke: bool,
}

impl AuthorizationEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &OAuthConfig,
        registry: ClientRegistry,
        catalog: ScopeCatalog,
        ledger: SessionLedger,
        tokens: TokenService,
        users: Arc<dyn UserRepository>,
        audit: AuditLog,
    ) -> Self {
        Self {
            registry,
            catalog,
            ledger,
            tokens,
            users,
            audit,
            policy: config.scope_policy,
            code_ttl: Duration::seconds(config.code_expiry_seconds),
            strip_scopes_on_revoke: config.strip_scopes_on_revoke,
        }
    }

    /// Issue a code for `user_id` on behalf of `client_id`.
    #[tracing::instrument(skip(self, ip))]
    pub async fn authorize(
        &self,
        user_id: i64,
        client_id: &str,
        requested_scope: &str,
        redirect_uri: Option<&str>,
        ip: Option<&str>,
    ) -> Result<AuthorizationGrant, ServiceError> {
        match self
            .issue_code(user_id, client_id, requested_scope, redirect_uri)
            .await
        {
            Ok(grant) => {
                metrics::counter!("oauth_codes_issued_total").increment(1);
                self.audit
                    .record(
                        AuditEntry::new(
                            EventType::AuthorizationRequested,
                            format!("code issued for scopes [{}]", grant.scope),
                        )
                        .user(user_id)
                        .client(client_id)
                        .ip(ip),
                    )
                    .await;
                Ok(grant)
            }
            Err(e) => {
                tracing::info!(error = %e, "Authorization denied");
                self.audit
                    .record(
                        AuditEntry::new(EventType::AuthorizationDenied, e.to_string())
                            .user(user_id)
                            .client(client_id)
                            .ip(ip),
                    )
                    .await;
                Err(e)
            }
        }
    }

    async fn issue_code(
        &self,
        user_id: i64,
        client_id: &str,
        requested_scope: &str,
        redirect_uri: Option<&str>,
    ) -> Result<AuthorizationGrant, ServiceError> {
        let app = self.registry.find(client_id).await?;

        if let Some(uri) = redirect_uri.filter(|u| !u.is_empty()) {
            if uri != app.redirect_uri {
                return Err(ServiceError::Validation(
                    "redirect_uri does not match the registered URI".to_string(),
                ));
            }
        }

        let granted = self.registry.granted_scopes(client_id).await?;
        let requested = ScopeSet::parse(requested_scope);
        let scope = if requested.is_empty() {
            granted
        } else {
            let allowed = match self.policy {
                ScopePolicy::Client => granted,
                ScopePolicy::Catalog => self.catalog.all().await?,
            };
            let missing = requested.missing_from(&allowed);
            if !missing.is_empty() {
                return Err(ServiceError::InvalidScope(missing.join(" ")));
            }
            requested
        };

        let scope = scope.to_string();
        let session = self
            .ledger
            .issue(user_id, client_id, &scope, self.code_ttl)
            .await?;

        Ok(AuthorizationGrant {
            code: session.code,
            client_id: app.client_id,
            redirect_uri: app.redirect_uri,
            scope,
            expires_in: self.code_ttl.num_seconds(),
        })
    }

    /// Trade a code for a delegated access token. Client credentials are
    /// checked before the code is touched, so a bad secret never burns it.
    #[tracing::instrument(skip(self, code, client_secret, ip))]
    pub async fn exchange(
        &self,
        code: &str,
        client_id: &str,
        client_secret: &str,
        redirect_uri: Option<&str>,
        ip: Option<&str>,
    ) -> Result<TokenResponse, ServiceError> {
        match self
            .redeem(code, client_id, client_secret, redirect_uri)
            .await
        {
            Ok((user_id, token)) => {
                metrics::counter!("oauth_tokens_issued_total").increment(1);
                self.audit
                    .record(
                        AuditEntry::new(
                            EventType::TokenIssued,
                            format!(
                                "delegated token for scopes [{}]",
                                token.scope.as_deref().unwrap_or_default()
                            ),
                        )
                        .user(user_id)
                        .client(client_id)
                        .ip(ip),
                    )
                    .await;
                Ok(token)
            }
            Err((reason, e)) => {
                metrics::counter!("oauth_exchange_failures_total", "reason" => reason)
                    .increment(1);
                tracing::info!(reason, "Token exchange failed");
                self.audit
                    .record(
                        AuditEntry::new(
                            EventType::TokenExchangeFailed,
                            format!("{}: {}", e, reason),
                        )
                        .client(client_id)
                        .ip(ip),
                    )
                    .await;
                Err(e)
            }
        }
    }

    async fn redeem(
        &self,
        code: &str,
        client_id: &str,
        client_secret: &str,
        redirect_uri: Option<&str>,
    ) -> Result<(i64, TokenResponse), (&'static str, ServiceError)> {
        let internal = |e: ServiceError| ("internal", e);

        if !self
            .registry
            .verify_secret(client_id, client_secret)
            .await
            .map_err(internal)?
        {
            return Err(("invalid_client", ServiceError::InvalidClient));
        }

        if let Some(uri) = redirect_uri.filter(|u| !u.is_empty()) {
            let app = self.registry.find(client_id).await.map_err(internal)?;
            if uri != app.redirect_uri {
                return Err(("redirect_mismatch", ServiceError::InvalidGrant));
            }
        }

        let session = match self.ledger.consume_for_client(code, client_id).await {
            Ok(session) => session,
            Err(ServiceError::InvalidGrant) => {
                let reason = self
                    .ledger
                    .reject_reason(code, Some(client_id))
                    .await
                    .map(|r| r.as_str())
                    .unwrap_or("unknown_code");
                return Err((reason, ServiceError::InvalidGrant));
            }
            Err(e) => return Err(internal(e)),
        };

        let user = self
            .users
            .find_user_by_id(session.user_id)
            .await
            .map_err(internal)?
            .ok_or(("unknown_subject", ServiceError::InvalidGrant))?;

        let token = self
            .tokens
            .issue_delegated_token(&user, client_id, &session.scope)
            .map_err(internal)?;
        Ok((user.id, token))
    }

    /// Withdraw everything `client_id` holds on behalf of `user_id`.
    #[tracing::instrument(skip(self, ip))]
    pub async fn revoke_access(
        &self,
        user_id: i64,
        client_id: &str,
        ip: Option<&str>,
    ) -> Result<RevocationSummary, ServiceError> {
        self.registry.find(client_id).await?;

        let sessions_removed = self.ledger.revoke(user_id, client_id).await?;
        let scopes_stripped = if self.strip_scopes_on_revoke {
            self.registry.strip_scopes(client_id).await?
        } else {
            0
        };

        tracing::info!(sessions_removed, scopes_stripped, "Access revoked");
        self.audit
            .record(
                AuditEntry::new(
                    EventType::AccessRevoked,
                    format!(
                        "removed {} sessions, stripped {} scopes",
                        sessions_removed, scopes_stripped
                    ),
                )
                .user(user_id)
                .client(client_id)
                .ip(ip),
            )
            .await;

        Ok(RevocationSummary {
            sessions_removed,
            scopes_stripped,
        })
    }
}
