//! End-user accounts: registration, login and profile.

use std::sync::Arc;
use tokio::sync::OnceCell;

use super::audit::{AuditEntry, AuditLog};
use super::clock::Clock;
use super::jwt::{TokenResponse, TokenService};
use super::store::UserRepository;
use super::ServiceError;
use crate::models::{EventType, NewUser, ProfilePatch, User};
use crate::utils::{generate_token, CredentialHasher, Password, PasswordHashString};

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_EMAIL_LENGTH: usize = 255;

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn CredentialHasher>,
    tokens: TokenService,
    audit: AuditLog,
    clock: Arc<dyn Clock>,
    /// Verified against when the email is unknown, so both failures cost one hash check.
    dummy_hash: Arc<OnceCell<PasswordHashString>>,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        hasher: Arc<dyn CredentialHasher>,
        tokens: TokenService,
        audit: AuditLog,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            hasher,
            tokens,
            audit,
            clock,
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    #[tracing::instrument(skip(self, password))]
    pub async fn register(
        &self,
        email: &str,
        password: Password,
        name: Option<String>,
        ip: Option<&str>,
    ) -> Result<User, ServiceError> {
        let email = normalize_email(email)?;
        validate_password(&password)?;

        if self.users.find_user_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict("Email already registered".to_string()));
        }

        let password_hash = self.hash(password).await?;
        let user = self
            .users
            .insert_user(&NewUser {
                email,
                password_hash: password_hash.into_string(),
                name: name.filter(|n| !n.trim().is_empty()),
                created_at: self.clock.now(),
            })
            .await?;

        tracing::info!(user_id = user.id, "User registered");
        self.audit
            .record(
                AuditEntry::new(EventType::UserRegistered, format!("registered {}", user.email))
                    .user(user.id)
                    .ip(ip),
            )
            .await;

        Ok(user)
    }

    /// Unknown email and wrong password fail identically.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(
        &self,
        email: &str,
        password: Password,
        ip: Option<&str>,
    ) -> Result<TokenResponse, ServiceError> {
        let email = email.trim().to_lowercase();
        let user = self.users.find_user_by_email(&email).await?;

        let digest = match &user {
            Some(user) => PasswordHashString::new(user.password_hash.clone()),
            None => self.dummy_hash().await?,
        };
        let verified = self.verify(password, digest).await? && user.is_some();

        let user = match user {
            Some(user) if verified => user,
            other => {
                tracing::warn!("Login failed");
                let mut entry = AuditEntry::new(EventType::LoginFailed, "invalid credentials").ip(ip);
                if let Some(user) = other {
                    entry = entry.user(user.id);
                }
                self.audit.record(entry).await;
                return Err(ServiceError::InvalidCredentials);
            }
        };

        let token = self.tokens.issue_access_token(&user)?;
        self.audit
            .record(
                AuditEntry::new(EventType::UserLogin, "password login")
                    .user(user.id)
                    .ip(ip),
            )
            .await;
        Ok(token)
    }

    pub async fn profile(&self, user_id: i64) -> Result<User, ServiceError> {
        self.users
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User".to_string()))
    }

    #[tracing::instrument(skip(self, patch))]
    pub async fn update_profile(
        &self,
        user_id: i64,
        patch: ProfilePatch,
        ip: Option<&str>,
    ) -> Result<User, ServiceError> {
        if patch.is_empty() {
            return self.profile(user_id).await;
        }

        let user = self
            .users
            .update_user_profile(user_id, &patch)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User".to_string()))?;

        self.audit
            .record(
                AuditEntry::new(EventType::ProfileUpdated, "profile updated")
                    .user(user_id)
                    .ip(ip),
            )
            .await;
        Ok(user)
    }

    async fn hash(&self, password: Password) -> Result<PasswordHashString, ServiceError> {
        let hasher = self.hasher.clone();
        let digest = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| anyhow::anyhow!("Password hashing task failed: {}", e))??;
        Ok(digest)
    }

    async fn dummy_hash(&self) -> Result<PasswordHashString, ServiceError> {
        self.dummy_hash
            .get_or_try_init(|| self.hash(Password::new(generate_token(32))))
            .await
            .cloned()
    }

    async fn verify(
        &self,
        password: Password,
        digest: PasswordHashString,
    ) -> Result<bool, ServiceError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Password verification task failed: {}", e)))
    }
}

fn normalize_email(email: &str) -> Result<String, ServiceError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ServiceError::Validation("Email is required".to_string()));
    }
    let well_formed = email
        .split_once('@')
        .map(|(local, domain)| {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        })
        .unwrap_or(false);
    if !well_formed {
        return Err(ServiceError::Validation("Invalid email format".to_string()));
    }
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ServiceError::Validation("Email too long".to_string()));
    }
    Ok(email)
}

fn validate_password(password: &Password) -> Result<(), ServiceError> {
    if password.as_str().chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ServiceError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}
