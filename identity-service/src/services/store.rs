//! Repository seams over the relational store.
//!
//! Every method that must be atomic is a single call here, so the backing
//! store (one SQL statement or transaction, or one lock in memory) owns the
//! atomicity rather than the caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::ServiceError;
use crate::models::{
    AuthSession, ClientApp, ClientAppPatch, EventLog, NewEvent, NewUser, ProfilePatch, Scope,
    ScopeDiff, ScopeSet, User,
};

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the email is taken.
    async fn insert_user(&self, user: &NewUser) -> Result<User, ServiceError>;
    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, ServiceError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError>;
    async fn update_user_profile(
        &self,
        id: i64,
        patch: &ProfilePatch,
    ) -> Result<Option<User>, ServiceError>;
    async fn count_users(&self) -> Result<i64, ServiceError>;
}

#[async_trait]
pub trait ClientRepository: Send + Sync {
    /// Inserts the app and its scope grants in one transaction.
    async fn insert_client(&self, app: &ClientApp, scopes: &ScopeSet)
        -> Result<(), ServiceError>;
    async fn find_client(&self, client_id: &str) -> Result<Option<ClientApp>, ServiceError>;
    async fn list_clients_by_owner(&self, owner_id: i64) -> Result<Vec<ClientApp>, ServiceError>;
    async fn client_scopes(&self, client_id: &str) -> Result<ScopeSet, ServiceError>;
    /// Applies the patch, an optional new secret digest and the scope set-diff
    /// in one transaction. `None` when the app does not exist.
    async fn update_client(
        &self,
        client_id: &str,
        patch: &ClientAppPatch,
        new_secret_hash: Option<&str>,
    ) -> Result<Option<(ClientApp, ScopeDiff)>, ServiceError>;
    /// Removes the app together with its grants and sessions. False when absent.
    async fn delete_client(&self, client_id: &str) -> Result<bool, ServiceError>;
    /// Drops every scope grant of the app; returns how many were removed.
    async fn strip_client_scopes(&self, client_id: &str) -> Result<u64, ServiceError>;
    async fn count_clients(&self) -> Result<i64, ServiceError>;
}

#[async_trait]
pub trait ScopeRepository: Send + Sync {
    async fn list_scopes(&self) -> Result<Vec<Scope>, ServiceError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Fails with `Conflict` on a code collision.
    async fn insert_session(&self, session: &AuthSession) -> Result<(), ServiceError>;
    /// Atomic check-and-set: flips `used` when the code exists, is unused,
    /// `now < expires_at`, and (if given) belongs to `client_id`.
    async fn consume_session(
        &self,
        code: &str,
        client_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthSession>, ServiceError>;
    async fn find_session(&self, code: &str) -> Result<Option<AuthSession>, ServiceError>;
    /// Ordered by `expires_at` descending.
    async fn sessions_for_user(&self, user_id: i64) -> Result<Vec<AuthSession>, ServiceError>;
    async fn delete_sessions(&self, user_id: i64, client_id: &str) -> Result<u64, ServiceError>;
    async fn count_sessions(&self) -> Result<i64, ServiceError>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn insert_event(&self, event: &NewEvent) -> Result<(), ServiceError>;
    /// Newest first.
    async fn recent_events(&self, limit: i64) -> Result<Vec<EventLog>, ServiceError>;
    /// Event counts per origin IP, busiest first.
    async fn events_by_ip(&self) -> Result<Vec<(Option<String>, i64)>, ServiceError>;
}

#[async_trait]
pub trait StoreHealth: Send + Sync {
    /// Cheap round trip proving the store answers.
    async fn ping(&self) -> Result<(), ServiceError>;
}

/// Handles to every repository, shared by the services.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub clients: Arc<dyn ClientRepository>,
    pub scopes: Arc<dyn ScopeRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub events: Arc<dyn EventRepository>,
    pub health: Arc<dyn StoreHealth>,
}

impl Repositories {
    /// Backs every repository with one store.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: UserRepository
            + ClientRepository
            + ScopeRepository
            + SessionRepository
            + EventRepository
            + StoreHealth
            + 'static,
    {
        Self {
            users: store.clone(),
            clients: store.clone(),
            scopes: store.clone(),
            sessions: store.clone(),
            events: store.clone(),
            health: store,
        }
    }
}
