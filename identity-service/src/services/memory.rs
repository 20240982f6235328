//! In-process store used by tests and local development.
//!
//! All tables sit behind one mutex; each repository call takes the lock once,
//! which makes every call atomic the same way a transaction would.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::store::{
    ClientRepository, EventRepository, ScopeRepository, SessionRepository, StoreHealth,
    UserRepository,
};
use super::ServiceError;
use crate::models::{
    AuthSession, ClientApp, ClientAppPatch, EventLog, NewEvent, NewUser, ProfilePatch, Scope,
    ScopeDiff, ScopeSet, User,
};

#[derive(Default)]
struct Tables {
    next_user_id: i64,
    users: BTreeMap<i64, User>,
    clients: HashMap<String, ClientApp>,
    app_scopes: BTreeSet<(String, String)>,
    scopes: BTreeMap<String, Scope>,
    sessions: HashMap<String, AuthSession>,
    next_event_id: i64,
    events: Vec<EventLog>,
}

impl Tables {
    fn scopes_of(&self, client_id: &str) -> ScopeSet {
        self.app_scopes
            .iter()
            .filter(|(app, _)| app == client_id)
            .map(|(_, scope)| scope.clone())
            .collect()
    }

    fn check_scopes_exist(&self, scopes: &ScopeSet) -> Result<(), ServiceError> {
        match scopes.iter().find(|s| !self.scopes.contains_key(*s)) {
            Some(unknown) => Err(ServiceError::Validation(format!("Unknown scope: {}", unknown))),
            None => Ok(()),
        }
    }
}

pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Empty store seeded with the default scope catalog.
    pub fn new() -> Self {
        Self::with_scopes(Scope::defaults())
    }

    pub fn with_scopes(scopes: Vec<Scope>) -> Self {
        let tables = Tables {
            next_user_id: 1,
            next_event_id: 1,
            scopes: scopes.into_iter().map(|s| (s.id.clone(), s)).collect(),
            ..Default::default()
        };
        Self {
            tables: Mutex::new(tables),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, ServiceError> {
        self.tables
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Store mutex poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert_user(&self, user: &NewUser) -> Result<User, ServiceError> {
        let mut tables = self.lock()?;
        if tables
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(ServiceError::Conflict("Email already registered".to_string()));
        }

        let id = tables.next_user_id;
        tables.next_user_id += 1;
        let created = User {
            id,
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            name: user.name.clone(),
            avatar: None,
            phone: None,
            address: None,
            created_at: user.created_at,
        };
        tables.users.insert(id, created.clone());
        Ok(created)
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, ServiceError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn update_user_profile(
        &self,
        id: i64,
        patch: &ProfilePatch,
    ) -> Result<Option<User>, ServiceError> {
        let mut tables = self.lock()?;
        Ok(tables.users.get_mut(&id).map(|user| {
            patch.apply(user);
            user.clone()
        }))
    }

    async fn count_users(&self) -> Result<i64, ServiceError> {
        Ok(self.lock()?.users.len() as i64)
    }
}

#[async_trait]
impl ClientRepository for MemoryStore {
    async fn insert_client(
        &self,
        app: &ClientApp,
        scopes: &ScopeSet,
    ) -> Result<(), ServiceError> {
        let mut tables = self.lock()?;
        if tables.clients.contains_key(&app.client_id) {
            return Err(ServiceError::Conflict("Client id already exists".to_string()));
        }
        if !tables.users.contains_key(&app.owner_id) {
            return Err(ServiceError::Validation("Owner does not exist".to_string()));
        }
        tables.check_scopes_exist(scopes)?;

        tables.clients.insert(app.client_id.clone(), app.clone());
        for scope in scopes.iter() {
            tables
                .app_scopes
                .insert((app.client_id.clone(), scope.clone()));
        }
        Ok(())
    }

    async fn find_client(&self, client_id: &str) -> Result<Option<ClientApp>, ServiceError> {
        Ok(self.lock()?.clients.get(client_id).cloned())
    }

    async fn list_clients_by_owner(&self, owner_id: i64) -> Result<Vec<ClientApp>, ServiceError> {
        let tables = self.lock()?;
        let mut apps: Vec<ClientApp> = tables
            .clients
            .values()
            .filter(|a| a.owner_id == owner_id)
            .cloned()
            .collect();
        apps.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.client_id.cmp(&b.client_id))
        });
        Ok(apps)
    }

    async fn client_scopes(&self, client_id: &str) -> Result<ScopeSet, ServiceError> {
        Ok(self.lock()?.scopes_of(client_id))
    }

    async fn update_client(
        &self,
        client_id: &str,
        patch: &ClientAppPatch,
        new_secret_hash: Option<&str>,
    ) -> Result<Option<(ClientApp, ScopeDiff)>, ServiceError> {
        let mut tables = self.lock()?;
        if !tables.clients.contains_key(client_id) {
            return Ok(None);
        }

        let diff = match &patch.scopes {
            Some(desired) => {
                tables.check_scopes_exist(desired)?;
                ScopeDiff::between(&tables.scopes_of(client_id), desired)
            }
            None => ScopeDiff::default(),
        };
        for removed in &diff.removed {
            tables
                .app_scopes
                .remove(&(client_id.to_string(), removed.clone()));
        }
        for added in &diff.added {
            tables
                .app_scopes
                .insert((client_id.to_string(), added.clone()));
        }

        let Some(app) = tables.clients.get_mut(client_id) else {
            return Ok(None);
        };
        patch.apply(app);
        if let Some(hash) = new_secret_hash {
            app.client_secret_hash = hash.to_string();
        }
        Ok(Some((app.clone(), diff)))
    }

    async fn delete_client(&self, client_id: &str) -> Result<bool, ServiceError> {
        let mut tables = self.lock()?;
        if tables.clients.remove(client_id).is_none() {
            return Ok(false);
        }
        tables.app_scopes.retain(|(app, _)| app != client_id);
        tables.sessions.retain(|_, s| s.client_id != client_id);
        Ok(true)
    }

    async fn strip_client_scopes(&self, client_id: &str) -> Result<u64, ServiceError> {
        let mut tables = self.lock()?;
        let before = tables.app_scopes.len();
        tables.app_scopes.retain(|(app, _)| app != client_id);
        Ok((before - tables.app_scopes.len()) as u64)
    }

    async fn count_clients(&self) -> Result<i64, ServiceError> {
        Ok(self.lock()?.clients.len() as i64)
    }
}

#[async_trait]
impl ScopeRepository for MemoryStore {
    async fn list_scopes(&self) -> Result<Vec<Scope>, ServiceError> {
        Ok(self.lock()?.scopes.values().cloned().collect())
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn insert_session(&self, session: &AuthSession) -> Result<(), ServiceError> {
        let mut tables = self.lock()?;
        if tables.sessions.contains_key(&session.code) {
            return Err(ServiceError::Conflict("Authorization code collision".to_string()));
        }
        if !tables.clients.contains_key(&session.client_id) {
            return Err(ServiceError::NotFound("Client".to_string()));
        }
        tables.sessions.insert(session.code.clone(), session.clone());
        Ok(())
    }

    async fn consume_session(
        &self,
        code: &str,
        client_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthSession>, ServiceError> {
        let mut tables = self.lock()?;
        let Some(session) = tables.sessions.get_mut(code) else {
            return Ok(None);
        };
        if client_id.is_some_and(|c| c != session.client_id) || !session.is_redeemable(now) {
            return Ok(None);
        }
        session.used = true;
        Ok(Some(session.clone()))
    }

    async fn find_session(&self, code: &str) -> Result<Option<AuthSession>, ServiceError> {
        Ok(self.lock()?.sessions.get(code).cloned())
    }

    async fn sessions_for_user(&self, user_id: i64) -> Result<Vec<AuthSession>, ServiceError> {
        let tables = self.lock()?;
        let mut sessions: Vec<AuthSession> = tables
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.expires_at.cmp(&a.expires_at));
        Ok(sessions)
    }

    async fn delete_sessions(&self, user_id: i64, client_id: &str) -> Result<u64, ServiceError> {
        let mut tables = self.lock()?;
        let before = tables.sessions.len();
        tables
            .sessions
            .retain(|_, s| !(s.user_id == user_id && s.client_id == client_id));
        Ok((before - tables.sessions.len()) as u64)
    }

    async fn count_sessions(&self) -> Result<i64, ServiceError> {
        Ok(self.lock()?.sessions.len() as i64)
    }
}

#[async_trait]
impl EventRepository for MemoryStore {
    async fn insert_event(&self, event: &NewEvent) -> Result<(), ServiceError> {
        let mut tables = self.lock()?;
        let id = tables.next_event_id;
        tables.next_event_id += 1;
        tables.events.push(EventLog {
            id,
            event_type: event.event_type.as_str().to_string(),
            user_id: event.user_id,
            client_id: event.client_id.clone(),
            description: event.description.clone(),
            ip: event.ip.clone(),
            created_at: event.created_at,
        });
        Ok(())
    }

    async fn recent_events(&self, limit: i64) -> Result<Vec<EventLog>, ServiceError> {
        let tables = self.lock()?;
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(tables.events.iter().rev().take(limit).cloned().collect())
    }

    async fn events_by_ip(&self) -> Result<Vec<(Option<String>, i64)>, ServiceError> {
        let tables = self.lock()?;
        let mut counts: BTreeMap<Option<String>, i64> = BTreeMap::new();
        for event in &tables.events {
            *counts.entry(event.ip.clone()).or_default() += 1;
        }
        let mut grouped: Vec<(Option<String>, i64)> = counts.into_iter().collect();
        grouped.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(grouped)
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> Result<(), ServiceError> {
        self.lock().map(|_| ())
    }
}
