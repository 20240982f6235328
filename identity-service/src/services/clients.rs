//! Registry of third-party client applications.

use std::sync::Arc;

use super::audit::{AuditEntry, AuditLog};
use super::clock::Clock;
use super::scopes::ScopeCatalog;
use super::store::{ClientRepository, UserRepository};
use super::ServiceError;
use crate::models::{ClientApp, ClientAppPatch, ClientAppView, EventType, ScopeDiff, ScopeSet};
use crate::utils::{digest_secret, generate_token, secrets_match};

/// 128-bit public identifier.
const CLIENT_ID_BYTES: usize = 16;
/// 256-bit secret.
const CLIENT_SECRET_BYTES: usize = 32;

/// Input for registering an application.
#[derive(Debug, Clone)]
pub struct NewClient {
    pub owner_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub redirect_uri: String,
    pub scopes: ScopeSet,
}

/// Result of a registration; the only time the plaintext secret is visible.
#[derive(Debug, Clone)]
pub struct RegisteredClient {
    pub app: ClientAppView,
    pub client_secret: String,
}

/// Result of an update; carries the new secret when it was rotated.
#[derive(Debug, Clone)]
pub struct UpdatedClient {
    pub app: ClientAppView,
    pub client_secret: Option<String>,
    pub scope_diff: ScopeDiff,
}

#[derive(Clone)]
pub struct ClientRegistry {
    clients: Arc<dyn ClientRepository>,
    users: Arc<dyn UserRepository>,
    catalog: ScopeCatalog,
    audit: AuditLog,
    clock: Arc<dyn Clock>,
    dummy_digest: String,
}

impl ClientRegistry {
    pub fn new(
        clients: Arc<dyn ClientRepository>,
        users: Arc<dyn UserRepository>,
        catalog: ScopeCatalog,
        audit: AuditLog,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            clients,
            users,
            catalog,
            audit,
            clock,
            dummy_digest: digest_secret(&generate_token(CLIENT_SECRET_BYTES)),
        }
    }

    #[tracing::instrument(skip(self, new), fields(owner_id = new.owner_id))]
    pub async fn register(
        &self,
        new: NewClient,
        ip: Option<&str>,
    ) -> Result<RegisteredClient, ServiceError> {
        let name = required("name", &new.name)?;
        let redirect_uri = validate_redirect_uri(&new.redirect_uri)?;

        if self.users.find_user_by_id(new.owner_id).await?.is_none() {
            return Err(ServiceError::Validation("Owner does not exist".to_string()));
        }
        self.catalog.ensure_known(&new.scopes).await?;

        let client_secret = generate_token(CLIENT_SECRET_BYTES);
        let app = ClientApp {
            client_id: generate_token(CLIENT_ID_BYTES),
            client_secret_hash: digest_secret(&client_secret),
            name,
            description: new.description.filter(|d| !d.trim().is_empty()),
            redirect_uri,
            owner_id: new.owner_id,
            created_at: self.clock.now(),
        };

        self.clients.insert_client(&app, &new.scopes).await?;

        tracing::info!(client_id = %app.client_id, "Client application registered");
        self.audit
            .record(
                AuditEntry::new(
                    EventType::ClientRegistered,
                    format!("registered app '{}' with scopes [{}]", app.name, new.scopes),
                )
                .user(app.owner_id)
                .client(app.client_id.clone())
                .ip(ip),
            )
            .await;

        Ok(RegisteredClient {
            app: ClientAppView::new(app, new.scopes),
            client_secret,
        })
    }

    /// Apps owned by `owner_id`, oldest first.
    pub async fn list(&self, owner_id: i64) -> Result<Vec<ClientAppView>, ServiceError> {
        let apps = self.clients.list_clients_by_owner(owner_id).await?;
        let mut views = Vec::with_capacity(apps.len());
        for app in apps {
            let scopes = self.clients.client_scopes(&app.client_id).await?;
            views.push(ClientAppView::new(app, scopes));
        }
        Ok(views)
    }

    pub async fn find(&self, client_id: &str) -> Result<ClientApp, ServiceError> {
        self.clients
            .find_client(client_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Client".to_string()))
    }

    pub async fn get(&self, client_id: &str) -> Result<ClientAppView, ServiceError> {
        let app = self.find(client_id).await?;
        let scopes = self.clients.client_scopes(client_id).await?;
        Ok(ClientAppView::new(app, scopes))
    }

    /// Same as `get`, but another owner's app reads as absent.
    pub async fn owned_by(
        &self,
        client_id: &str,
        owner_id: i64,
    ) -> Result<ClientAppView, ServiceError> {
        let view = self.get(client_id).await?;
        if view.owner_id != owner_id {
            return Err(ServiceError::NotFound("Client".to_string()));
        }
        Ok(view)
    }

    pub async fn granted_scopes(&self, client_id: &str) -> Result<ScopeSet, ServiceError> {
        self.clients.client_scopes(client_id).await
    }

    #[tracing::instrument(skip(self, patch))]
    pub async fn update(
        &self,
        client_id: &str,
        mut patch: ClientAppPatch,
        regenerate_secret: bool,
        ip: Option<&str>,
    ) -> Result<UpdatedClient, ServiceError> {
        if let Some(name) = &patch.name {
            patch.name = Some(required("name", name)?);
        }
        if let Some(uri) = &patch.redirect_uri {
            patch.redirect_uri = Some(validate_redirect_uri(uri)?);
        }
        if let Some(scopes) = &patch.scopes {
            self.catalog.ensure_known(scopes).await?;
        }

        let client_secret = regenerate_secret.then(|| generate_token(CLIENT_SECRET_BYTES));
        let secret_hash = client_secret.as_deref().map(digest_secret);

        let (app, scope_diff) = self
            .clients
            .update_client(client_id, &patch, secret_hash.as_deref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Client".to_string()))?;

        let owner_id = app.owner_id;
        self.audit
            .record(
                AuditEntry::new(
                    EventType::ClientUpdated,
                    format!("updated app '{}'; {}", app.name, scope_diff.describe()),
                )
                .user(owner_id)
                .client(client_id)
                .ip(ip),
            )
            .await;
        if client_secret.is_some() {
            tracing::info!(client_id, "Client secret rotated");
            self.audit
                .record(
                    AuditEntry::new(EventType::ClientSecretRotated, "client secret regenerated")
                        .user(owner_id)
                        .client(client_id)
                        .ip(ip),
                )
                .await;
        }

        let scopes = self.clients.client_scopes(client_id).await?;
        Ok(UpdatedClient {
            app: ClientAppView::new(app, scopes),
            client_secret,
            scope_diff,
        })
    }

    /// Remove the app; its grants and sessions go with it.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, client_id: &str, ip: Option<&str>) -> Result<(), ServiceError> {
        let app = self.find(client_id).await?;
        if !self.clients.delete_client(client_id).await? {
            return Err(ServiceError::NotFound("Client".to_string()));
        }

        tracing::info!(client_id, "Client application deleted");
        self.audit
            .record(
                AuditEntry::new(
                    EventType::ClientDeleted,
                    format!("deleted app '{}'", app.name),
                )
                .user(app.owner_id)
                .client(client_id)
                .ip(ip),
            )
            .await;
        Ok(())
    }

    /// Constant-time check of a presented secret. Unknown clients still pay
    /// for a comparison against a dummy digest.
    pub async fn verify_secret(&self, client_id: &str, secret: &str) -> Result<bool, ServiceError> {
        let stored = self.clients.find_client(client_id).await?;
        let digest = stored
            .as_ref()
            .map(|app| app.client_secret_hash.as_str())
            .unwrap_or(self.dummy_digest.as_str());

        let matches = secrets_match(secret, digest);
        Ok(stored.is_some() && matches)
    }

    pub async fn strip_scopes(&self, client_id: &str) -> Result<u64, ServiceError> {
        self.clients.strip_client_scopes(client_id).await
    }
}

fn required(field: &str, value: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

/// Absolute URI with a scheme and no fragment.
fn validate_redirect_uri(value: &str) -> Result<String, ServiceError> {
    let uri = required("redirect_uri", value)?;
    let valid_scheme = uri
        .split_once("://")
        .map(|(scheme, rest)| {
            !scheme.is_empty()
                && !rest.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        })
        .unwrap_or(false);

    if !valid_scheme || uri.contains('#') || uri.chars().any(char::is_whitespace) {
        return Err(ServiceError::Validation(
            "redirect_uri must be an absolute URI without a fragment".to_string(),
        ));
    }
    Ok(uri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;
    use crate::services::clock::ManualClock;
    use crate::services::memory::MemoryStore;
    use crate::services::store::{EventRepository, SessionRepository};
    use crate::models::AuthSession;
    use chrono::{Duration, Utc};

    struct Fixture {
        registry: ClientRegistry,
        store: Arc<MemoryStore>,
        owner_id: i64,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));
        let owner = store
            .insert_user(&NewUser {
                email: "dev@example.com".to_string(),
                password_hash: "digest".to_string(),
                name: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let registry = ClientRegistry::new(
            store.clone(),
            store.clone(),
            ScopeCatalog::new(store.clone()),
            AuditLog::new(store.clone(), clock.clone()),
            clock,
        );
        Fixture {
            registry,
            store,
            owner_id: owner.id,
        }
    }

    fn new_client(owner_id: i64, scopes: &str) -> NewClient {
        NewClient {
            owner_id,
            name: "Notes".to_string(),
            description: Some("Note taking".to_string()),
            redirect_uri: "https://notes.example/callback".to_string(),
            scopes: ScopeSet::parse(scopes),
        }
    }

    #[tokio::test]
    async fn test_register_generates_credentials() {
        let f = fixture().await;
        let registered = f
            .registry
            .register(new_client(f.owner_id, "openid profile"), None)
            .await
            .unwrap();

        assert_eq!(registered.app.client_id.len(), 22);
        assert_eq!(registered.client_secret.len(), 43);
        assert_eq!(registered.app.scopes, vec!["openid", "profile"]);

        let stored = f.registry.find(&registered.app.client_id).await.unwrap();
        assert_ne!(stored.client_secret_hash, registered.client_secret);

        let events = f.store.recent_events(10).await.unwrap();
        assert_eq!(events[0].event_type, "client_registered");
    }

    #[tokio::test]
    async fn test_register_validation() {
        let f = fixture().await;

        let mut blank_name = new_client(f.owner_id, "openid");
        blank_name.name = "   ".to_string();
        assert!(matches!(
            f.registry.register(blank_name, None).await,
            Err(ServiceError::Validation(_))
        ));

        let mut relative = new_client(f.owner_id, "openid");
        relative.redirect_uri = "/callback".to_string();
        assert!(matches!(
            f.registry.register(relative, None).await,
            Err(ServiceError::Validation(_))
        ));

        assert!(matches!(
            f.registry.register(new_client(9_999, "openid"), None).await,
            Err(ServiceError::Validation(_))
        ));

        assert!(matches!(
            f.registry
                .register(new_client(f.owner_id, "openid root"), None)
                .await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_verify_secret() {
        let f = fixture().await;
        let registered = f
            .registry
            .register(new_client(f.owner_id, "openid"), None)
            .await
            .unwrap();
        let id = &registered.app.client_id;
        let secret = &registered.client_secret;

        assert!(f.registry.verify_secret(id, secret).await.unwrap());
        assert!(!f.registry.verify_secret(id, "").await.unwrap());
        assert!(!f
            .registry
            .verify_secret(id, &format!("{}{}", secret, "x".repeat(4096)))
            .await
            .unwrap());
        assert!(!f.registry.verify_secret(id, &secret[..42]).await.unwrap());
        assert!(!f.registry.verify_secret("unknown", secret).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_rotates_secret_and_replaces_scopes() {
        let f = fixture().await;
        let registered = f
            .registry
            .register(new_client(f.owner_id, "openid profile"), None)
            .await
            .unwrap();
        let id = registered.app.client_id.clone();

        let updated = f
            .registry
            .update(
                &id,
                ClientAppPatch {
                    name: Some("Notes 2".to_string()),
                    scopes: Some(ScopeSet::parse("openid email")),
                    ..Default::default()
                },
                true,
                None,
            )
            .await
            .unwrap();

        assert_eq!(updated.app.name, "Notes 2");
        assert_eq!(updated.app.scopes, vec!["email", "openid"]);
        assert_eq!(updated.scope_diff.added, vec!["email".to_string()]);
        assert_eq!(updated.scope_diff.removed, vec!["profile".to_string()]);

        let new_secret = updated.client_secret.unwrap();
        assert!(f.registry.verify_secret(&id, &new_secret).await.unwrap());
        assert!(!f
            .registry
            .verify_secret(&id, &registered.client_secret)
            .await
            .unwrap());

        let events = f.store.recent_events(10).await.unwrap();
        assert_eq!(events[0].event_type, "client_secret_rotated");
        assert_eq!(events[1].event_type, "client_updated");
    }

    #[tokio::test]
    async fn test_update_and_delete_unknown_client() {
        let f = fixture().await;
        assert!(matches!(
            f.registry
                .update("missing", ClientAppPatch::default(), false, None)
                .await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            f.registry.delete("missing", None).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_cascades_sessions() {
        let f = fixture().await;
        let registered = f
            .registry
            .register(new_client(f.owner_id, "openid"), None)
            .await
            .unwrap();
        let id = registered.app.client_id.clone();
        f.store
            .insert_session(&AuthSession::new(
                "code-1".to_string(),
                f.owner_id,
                id.clone(),
                "openid".to_string(),
                Utc::now() + Duration::seconds(600),
            ))
            .await
            .unwrap();

        f.registry.delete(&id, Some("127.0.0.1")).await.unwrap();

        assert!(f.store.find_session("code-1").await.unwrap().is_none());
        assert!(f.registry.list(f.owner_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_owned_by_hides_other_owners() {
        let f = fixture().await;
        let registered = f
            .registry
            .register(new_client(f.owner_id, "openid"), None)
            .await
            .unwrap();

        assert!(f
            .registry
            .owned_by(&registered.app.client_id, f.owner_id)
            .await
            .is_ok());
        assert!(matches!(
            f.registry
                .owned_by(&registered.app.client_id, f.owner_id + 1)
                .await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn test_redirect_uri_rules() {
        assert!(validate_redirect_uri("https://app.example/cb").is_ok());
        assert!(validate_redirect_uri("com.example.app://oauth").is_ok());
        assert!(validate_redirect_uri("app.example/cb").is_err());
        assert!(validate_redirect_uri("https://app.example/cb#frag").is_err());
        assert!(validate_redirect_uri("https://").is_err());
        assert!(validate_redirect_uri("").is_err());
    }
}
