use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use super::audit::AuditLog;
use super::store::Repositories;
use super::ServiceError;
use crate::models::EventLog;

pub const DEFAULT_EVENT_LIMIT: i64 = 100;
pub const MAX_EVENT_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IpCount {
    pub ip: Option<String>,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatsSnapshot {
    pub users: i64,
    pub apps: i64,
    pub authorizations: i64,
    pub geo: Vec<IpCount>,
}

/// Read-only aggregates over the store.
#[derive(Clone)]
pub struct StatsService {
    repos: Arc<Repositories>,
    audit: AuditLog,
}

impl StatsService {
    pub fn new(repos: Arc<Repositories>, audit: AuditLog) -> Self {
        Self { repos, audit }
    }

    pub async fn snapshot(&self) -> Result<StatsSnapshot, ServiceError> {
        let users = self.repos.users.count_users().await?;
        let apps = self.repos.clients.count_clients().await?;
        let authorizations = self.repos.sessions.count_sessions().await?;
        let geo = self
            .repos
            .events
            .events_by_ip()
            .await?
            .into_iter()
            .map(|(ip, count)| IpCount { ip, count })
            .collect();

        Ok(StatsSnapshot {
            users,
            apps,
            authorizations,
            geo,
        })
    }

    /// Latest events; `limit` defaults to 100 and is clamped to 1..=1000.
    pub async fn events(&self, limit: Option<i64>) -> Result<Vec<EventLog>, ServiceError> {
        let limit = limit
            .unwrap_or(DEFAULT_EVENT_LIMIT)
            .clamp(1, MAX_EVENT_LIMIT);
        self.audit.recent(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventType, NewEvent, NewUser};
    use crate::services::clock::SystemClock;
    use crate::services::memory::MemoryStore;
    use crate::services::store::{EventRepository, UserRepository};
    use chrono::Utc;

    fn service(store: Arc<MemoryStore>) -> StatsService {
        let repos = Repositories::from_store(store);
        let audit = AuditLog::new(repos.events.clone(), Arc::new(SystemClock));
        StatsService::new(Arc::new(repos), audit)
    }

    async fn event(store: &MemoryStore, ip: Option<&str>) {
        store
            .insert_event(&NewEvent {
                event_type: EventType::UserLogin,
                user_id: None,
                client_id: None,
                description: "login".to_string(),
                ip: ip.map(str::to_string),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_snapshot_counts_and_groups() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_user(&NewUser {
                email: "ada@example.com".to_string(),
                password_hash: "digest".to_string(),
                name: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        event(&store, Some("10.0.0.1")).await;
        event(&store, Some("10.0.0.1")).await;
        event(&store, Some("10.0.0.2")).await;

        let stats = service(store);
        let snapshot = stats.snapshot().await.unwrap();

        assert_eq!(snapshot.users, 1);
        assert_eq!(snapshot.apps, 0);
        assert_eq!(snapshot.authorizations, 0);
        assert_eq!(snapshot.geo[0].ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(snapshot.geo[0].count, 2);
        assert_eq!(snapshot.geo[1].count, 1);
    }

    #[tokio::test]
    async fn test_event_limit_is_clamped() {
        let store = Arc::new(MemoryStore::new());
        for _ in 0..3 {
            event(&store, None).await;
        }
        let stats = service(store);

        assert_eq!(stats.events(Some(0)).await.unwrap().len(), 1);
        assert_eq!(stats.events(Some(2)).await.unwrap().len(), 2);
        assert_eq!(stats.events(None).await.unwrap().len(), 3);
    }
}
