use std::sync::Arc;

use super::store::ScopeRepository;
use super::ServiceError;
use crate::models::{Scope, ScopeSet};

/// Read-only view of the permission catalog.
#[derive(Clone)]
pub struct ScopeCatalog {
    scopes: Arc<dyn ScopeRepository>,
}

impl ScopeCatalog {
    pub fn new(scopes: Arc<dyn ScopeRepository>) -> Self {
        Self { scopes }
    }

    pub async fn list(&self) -> Result<Vec<Scope>, ServiceError> {
        self.scopes.list_scopes().await
    }

    pub async fn all(&self) -> Result<ScopeSet, ServiceError> {
        Ok(self.list().await?.into_iter().map(|s| s.id).collect())
    }

    /// Fails with a validation error naming the first unknown scope.
    pub async fn ensure_known(&self, requested: &ScopeSet) -> Result<(), ServiceError> {
        let known = self.all().await?;
        match requested.missing_from(&known).first() {
            Some(unknown) => Err(ServiceError::Validation(format!("Unknown scope: {}", unknown))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory::MemoryStore;

    #[tokio::test]
    async fn test_ensure_known() {
        let catalog = ScopeCatalog::new(Arc::new(MemoryStore::new()));

        assert!(catalog
            .ensure_known(&ScopeSet::parse("openid documents:read"))
            .await
            .is_ok());

        let err = catalog
            .ensure_known(&ScopeSet::parse("openid mind:read"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(msg) if msg.contains("mind:read")));
    }

    #[tokio::test]
    async fn test_list_returns_seeded_catalog() {
        let catalog = ScopeCatalog::new(Arc::new(MemoryStore::new()));
        let all = catalog.all().await.unwrap();
        assert!(all.contains("openid"));
        assert!(all.contains("location"));
    }
}
