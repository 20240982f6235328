//! PostgreSQL implementation of the repositories.
//!
//! Queries are runtime-checked (`query_as::<_, T>`); timestamps come from the
//! service clock and are bound as parameters.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;

use super::store::{
    ClientRepository, EventRepository, ScopeRepository, SessionRepository, StoreHealth,
    UserRepository,
};
use super::ServiceError;
use crate::models::{
    AppScope, AuthSession, ClientApp, ClientAppPatch, EventLog, NewEvent, NewUser, ProfilePatch,
    Scope, ScopeDiff, ScopeSet, User,
};

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database wrapper from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StoreHealth for Database {
    async fn ping(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(db_err)
    }
}

fn db_err(e: sqlx::Error) -> ServiceError {
    ServiceError::Database(e)
}

fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

// ==================== Users ====================

#[async_trait]
impl UserRepository for Database {
    async fn insert_user(&self, user: &NewUser) -> Result<User, ServiceError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, name, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ServiceError::from_db(e, "Email already registered"))
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, ServiceError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn update_user_profile(
        &self,
        id: i64,
        patch: &ProfilePatch,
    ) -> Result<Option<User>, ServiceError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                name = CASE WHEN $2 THEN $3 ELSE name END,
                avatar = CASE WHEN $4 THEN $5 ELSE avatar END,
                phone = CASE WHEN $6 THEN $7 ELSE phone END,
                address = CASE WHEN $8 THEN $9 ELSE address END
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.name.is_some())
        .bind(patch.name.clone().flatten())
        .bind(patch.avatar.is_some())
        .bind(patch.avatar.clone().flatten())
        .bind(patch.phone.is_some())
        .bind(patch.phone.clone().flatten())
        .bind(patch.address.is_some())
        .bind(patch.address.clone().flatten())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn count_users(&self) -> Result<i64, ServiceError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }
}

// ==================== Client applications ====================

#[async_trait]
impl ClientRepository for Database {
    async fn insert_client(
        &self,
        app: &ClientApp,
        scopes: &ScopeSet,
    ) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            r#"
            INSERT INTO client_apps (client_id, client_secret_hash, name, description, redirect_uri, owner_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&app.client_id)
        .bind(&app.client_secret_hash)
        .bind(&app.name)
        .bind(&app.description)
        .bind(&app.redirect_uri)
        .bind(app.owner_id)
        .bind(app.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                ServiceError::Validation("Owner does not exist".to_string())
            } else {
                ServiceError::from_db(e, "Client id already exists")
            }
        })?;

        insert_grants(&mut tx, &app.client_id, scopes.iter()).await?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn find_client(&self, client_id: &str) -> Result<Option<ClientApp>, ServiceError> {
        sqlx::query_as::<_, ClientApp>("SELECT * FROM client_apps WHERE client_id = $1")
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn list_clients_by_owner(&self, owner_id: i64) -> Result<Vec<ClientApp>, ServiceError> {
        sqlx::query_as::<_, ClientApp>(
            "SELECT * FROM client_apps WHERE owner_id = $1 ORDER BY created_at, client_id",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn client_scopes(&self, client_id: &str) -> Result<ScopeSet, ServiceError> {
        let grants = sqlx::query_as::<_, AppScope>(
            "SELECT app_id, scope_id FROM app_scopes WHERE app_id = $1",
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(grants.into_iter().map(|g| g.scope_id).collect())
    }

    async fn update_client(
        &self,
        client_id: &str,
        patch: &ClientAppPatch,
        new_secret_hash: Option<&str>,
    ) -> Result<Option<(ClientApp, ScopeDiff)>, ServiceError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // Row lock serialises concurrent updates of the same app.
        let app = sqlx::query_as::<_, ClientApp>(
            r#"
            UPDATE client_apps SET
                name = COALESCE($2, name),
                description = CASE WHEN $3 THEN $4 ELSE description END,
                redirect_uri = COALESCE($5, redirect_uri),
                client_secret_hash = COALESCE($6, client_secret_hash)
            WHERE client_id = $1
            RETURNING *
            "#,
        )
        .bind(client_id)
        .bind(&patch.name)
        .bind(patch.description.is_some())
        .bind(patch.description.clone().flatten())
        .bind(&patch.redirect_uri)
        .bind(new_secret_hash)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let Some(app) = app else {
            return Ok(None);
        };

        let diff = match &patch.scopes {
            Some(desired) => {
                let current: ScopeSet = sqlx::query_as::<_, AppScope>(
                    "SELECT app_id, scope_id FROM app_scopes WHERE app_id = $1",
                )
                .bind(client_id)
                .fetch_all(&mut *tx)
                .await
                .map_err(db_err)?
                .into_iter()
                .map(|g| g.scope_id)
                .collect();

                let diff = ScopeDiff::between(&current, desired);
                if !diff.removed.is_empty() {
                    sqlx::query("DELETE FROM app_scopes WHERE app_id = $1 AND scope_id = ANY($2)")
                        .bind(client_id)
                        .bind(&diff.removed)
                        .execute(&mut *tx)
                        .await
                        .map_err(db_err)?;
                }
                insert_grants(&mut tx, client_id, diff.added.iter()).await?;
                diff
            }
            None => ScopeDiff::default(),
        };

        tx.commit().await.map_err(db_err)?;
        Ok(Some((app, diff)))
    }

    async fn delete_client(&self, client_id: &str) -> Result<bool, ServiceError> {
        // app_scopes and auth_sessions cascade.
        let result = sqlx::query("DELETE FROM client_apps WHERE client_id = $1")
            .bind(client_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn strip_client_scopes(&self, client_id: &str) -> Result<u64, ServiceError> {
        let result = sqlx::query("DELETE FROM app_scopes WHERE app_id = $1")
            .bind(client_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    async fn count_clients(&self) -> Result<i64, ServiceError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM client_apps")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }
}

async fn insert_grants<'a>(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    client_id: &str,
    scopes: impl Iterator<Item = &'a String>,
) -> Result<(), ServiceError> {
    for scope in scopes {
        sqlx::query("INSERT INTO app_scopes (app_id, scope_id) VALUES ($1, $2)")
            .bind(client_id)
            .bind(scope)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    ServiceError::Validation(format!("Unknown scope: {}", scope))
                } else {
                    db_err(e)
                }
            })?;
    }
    Ok(())
}

// ==================== Scope catalog ====================

#[async_trait]
impl ScopeRepository for Database {
    async fn list_scopes(&self) -> Result<Vec<Scope>, ServiceError> {
        sqlx::query_as::<_, Scope>("SELECT id, description, category FROM scopes ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)
    }
}

// ==================== Authorization sessions ====================

#[async_trait]
impl SessionRepository for Database {
    async fn insert_session(&self, session: &AuthSession) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO auth_sessions (code, user_id, client_id, scope, expires_at, used)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&session.code)
        .bind(session.user_id)
        .bind(&session.client_id)
        .bind(&session.scope)
        .bind(session.expires_at)
        .bind(session.used)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                ServiceError::NotFound("Client".to_string())
            } else {
                ServiceError::from_db(e, "Authorization code collision")
            }
        })?;
        Ok(())
    }

    async fn consume_session(
        &self,
        code: &str,
        client_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthSession>, ServiceError> {
        // Single statement check-and-set; concurrent callers serialise on the row.
        sqlx::query_as::<_, AuthSession>(
            r#"
            UPDATE auth_sessions SET used = TRUE
            WHERE code = $1
              AND used = FALSE
              AND expires_at > $2
              AND ($3::TEXT IS NULL OR client_id = $3)
            RETURNING *
            "#,
        )
        .bind(code)
        .bind(now)
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn find_session(&self, code: &str) -> Result<Option<AuthSession>, ServiceError> {
        sqlx::query_as::<_, AuthSession>("SELECT * FROM auth_sessions WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn sessions_for_user(&self, user_id: i64) -> Result<Vec<AuthSession>, ServiceError> {
        sqlx::query_as::<_, AuthSession>(
            "SELECT * FROM auth_sessions WHERE user_id = $1 ORDER BY expires_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn delete_sessions(&self, user_id: i64, client_id: &str) -> Result<u64, ServiceError> {
        let result =
            sqlx::query("DELETE FROM auth_sessions WHERE user_id = $1 AND client_id = $2")
                .bind(user_id)
                .bind(client_id)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    async fn count_sessions(&self) -> Result<i64, ServiceError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM auth_sessions")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }
}

// ==================== Event log ====================

#[async_trait]
impl EventRepository for Database {
    async fn insert_event(&self, event: &NewEvent) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO event_logs (event_type, user_id, client_id, description, ip, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.event_type.as_str())
        .bind(event.user_id)
        .bind(&event.client_id)
        .bind(&event.description)
        .bind(&event.ip)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn recent_events(&self, limit: i64) -> Result<Vec<EventLog>, ServiceError> {
        sqlx::query_as::<_, EventLog>(
            "SELECT * FROM event_logs ORDER BY created_at DESC, id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn events_by_ip(&self) -> Result<Vec<(Option<String>, i64)>, ServiceError> {
        sqlx::query_as::<_, (Option<String>, i64)>(
            "SELECT ip, COUNT(*) FROM event_logs GROUP BY ip ORDER BY COUNT(*) DESC, ip",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }
}
