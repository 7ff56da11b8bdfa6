//! # PostgreSQL Store
//!
//! The primary [`Store`] implementation, grounded on the teacher's
//! `UserRepository` query idiom: parameterized `$n` binds, `RETURNING *`
//! on writes, unique-constraint violations mapped to `ApiError::Conflict`
//! by inspecting `db_err.constraint()`. `sessions.data` and
//! `sessions.command_history` are stored as `JSONB`; `key_values.value`
//! is `JSONB` too - the tagged [`crate::domain::Value`] type is the
//! in-process representation, `serde_json::Value` is the wire/storage
//! codec at this boundary (§9).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::errors::ApiError;
use sqlx::PgPool;
use uuid::Uuid;

use super::{DebugSnapshot, SessionInit, SessionPatch, Store};
use crate::domain::{KeyValue, NewUser, Role, Session, User, Value};

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    key: String,
    user_id: Option<Uuid>,
    username: Option<String>,
    role: Option<String>,
    current_area: String,
    command_history: serde_json::Value,
    data: serde_json::Value,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    client_addr: Option<String>,
    user_agent: Option<String>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        let command_history: Vec<String> = serde_json::from_value(row.command_history).unwrap_or_default();
        let data = serde_json::from_value(row.data).unwrap_or_default();
        Session {
            key: row.key,
            user_id: row.user_id,
            username: row.username,
            role: row.role.and_then(|r| r.parse().ok()),
            current_area: row.current_area,
            command_history,
            data,
            created_at: row.created_at,
            last_activity: row.last_activity,
            client_addr: row.client_addr,
            user_agent: row.user_agent,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct KvRow {
    app_id: String,
    key: String,
    user_id: Option<Uuid>,
    namespace: Option<String>,
    value: serde_json::Value,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<KvRow> for KeyValue {
    fn from(row: KvRow) -> Self {
        KeyValue {
            app_id: row.app_id,
            key: row.key,
            user_id: row.user_id,
            namespace: row.namespace,
            value: Value::from(row.value),
            expires_at: row.expires_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn db_error(e: sqlx::Error, conflict_resource: &str) -> ApiError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return ApiError::Conflict { resource: conflict_resource.to_string() };
        }
    }
    ApiError::DatabaseError(e)
}

/// PostgreSQL-backed [`Store`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn session_get(&self, key: &str) -> Result<Option<Session>, ApiError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            UPDATE sessions SET last_activity = NOW()
            WHERE key = $1
            RETURNING *
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error(e, "session"))?;

        Ok(row.map(Session::from))
    }

    async fn session_upsert(&self, key: &str, init: SessionInit) -> Result<Session, ApiError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            INSERT INTO sessions (key, current_area, command_history, data, client_addr, user_agent)
            VALUES ($1, 'main', '[]'::jsonb, '{}'::jsonb, $2, $3)
            ON CONFLICT (key) DO UPDATE SET key = EXCLUDED.key
            RETURNING *
            "#,
        )
        .bind(key)
        .bind(&init.client_addr)
        .bind(&init.user_agent)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error(e, "session"))?;

        Ok(Session::from(row))
    }

    async fn session_update(&self, key: &str, patch: SessionPatch) -> Result<Option<Session>, ApiError> {
        // Read-modify-write inside a transaction: the data merge and history
        // replace are computed in Rust, not SQL, to keep the merge semantics
        // (§4.3: merge `data` field-by-field) explicit and testable.
        let mut tx = self.pool.begin().await.map_err(ApiError::DatabaseError)?;

        let row = sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions WHERE key = $1 FOR UPDATE")
            .bind(key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(ApiError::DatabaseError)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut session = Session::from(row);

        if let Some(area) = patch.current_area {
            session.current_area = area;
        }
        if let Some(binding) = patch.user_binding {
            match binding {
                Some(b) => {
                    session.user_id = Some(b.user_id);
                    session.username = Some(b.username);
                    session.role = Some(b.role);
                }
                None => {
                    session.user_id = None;
                    session.username = None;
                    session.role = None;
                }
            }
        }
        if let Some(merge) = patch.data_merge {
            for (app_id, app_data) in merge {
                let entry = session.data.entry(app_id).or_default();
                for (k, v) in app_data {
                    entry.insert(k, v);
                }
            }
        }
        if let Some(history) = patch.command_history {
            session.command_history = history;
        }
        session.last_activity = Utc::now();

        let role_str = session.role.as_ref().map(Role::as_str);
        let history_json = serde_json::to_value(&session.command_history).unwrap_or_default();
        let data_json = serde_json::to_value(&session.data).unwrap_or_default();

        sqlx::query(
            r#"
            UPDATE sessions SET
                current_area = $2, user_id = $3, username = $4, role = $5,
                command_history = $6, data = $7, last_activity = NOW()
            WHERE key = $1
            "#,
        )
        .bind(key)
        .bind(&session.current_area)
        .bind(session.user_id)
        .bind(&session.username)
        .bind(role_str)
        .bind(&history_json)
        .bind(&data_json)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::DatabaseError)?;

        tx.commit().await.map_err(ApiError::DatabaseError)?;

        Ok(Some(session))
    }

    async fn session_delete(&self, key: &str) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM sessions WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)?;
        Ok(result.rows_affected() > 0)
    }

    async fn session_reap(&self, older_than: DateTime<Utc>) -> Result<u64, ApiError> {
        let result = sqlx::query("DELETE FROM sessions WHERE last_activity < $1")
            .bind(older_than)
            .execute(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)?;
        Ok(result.rows_affected())
    }

    async fn user_find_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username.to_lowercase())
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)?;
        Ok(user)
    }

    async fn user_find_by_id(&self, id: Uuid) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)?;
        Ok(user)
    }

    async fn user_find_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email.to_lowercase())
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)?;
        Ok(user)
    }

    async fn user_create(&self, new_user: NewUser) -> Result<User, ApiError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, display_name, email, password_hash, role, join_date)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_user.username.to_lowercase())
        .bind(&new_user.display_name)
        .bind(new_user.email.map(|e| e.to_lowercase()))
        .bind(&new_user.password_hash)
        .bind(new_user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error(e, "username"))?;

        Ok(user)
    }

    async fn user_update_last_login(&self, id: Uuid) -> Result<(), ApiError> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)?;
        Ok(())
    }

    async fn user_update_password(&self, id: Uuid, password_hash: &str) -> Result<(), ApiError> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)?;
        Ok(())
    }

    async fn kv_get(
        &self,
        app_id: &str,
        key: &str,
        user_id: Option<Uuid>,
        namespace: Option<&str>,
    ) -> Result<Option<KeyValue>, ApiError> {
        let row = sqlx::query_as::<_, KvRow>(
            r#"
            SELECT * FROM key_values
            WHERE app_id = $1 AND key = $2
              AND user_id IS NOT DISTINCT FROM $3
              AND namespace IS NOT DISTINCT FROM $4
              AND (expires_at IS NULL OR expires_at > NOW())
            "#,
        )
        .bind(app_id)
        .bind(key)
        .bind(user_id)
        .bind(namespace)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)?;

        Ok(row.map(KeyValue::from))
    }

    async fn kv_upsert(
        &self,
        app_id: &str,
        key: &str,
        user_id: Option<Uuid>,
        namespace: Option<&str>,
        value: Value,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<KeyValue, ApiError> {
        let json_value: serde_json::Value = value.into();

        let row = sqlx::query_as::<_, KvRow>(
            r#"
            INSERT INTO key_values (app_id, key, user_id, namespace, value, expires_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            ON CONFLICT (app_id, key, COALESCE(user_id, '00000000-0000-0000-0000-000000000000'), COALESCE(namespace, ''))
            DO UPDATE SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at, updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(app_id)
        .bind(key)
        .bind(user_id)
        .bind(namespace)
        .bind(&json_value)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)?;

        Ok(KeyValue::from(row))
    }

    async fn kv_delete(
        &self,
        app_id: &str,
        key: &str,
        user_id: Option<Uuid>,
        namespace: Option<&str>,
    ) -> Result<bool, ApiError> {
        let result = sqlx::query(
            r#"
            DELETE FROM key_values
            WHERE app_id = $1 AND key = $2
              AND user_id IS NOT DISTINCT FROM $3
              AND namespace IS NOT DISTINCT FROM $4
            "#,
        )
        .bind(app_id)
        .bind(key)
        .bind(user_id)
        .bind(namespace)
        .execute(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)?;

        Ok(result.rows_affected() > 0)
    }

    async fn debug_dump(&self) -> Result<DebugSnapshot, ApiError> {
        let session_count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sessions").fetch_one(&self.pool).await.map_err(ApiError::DatabaseError)?;
        let user_count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users").fetch_one(&self.pool).await.map_err(ApiError::DatabaseError)?;
        let kv_count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM key_values").fetch_one(&self.pool).await.map_err(ApiError::DatabaseError)?;
        let sample: Vec<(String,)> = sqlx::query_as("SELECT key FROM sessions ORDER BY last_activity DESC LIMIT 10")
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)?;

        Ok(DebugSnapshot {
            session_count: session_count.0 as u64,
            user_count: user_count.0 as u64,
            kv_count: kv_count.0 as u64,
            sample_session_keys: sample.into_iter().map(|(k,)| k).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    // Exercising PgStore requires a live Postgres instance (the migration
    // in `migrations/` provisions the schema); covered by the deployment's
    // integration suite. `InMemoryStore`'s unit tests cover the trait's
    // behavioral contract.
}
