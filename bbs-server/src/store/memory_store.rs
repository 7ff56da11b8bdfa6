//! # In-Memory Store
//!
//! A `tokio::sync::RwLock`-guarded reference implementation of [`Store`].
//! Used by unit tests across the crate and by local development
//! (`STORE_BACKEND=memory`) where standing up Postgres is unwanted. It
//! enforces the same uniqueness and expiry semantics as [`super::pg_store::PgStore`] -
//! same contract, different substrate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::errors::ApiError;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use super::{DebugSnapshot, SessionInit, SessionPatch, Store};
use crate::domain::{KeyValue, NewUser, Session, User};

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct KvCompoundKey {
    app_id: String,
    key: String,
    user_id: Option<Uuid>,
    namespace: Option<String>,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<String, Session>,
    users_by_id: HashMap<Uuid, User>,
    kv: HashMap<KvCompoundKey, KeyValue>,
}

/// In-process, non-durable [`Store`] implementation.
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self { inner: RwLock::new(Inner::default()) }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn session_get(&self, key: &str) -> Result<Option<Session>, ApiError> {
        let mut guard = self.write();
        if let Some(session) = guard.sessions.get_mut(key) {
            session.last_activity = Utc::now();
            return Ok(Some(session.clone()));
        }
        Ok(None)
    }

    async fn session_upsert(&self, key: &str, init: SessionInit) -> Result<Session, ApiError> {
        let mut guard = self.write();
        if let Some(existing) = guard.sessions.get(key) {
            return Ok(existing.clone());
        }
        let session = Session::new(key.to_string(), init.client_addr, init.user_agent);
        guard.sessions.insert(key.to_string(), session.clone());
        Ok(session)
    }

    async fn session_update(&self, key: &str, patch: SessionPatch) -> Result<Option<Session>, ApiError> {
        let mut guard = self.write();
        let Some(session) = guard.sessions.get_mut(key) else {
            return Ok(None);
        };

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

        Ok(Some(session.clone()))
    }

    async fn session_delete(&self, key: &str) -> Result<bool, ApiError> {
        Ok(self.write().sessions.remove(key).is_some())
    }

    async fn session_reap(&self, older_than: DateTime<Utc>) -> Result<u64, ApiError> {
        let mut guard = self.write();
        let before = guard.sessions.len();
        guard.sessions.retain(|_, s| s.last_activity >= older_than);
        Ok((before - guard.sessions.len()) as u64)
    }

    async fn user_find_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
        let normalized = username.to_lowercase();
        Ok(self.read().users_by_id.values().find(|u| u.username == normalized).cloned())
    }

    async fn user_find_by_id(&self, id: Uuid) -> Result<Option<User>, ApiError> {
        Ok(self.read().users_by_id.get(&id).cloned())
    }

    async fn user_find_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let normalized = email.to_lowercase();
        Ok(self
            .read()
            .users_by_id
            .values()
            .find(|u| u.email.as_deref().map(str::to_lowercase).as_deref() == Some(normalized.as_str()))
            .cloned())
    }

    async fn user_create(&self, new_user: NewUser) -> Result<User, ApiError> {
        let username = new_user.username.to_lowercase();
        let email = new_user.email.map(|e| e.to_lowercase());

        let mut guard = self.write();
        if guard.users_by_id.values().any(|u| u.username == username) {
            return Err(ApiError::Conflict { resource: "username".to_string() });
        }
        if let Some(ref e) = email {
            if guard.users_by_id.values().any(|u| u.email.as_deref() == Some(e.as_str())) {
                return Err(ApiError::Conflict { resource: "email".to_string() });
            }
        }

        let user = User {
            id: Uuid::new_v4(),
            username,
            display_name: new_user.display_name,
            email,
            password_hash: new_user.password_hash,
            role: new_user.role.as_str().to_string(),
            join_date: Utc::now(),
            last_login: None,
            profile_settings: None,
        };
        guard.users_by_id.insert(user.id, user.clone());
        Ok(user)
    }

    async fn user_update_last_login(&self, id: Uuid) -> Result<(), ApiError> {
        if let Some(user) = self.write().users_by_id.get_mut(&id) {
            user.last_login = Some(Utc::now());
        }
        Ok(())
    }

    async fn user_update_password(&self, id: Uuid, password_hash: &str) -> Result<(), ApiError> {
        if let Some(user) = self.write().users_by_id.get_mut(&id) {
            user.password_hash = password_hash.to_string();
        }
        Ok(())
    }

    async fn kv_get(
        &self,
        app_id: &str,
        key: &str,
        user_id: Option<Uuid>,
        namespace: Option<&str>,
    ) -> Result<Option<KeyValue>, ApiError> {
        let compound = KvCompoundKey {
            app_id: app_id.to_string(),
            key: key.to_string(),
            user_id,
            namespace: namespace.map(str::to_string),
        };
        let guard = self.read();
        match guard.kv.get(&compound) {
            Some(kv) if !kv.is_expired(Utc::now()) => Ok(Some(kv.clone())),
            _ => Ok(None),
        }
    }

    async fn kv_upsert(
        &self,
        app_id: &str,
        key: &str,
        user_id: Option<Uuid>,
        namespace: Option<&str>,
        value: crate::domain::Value,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<KeyValue, ApiError> {
        let compound = KvCompoundKey {
            app_id: app_id.to_string(),
            key: key.to_string(),
            user_id,
            namespace: namespace.map(str::to_string),
        };
        let mut guard = self.write();
        let now = Utc::now();
        let created_at = guard.kv.get(&compound).map(|kv| kv.created_at).unwrap_or(now);
        let record = KeyValue {
            app_id: app_id.to_string(),
            key: key.to_string(),
            user_id,
            namespace: namespace.map(str::to_string),
            value,
            expires_at,
            created_at,
            updated_at: now,
        };
        guard.kv.insert(compound, record.clone());
        Ok(record)
    }

    async fn kv_delete(
        &self,
        app_id: &str,
        key: &str,
        user_id: Option<Uuid>,
        namespace: Option<&str>,
    ) -> Result<bool, ApiError> {
        let compound = KvCompoundKey {
            app_id: app_id.to_string(),
            key: key.to_string(),
            user_id,
            namespace: namespace.map(str::to_string),
        };
        Ok(self.write().kv.remove(&compound).is_some())
    }

    async fn debug_dump(&self) -> Result<DebugSnapshot, ApiError> {
        let guard = self.read();
        Ok(DebugSnapshot {
            session_count: guard.sessions.len() as u64,
            user_count: guard.users_by_id.len() as u64,
            kv_count: guard.kv.len() as u64,
            sample_session_keys: guard.sessions.keys().take(10).cloned().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;

    #[tokio::test]
    async fn session_upsert_is_idempotent_for_an_existing_key() {
        let store = InMemoryStore::new();
        let a = store.session_upsert("k1", SessionInit::default()).await.unwrap();
        let b = store.session_upsert("k1", SessionInit::default()).await.unwrap();
        assert_eq!(a.key, b.key);
        assert_eq!(a.created_at, b.created_at);
    }

    #[tokio::test]
    async fn kv_compound_key_isolates_by_namespace_and_user() {
        let store = InMemoryStore::new();
        store
            .kv_upsert("hangman", "score", None, None, crate::domain::Value::Number(1.0), None)
            .await
            .unwrap();
        store
            .kv_upsert(
                "hangman",
                "score",
                Some(Uuid::new_v4()),
                None,
                crate::domain::Value::Number(2.0),
                None,
            )
            .await
            .unwrap();

        let unscoped = store.kv_get("hangman", "score", None, None).await.unwrap().unwrap();
        assert_eq!(unscoped.value, crate::domain::Value::Number(1.0));
    }

    #[tokio::test]
    async fn expired_kv_is_not_returned() {
        let store = InMemoryStore::new();
        store
            .kv_upsert(
                "hangman",
                "temp",
                None,
                None,
                crate::domain::Value::Bool(true),
                Some(Utc::now() - chrono::Duration::seconds(1)),
            )
            .await
            .unwrap();
        assert!(store.kv_get("hangman", "temp", None, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn user_create_rejects_duplicate_username() {
        let store = InMemoryStore::new();
        let new_user = |name: &str| NewUser {
            username: name.to_string(),
            display_name: "Alice".into(),
            email: None,
            password_hash: "hash".into(),
            role: Role::User,
        };
        store.user_create(new_user("alice")).await.unwrap();
        let err = store.user_create(new_user("ALICE")).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict { .. }));
    }

    #[tokio::test]
    async fn session_update_merges_data_field_by_field() {
        let store = InMemoryStore::new();
        store.session_upsert("k1", SessionInit::default()).await.unwrap();

        let mut first = std::collections::HashMap::new();
        let mut app_map = std::collections::HashMap::new();
        app_map.insert("a".to_string(), crate::domain::Value::Number(1.0));
        first.insert("hangman".to_string(), app_map);
        store
            .session_update("k1", SessionPatch { data_merge: Some(first), ..Default::default() })
            .await
            .unwrap();

        let mut second = std::collections::HashMap::new();
        let mut app_map = std::collections::HashMap::new();
        app_map.insert("b".to_string(), crate::domain::Value::Number(2.0));
        second.insert("hangman".to_string(), app_map);
        let session = store
            .session_update("k1", SessionPatch { data_merge: Some(second), ..Default::default() })
            .await
            .unwrap()
            .unwrap();

        let hangman_data = &session.data["hangman"];
        assert_eq!(hangman_data.len(), 2);
        assert_eq!(hangman_data["a"], crate::domain::Value::Number(1.0));
        assert_eq!(hangman_data["b"], crate::domain::Value::Number(2.0));
    }
}
