//! # Store (C1)
//!
//! The persistence abstraction (§4.1). Every field in §3's data model
//! reaches disk only through this trait; `SessionSvc`, `AppRegistry`'s
//! install path, and `CapabilityFacade` are the only callers. Two
//! implementations ship: [`pg_store::PgStore`] (the real backend) and
//! [`memory_store::InMemoryStore`] (unit tests, and a living proof the
//! trait boundary is real rather than aspirational).
//!
//! All fallible operations return `Result<_, ApiError>` - the Store never
//! panics or throws out of band (§4.1). Uniqueness violations surface as
//! `ApiError::Conflict`; anything else persistence-related surfaces as
//! `ApiError::InternalError`/`DatabaseError` (both `StoreFault`-shaped).

pub mod memory_store;
pub mod pg_store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::errors::ApiError;
use uuid::Uuid;

use crate::domain::{KeyValue, NewUser, Session, User, Value};

/// Fields accepted when a session is created by `session_upsert` - there
/// is no "new session" DTO beyond this because a session's identity is
/// just its key; everything else starts at the `Session::new` defaults.
#[derive(Debug, Clone, Default)]
pub struct SessionInit {
    pub client_addr: Option<String>,
    pub user_agent: Option<String>,
}

/// Binds a session to an authenticated user - the `userId`/`username`
/// pair `SessionPatch` can set or clear as one unit (role travels with
/// the binding; a session is never authenticated with an unknown role).
#[derive(Debug, Clone)]
pub struct UserBinding {
    pub user_id: Uuid,
    pub username: String,
    pub role: crate::domain::Role,
}

/// Partial update to a session (§4.3 `update`). Every field is
/// "unchanged unless present" except `user_binding`, which is
/// `Option<Option<UserBinding>>` so the caller can distinguish "leave
/// the binding alone" from "clear it" (logout does the latter).
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub current_area: Option<String>,
    pub user_binding: Option<Option<UserBinding>>,
    /// Merged field-by-field into the existing `data` map, never replaces
    /// it wholesale (§4.3 invariant).
    pub data_merge: Option<std::collections::HashMap<String, std::collections::HashMap<String, Value>>>,
    /// Replaces `command_history` outright - used by `append_history`,
    /// which reads-modifies-writes through this same patch shape.
    pub command_history: Option<Vec<String>>,
}

/// Backs the `DEBUG` verb (§4.9) - a free-form snapshot, not a typed
/// query result, exactly as §4.1 describes the debug collection.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DebugSnapshot {
    pub session_count: u64,
    pub user_count: u64,
    pub kv_count: u64,
    pub sample_session_keys: Vec<String>,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn session_get(&self, key: &str) -> Result<Option<Session>, ApiError>;
    async fn session_upsert(&self, key: &str, init: SessionInit) -> Result<Session, ApiError>;
    async fn session_update(&self, key: &str, patch: SessionPatch) -> Result<Option<Session>, ApiError>;
    async fn session_delete(&self, key: &str) -> Result<bool, ApiError>;
    async fn session_reap(&self, older_than: DateTime<Utc>) -> Result<u64, ApiError>;

    async fn user_find_by_username(&self, username: &str) -> Result<Option<User>, ApiError>;
    async fn user_find_by_id(&self, id: Uuid) -> Result<Option<User>, ApiError>;
    async fn user_find_by_email(&self, email: &str) -> Result<Option<User>, ApiError>;
    async fn user_create(&self, new_user: NewUser) -> Result<User, ApiError>;
    async fn user_update_last_login(&self, id: Uuid) -> Result<(), ApiError>;
    async fn user_update_password(&self, id: Uuid, password_hash: &str) -> Result<(), ApiError>;

    async fn kv_get(
        &self,
        app_id: &str,
        key: &str,
        user_id: Option<Uuid>,
        namespace: Option<&str>,
    ) -> Result<Option<KeyValue>, ApiError>;

    async fn kv_upsert(
        &self,
        app_id: &str,
        key: &str,
        user_id: Option<Uuid>,
        namespace: Option<&str>,
        value: Value,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<KeyValue, ApiError>;

    async fn kv_delete(
        &self,
        app_id: &str,
        key: &str,
        user_id: Option<Uuid>,
        namespace: Option<&str>,
    ) -> Result<bool, ApiError>;

    async fn debug_dump(&self) -> Result<DebugSnapshot, ApiError>;
}
