//! # SessionSvc (C3)
//!
//! The thin service wrapping [`Store`] that every other component
//! (`Shell`, `CapabilityFacade`, `AuthEndpoints`, `TerminalEndpoints`) goes
//! through rather than touching `Store` directly - it owns session-key
//! minting and the history-append/area-set conveniences so the merge and
//! truncation rules (§4.3) live in exactly one place.

use std::sync::Arc;

use shared::errors::ApiError;

use crate::domain::{Role, Session, MAX_HISTORY_LEN};
use crate::store::{SessionInit, SessionPatch, Store, UserBinding};

#[derive(Clone)]
pub struct SessionSvc {
    store: Arc<dyn Store>,
}

impl SessionSvc {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Creates a session. `key` of `None` mints a fresh 32-byte random hex
    /// key via the same idiom the teacher used for password-reset tokens
    /// (`shared::auth::session_token::generate_session_key`) - there is no
    /// JWT layer, so this key *is* the session's entire identity.
    pub async fn create(
        &self,
        key: Option<String>,
        client_addr: Option<String>,
        user_agent: Option<String>,
    ) -> Result<Session, ApiError> {
        let key = key.unwrap_or_else(shared::auth::session_token::generate_session_key);
        self.store.session_upsert(&key, SessionInit { client_addr, user_agent }).await
    }

    pub async fn get(&self, key: &str) -> Result<Option<Session>, ApiError> {
        self.store.session_get(key).await
    }

    /// Loads a session or fails with `ApiError::MissingSession` - the
    /// shape most callers actually want, since "no session" and "unknown
    /// session key" are the same failure mode from the caller's point of
    /// view (§4.3/§7).
    pub async fn check(&self, key: &str) -> Result<Session, ApiError> {
        self.store.session_get(key).await?.ok_or(ApiError::MissingSession)
    }

    pub async fn update(&self, key: &str, patch: SessionPatch) -> Result<Session, ApiError> {
        self.store.session_update(key, patch).await?.ok_or(ApiError::MissingSession)
    }

    /// Binds a session to an authenticated user (login).
    pub async fn bind_user(&self, key: &str, user_id: uuid::Uuid, username: String, role: Role) -> Result<Session, ApiError> {
        self.update(key, SessionPatch { user_binding: Some(Some(UserBinding { user_id, username, role })), ..Default::default() })
            .await
    }

    /// Clears a session's user binding (logout) without destroying the
    /// session record itself - the terminal stays connected, just
    /// unauthenticated, matching §4.10's "logout" semantics.
    pub async fn unbind_user(&self, key: &str) -> Result<Session, ApiError> {
        self.update(key, SessionPatch { user_binding: Some(None), ..Default::default() }).await
    }

    pub async fn set_current_area(&self, key: &str, area: impl Into<String>) -> Result<Session, ApiError> {
        self.update(key, SessionPatch { current_area: Some(area.into()), ..Default::default() }).await
    }

    /// Appends one command to `command_history`, enforcing the
    /// `MAX_HISTORY_LEN` cap (P1) via a read-modify-write through `Store`
    /// rather than a dedicated `Store::session_append_history` method -
    /// the truncation rule belongs to the service layer, not the storage
    /// layer, because `InMemoryStore`/`PgStore` must not need to agree on
    /// business rules independently.
    pub async fn append_history(&self, key: &str, command: String) -> Result<Session, ApiError> {
        let mut session = self.check(key).await?;
        session.push_history(command);
        let _ = MAX_HISTORY_LEN; // invariant enforced inside `Session::push_history`
        self.update(key, SessionPatch { command_history: Some(session.command_history), ..Default::default() }).await
    }

    pub async fn delete(&self, key: &str) -> Result<bool, ApiError> {
        self.store.session_delete(key).await
    }

    pub async fn reap(&self, older_than: chrono::DateTime<chrono::Utc>) -> Result<u64, ApiError> {
        self.store.session_reap(older_than).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory_store::InMemoryStore;

    fn svc() -> SessionSvc {
        SessionSvc::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn append_history_caps_at_max_len() {
        let svc = svc();
        let session = svc.create(Some("k1".into()), None, None).await.unwrap();
        for i in 0..105 {
            svc.append_history(&session.key, format!("cmd{i}")).await.unwrap();
        }
        let session = svc.get("k1").await.unwrap().unwrap();
        assert_eq!(session.command_history.len(), MAX_HISTORY_LEN);
        assert_eq!(session.command_history.first().unwrap(), "cmd5");
    }

    #[tokio::test]
    async fn unbind_user_clears_the_binding_but_keeps_the_session() {
        let svc = svc();
        let session = svc.create(Some("k1".into()), None, None).await.unwrap();
        svc.bind_user(&session.key, uuid::Uuid::new_v4(), "alice".into(), Role::User).await.unwrap();
        let bound = svc.get("k1").await.unwrap().unwrap();
        assert!(bound.is_authenticated());

        svc.unbind_user("k1").await.unwrap();
        let unbound = svc.get("k1").await.unwrap().unwrap();
        assert!(!unbound.is_authenticated());
        assert_eq!(unbound.key, "k1");
    }

    #[tokio::test]
    async fn sessions_are_isolated_by_key() {
        let svc = svc();
        svc.create(Some("k1".into()), None, None).await.unwrap();
        svc.create(Some("k2".into()), None, None).await.unwrap();
        svc.set_current_area("k1", "hangman").await.unwrap();

        let k1 = svc.get("k1").await.unwrap().unwrap();
        let k2 = svc.get("k2").await.unwrap().unwrap();
        assert_eq!(k1.current_area, "hangman");
        assert_eq!(k2.current_area, crate::domain::MAIN_AREA);
    }
}
