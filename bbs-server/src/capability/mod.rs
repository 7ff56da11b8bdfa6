//! # CapabilityFacade (C8)
//!
//! Everything an app is allowed to touch, constructed once per app id and
//! handed to `BbsApp::on_init` and to `RemoteApp`'s proxy layer. Every
//! entry point is rate-limit-gated (§5) before doing any work; storage
//! calls route through `Store::kv_*` with the `app_<appId>_[<namespace>_]`
//! key-prefix convention from §3 so one app can never read or write
//! another's rows even though they share the same `key_values` table.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::errors::ApiError;
use shared::rate_limit::RateLimiter;
use uuid::Uuid;

use crate::domain::{SessionView, UserProfile, Value};
use crate::service::{Identity, SessionSvc};
use crate::store::Store;

/// Prefixes a bare key with the app/namespace scope (§3). Kept as a free
/// function rather than inlined so `CapabilityFacade` and any future
/// debugging tool share one definition of "what a key looks like on disk".
fn scoped_key(app_id: &str, namespace: Option<&str>, key: &str) -> String {
    match namespace {
        Some(ns) => format!("app_{app_id}_{ns}_{key}"),
        None => format!("app_{app_id}_{key}"),
    }
}

/// Rejects values that look like they carry executable code (§4.8's "set
/// additionally runs the code-smell heuristic") - belt-and-suspenders
/// alongside the tagged `Value` type having no callable variant at all.
fn reject_code_like(value: &Value) -> Result<(), ApiError> {
    if value.looks_code_like() {
        return Err(ApiError::SandboxRejection { reason: "stored value looks like executable code".to_string() });
    }
    Ok(())
}

#[derive(Clone)]
pub struct CapabilityFacade {
    app_id: String,
    store: Arc<dyn Store>,
    sessions: SessionSvc,
    identity: Identity,
    rate_limiter: Arc<RateLimiter>,
}

impl CapabilityFacade {
    pub fn new(app_id: String, store: Arc<dyn Store>, sessions: SessionSvc, identity: Identity, rate_limiter: Arc<RateLimiter>) -> Self {
        Self { app_id, store, sessions, identity, rate_limiter }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Unscoped, app-global storage (`namespace = None`, `user_id = None`).
    pub async fn storage_get(&self, key: &str) -> Result<Option<Value>, ApiError> {
        self.rate_limiter.check_and_increment(&self.app_id, "kv_get").await?;
        let scoped = scoped_key(&self.app_id, None, key);
        Ok(self.store.kv_get(&self.app_id, &scoped, None, None).await?.map(|kv| kv.value))
    }

    pub async fn storage_set(&self, key: &str, value: Value, ttl: Option<chrono::Duration>) -> Result<(), ApiError> {
        self.rate_limiter.check_and_increment(&self.app_id, "kv_set").await?;
        reject_code_like(&value)?;
        let scoped = scoped_key(&self.app_id, None, key);
        let expires_at = ttl.map(|d| Utc::now() + d);
        self.store.kv_upsert(&self.app_id, &scoped, None, None, value, expires_at).await?;
        Ok(())
    }

    pub async fn storage_delete(&self, key: &str) -> Result<bool, ApiError> {
        self.rate_limiter.check_and_increment(&self.app_id, "kv_delete").await?;
        let scoped = scoped_key(&self.app_id, None, key);
        self.store.kv_delete(&self.app_id, &scoped, None, None).await
    }

    /// Storage scoped to one authenticated user - the same key in two
    /// different users' scopes never collides (P3).
    pub async fn user_storage_get(&self, user_id: Uuid, key: &str) -> Result<Option<Value>, ApiError> {
        self.rate_limiter.check_and_increment(&self.app_id, "kv_get").await?;
        let scoped = scoped_key(&self.app_id, None, key);
        Ok(self.store.kv_get(&self.app_id, &scoped, Some(user_id), None).await?.map(|kv| kv.value))
    }

    pub async fn user_storage_set(
        &self,
        user_id: Uuid,
        key: &str,
        value: Value,
        ttl: Option<chrono::Duration>,
    ) -> Result<(), ApiError> {
        self.rate_limiter.check_and_increment(&self.app_id, "kv_set").await?;
        reject_code_like(&value)?;
        let scoped = scoped_key(&self.app_id, None, key);
        let expires_at = ttl.map(|d| Utc::now() + d);
        self.store.kv_upsert(&self.app_id, &scoped, Some(user_id), None, value, expires_at).await?;
        Ok(())
    }

    pub async fn user_storage_delete(&self, user_id: Uuid, key: &str) -> Result<bool, ApiError> {
        self.rate_limiter.check_and_increment(&self.app_id, "kv_delete").await?;
        let scoped = scoped_key(&self.app_id, None, key);
        self.store.kv_delete(&self.app_id, &scoped, Some(user_id), None).await
    }

    /// Storage scoped to an arbitrary app-chosen namespace (e.g. per
    /// message-board-thread storage), unscoped to any particular user.
    pub async fn namespaced_storage_get(&self, namespace: &str, key: &str) -> Result<Option<Value>, ApiError> {
        self.rate_limiter.check_and_increment(&self.app_id, "kv_get").await?;
        let scoped = scoped_key(&self.app_id, Some(namespace), key);
        Ok(self.store.kv_get(&self.app_id, &scoped, None, Some(namespace)).await?.map(|kv| kv.value))
    }

    pub async fn namespaced_storage_set(
        &self,
        namespace: &str,
        key: &str,
        value: Value,
        ttl: Option<chrono::Duration>,
    ) -> Result<(), ApiError> {
        self.rate_limiter.check_and_increment(&self.app_id, "kv_set").await?;
        reject_code_like(&value)?;
        let scoped = scoped_key(&self.app_id, Some(namespace), key);
        let expires_at = ttl.map(|d| Utc::now() + d);
        self.store.kv_upsert(&self.app_id, &scoped, None, Some(namespace), value, expires_at).await?;
        Ok(())
    }

    pub async fn namespaced_storage_delete(&self, namespace: &str, key: &str) -> Result<bool, ApiError> {
        self.rate_limiter.check_and_increment(&self.app_id, "kv_delete").await?;
        let scoped = scoped_key(&self.app_id, Some(namespace), key);
        self.store.kv_delete(&self.app_id, &scoped, None, Some(namespace)).await
    }

    /// Resolves the session's bound user to a public profile, or `None`
    /// if the session is not authenticated.
    pub async fn current_user(&self, session: &SessionView) -> Result<Option<UserProfile>, ApiError> {
        self.rate_limiter.check_and_increment(&self.app_id, "current_user").await?;
        let Some(user_id) = session.user_id else {
            return Ok(None);
        };
        let user = self.store.user_find_by_id(user_id).await?;
        Ok(user.as_ref().map(|u| self.identity.public_view(u)))
    }

    /// Pure, host-service-free helper functions apps can call without
    /// touching `Store` or the rate limiter at all.
    pub fn utils(&self) -> CapabilityUtils {
        CapabilityUtils
    }

    /// Lets a `BbsApp`'s `on_init` refresh a session it already holds -
    /// used sparingly; most apps never need this.
    pub fn sessions(&self) -> &SessionSvc {
        &self.sessions
    }
}

/// Stateless helpers (§4.8's `utils`): date formatting and simple ASCII
/// layout, implemented with `chrono` since it is already a teacher
/// dependency and the spec only asks for human-readable formatting, not a
/// full templating engine.
pub struct CapabilityUtils;

impl CapabilityUtils {
    pub fn format_date(&self, at: DateTime<Utc>) -> String {
        at.format("%Y-%m-%d %H:%M UTC").to_string()
    }

    pub fn ascii_boxed_title(&self, title: &str) -> String {
        let width = title.chars().count() + 4;
        let border = "-".repeat(width);
        format!("+{border}+\n|  {title}  |\n+{border}+")
    }

    pub fn separator(&self) -> &'static str {
        "----------------------------------------"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // `CapabilityFacade`'s methods all gate on `RateLimiter::check_and_increment`,
    // which needs a live Redis connection to evaluate its Lua script; that
    // path is covered by `shared::rate_limit`'s own tests and by the
    // integration environment. Here we cover the pure logic: key scoping
    // and the code-smell heuristic.

    fn scoped_key_is_prefixed_correctly() {
        assert_eq!(scoped_key("hangman", None, "score"), "app_hangman_score");
        assert_eq!(scoped_key("hangman", Some("thread1"), "score"), "app_hangman_thread1_score");
    }

    #[test]
    fn key_scoping_isolates_namespace_and_app() {
        scoped_key_is_prefixed_correctly();
    }

    #[test]
    fn rejects_code_like_values() {
        let code = Value::String("function() { return 1; }".to_string());
        assert!(reject_code_like(&code).is_err());
        let plain = Value::String("just text".to_string());
        assert!(reject_code_like(&plain).is_ok());
    }

    #[test]
    fn utils_ascii_boxed_title_wraps_the_text() {
        let utils = CapabilityUtils;
        let boxed = utils.ascii_boxed_title("Hi");
        assert!(boxed.contains("Hi"));
        assert!(boxed.starts_with('+'));
    }
}
