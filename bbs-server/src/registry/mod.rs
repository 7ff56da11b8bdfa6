//! # AppRegistry (C5)
//!
//! The live index of installed apps (§4.5). Backed by `DashMap` rather
//! than a `RwLock<HashMap>` - concurrent command dispatch needs concurrent
//! readers with no global lock, and `DashMap`'s per-shard locking gives
//! that along with "a write must either complete before or after a read"
//! (§4.5/§5) for free, the same way `meawoppl-claude-code-portal` uses it
//! for its own concurrent index.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use shared::errors::ApiError;

use crate::capability::CapabilityFacade;
use crate::domain::{AppOrigin, LoadedApp};

/// Tracks a remote app's source URL and cache freshness so
/// `refresh_remote_all` knows what to re-fetch (§4.7i).
#[derive(Debug, Clone)]
pub struct RemoteInstallRecord {
    pub url: String,
    pub app_id: String,
    pub installed_at: DateTime<Utc>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

/// Live app index (§4.5). `order` preserves registration order for
/// `list_all`/`LIST ... APPS` - the map itself gives no ordering
/// guarantee, so a side `Vec` under its own small mutex tracks it; reads
/// of the map's contents stay lock-free.
pub struct AppRegistry {
    apps: DashMap<String, LoadedApp>,
    remotes: DashMap<String, RemoteInstallRecord>,
    order: Mutex<Vec<String>>,
}

impl Default for AppRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AppRegistry {
    pub fn new() -> Self {
        Self { apps: DashMap::new(), remotes: DashMap::new(), order: Mutex::new(Vec::new()) }
    }

    /// Registers an app, replacing any existing entry at the same id.
    /// Calls `on_init` exactly once, after the app is visible in the map -
    /// an app's own `on_init` can legally look itself up via `get` (the
    /// teacher's `user_repository` has no equivalent; this mirrors the
    /// spec's own "register...calls on_init once" wording in §4.5).
    pub async fn register(&self, loaded: LoadedApp, caps: CapabilityFacade) -> Result<(), ApiError> {
        let app = loaded.app.clone();
        self.insert(loaded);
        app.on_init(&caps).await;
        Ok(())
    }

    /// Map-and-order bookkeeping alone, with no `on_init` call - split out
    /// of `register` so it can be exercised without constructing a live
    /// `CapabilityFacade` (which needs a real Redis connection via its
    /// rate limiter).
    pub(crate) fn insert(&self, loaded: LoadedApp) {
        let id = loaded.id().to_string();
        let is_new = !self.apps.contains_key(&id);

        self.apps.insert(id.clone(), loaded);
        if is_new {
            let mut order = self.order.lock().unwrap_or_else(|e| e.into_inner());
            order.push(id);
        }
    }

    pub fn unregister(&self, id: &str) -> bool {
        let removed = self.apps.remove(id).is_some();
        if removed {
            let mut order = self.order.lock().unwrap_or_else(|e| e.into_inner());
            order.retain(|existing| existing != id);
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<LoadedApp> {
        self.apps.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.apps.contains_key(id)
    }

    /// Returns loaded apps in registration order (§4.5's `LIST ... APPS`).
    pub fn list_all(&self) -> Vec<LoadedApp> {
        let order = self.order.lock().unwrap_or_else(|e| e.into_inner());
        order.iter().filter_map(|id| self.apps.get(id.as_str()).map(|entry| entry.value().clone())).collect()
    }

    pub fn record_remote_install(&self, record: RemoteInstallRecord) {
        self.remotes.insert(record.url.clone(), record);
    }

    pub fn remove_remote_record(&self, url: &str) {
        self.remotes.remove(url);
    }

    pub fn list_remote_urls(&self) -> Vec<String> {
        self.remotes.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn remote_record(&self, url: &str) -> Option<RemoteInstallRecord> {
        self.remotes.get(url).map(|entry| entry.value().clone())
    }

    pub fn origin_of(&self, id: &str) -> Option<AppOrigin> {
        self.apps.get(id).map(|entry| entry.value().origin.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{BbsApp, CommandResult};
    use crate::domain::SessionView;
    use async_trait::async_trait;

    struct StubApp(String);

    #[async_trait]
    impl BbsApp for StubApp {
        fn id(&self) -> &str {
            &self.0
        }
        fn name(&self) -> &str {
            "Stub"
        }
        fn version(&self) -> &str {
            "0.1.0"
        }
        fn description(&self) -> &str {
            "a stub"
        }
        fn author(&self) -> &str {
            "test"
        }
        async fn get_welcome_screen(&self) -> String {
            "Welcome".into()
        }
        async fn handle_command(&self, _screen_id: Option<&str>, _command: &str, _session: &SessionView) -> CommandResult {
            CommandResult::to_main("ok")
        }
        async fn get_help(&self, _screen_id: Option<&str>) -> String {
            "help".into()
        }
    }

    // `register`'s `on_init` call needs a live `CapabilityFacade` (and
    // therefore a connected Redis instance via its rate limiter); these
    // tests exercise the map-and-order bookkeeping directly through
    // `insert`, which `register` is a thin wrapper over.

    #[test]
    fn registering_an_existing_id_does_not_duplicate_order() {
        let registry = AppRegistry::new();
        registry.insert(LoadedApp::new(Arc::new(StubApp("a".into())), AppOrigin::Local));
        registry.insert(LoadedApp::new(Arc::new(StubApp("a".into())), AppOrigin::Local));
        assert_eq!(registry.list_all().len(), 1);
    }

    #[test]
    fn list_all_preserves_registration_order() {
        let registry = AppRegistry::new();
        for id in ["first", "second", "third"] {
            registry.insert(LoadedApp::new(Arc::new(StubApp(id.into())), AppOrigin::Local));
        }
        let ids: Vec<String> = registry.list_all().iter().map(|a| a.id().to_string()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn unregister_removes_from_both_the_map_and_the_order() {
        let registry = AppRegistry::new();
        registry.insert(LoadedApp::new(Arc::new(StubApp("a".into())), AppOrigin::Local));
        assert!(registry.unregister("a"));
        assert!(registry.get("a").is_none());
        assert!(registry.list_all().is_empty());
    }
}
