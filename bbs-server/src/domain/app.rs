//! # LoadedApp
//!
//! An entry in the [`crate::registry::AppRegistry`] (§3). Owns the app's
//! callable handle plus the metadata the registry and `LIST ... APPS`
//! verb report on.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::contract::BbsApp;

/// Where a loaded app's code came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppOrigin {
    Builtin,
    Local,
    Remote(String),
}

impl AppOrigin {
    pub fn as_str(&self) -> String {
        match self {
            AppOrigin::Builtin => "builtin".to_string(),
            AppOrigin::Local => "local".to_string(),
            AppOrigin::Remote(url) => format!("remote:{url}"),
        }
    }
}

#[derive(Clone)]
pub struct LoadedApp {
    pub app: Arc<dyn BbsApp>,
    pub origin: AppOrigin,
    pub installed_at: DateTime<Utc>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

impl LoadedApp {
    pub fn new(app: Arc<dyn BbsApp>, origin: AppOrigin) -> Self {
        Self { app, origin, installed_at: Utc::now(), last_refreshed_at: None }
    }

    pub fn id(&self) -> &str {
        self.app.id()
    }
}

impl std::fmt::Debug for LoadedApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedApp")
            .field("id", &self.app.id())
            .field("origin", &self.origin)
            .field("installed_at", &self.installed_at)
            .finish()
    }
}
