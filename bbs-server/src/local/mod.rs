//! # LocalLoader (C6)
//!
//! Local apps are trusted, compiled-in Rust code - there is no dynamic
//! loading of native code at runtime, only discovery of which compiled-in
//! apps are enabled (§4.6). `local_apps()` is that compile-time registry;
//! `LocalLoader::load_all` runs each one through [`validate_contract`]
//! before handing it to the [`AppRegistry`], exactly as remote apps are.

pub mod apps;

use std::sync::Arc;

use shared::errors::ApiError;

use crate::capability::CapabilityFacade;
use crate::contract::{validate_contract, BbsApp};
use crate::domain::{AppOrigin, LoadedApp};
use crate::registry::AppRegistry;

/// Compiled-in builtin apps, in the order they are registered (§8
/// scenario 2's `[messageBoards, hangman, github_admin]` example - the
/// first two are builtin, the third a pre-installed remote app).
pub fn local_apps() -> Vec<Arc<dyn BbsApp>> {
    vec![Arc::new(apps::message_boards::MessageBoardsApp::new()), Arc::new(apps::hangman::HangmanApp::new())]
}

pub struct LocalLoader;

impl LocalLoader {
    /// Validates and registers every builtin app, constructing one
    /// `CapabilityFacade` per app id via `caps_for`.
    pub async fn load_all<F>(registry: &AppRegistry, caps_for: F) -> Result<(), ApiError>
    where
        F: Fn(&str) -> CapabilityFacade,
    {
        for app in local_apps() {
            validate_contract(app.as_ref()).await.map_err(|violation| ApiError::InternalError {
                message: format!("builtin app '{}' failed contract validation: {violation}", app.id()),
            })?;
            let caps = caps_for(app.id());
            registry.register(LoadedApp::new(app, AppOrigin::Builtin), caps).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_apps_registers_message_boards_before_hangman() {
        let apps = local_apps();
        let ids: Vec<&str> = apps.iter().map(|a| a.id()).collect();
        assert_eq!(ids, vec!["messageBoards", "hangman"]);
    }
}
