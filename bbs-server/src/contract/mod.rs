//! # AppContract (C4)
//!
//! The interface every installable app implements (§4.4), and the
//! admission gate ([`validate_contract`]) every app - builtin, local, or
//! remote - passes through before [`crate::registry::AppRegistry`] ever
//! sees it. `SessionView` rather than `&Session` is deliberate: an app
//! has no mutable handle to session state to begin with, so "a mutating
//! write by the app is ignored by the host" holds by construction, not
//! by convention.

use async_trait::async_trait;

use crate::capability::CapabilityFacade;
use crate::domain::SessionView;

/// Bounds from §4.4's field-validity checks.
pub const MAX_ID_LEN: usize = 64;
pub const MAX_NAME_LEN: usize = 128;
pub const MAX_DESCRIPTION_LEN: usize = 512;
pub const MAX_WELCOME_LEN: usize = 4_000;
pub const MAX_HELP_LEN: usize = 4_000;

/// Result of a single command dispatched to a [`BbsApp`] (§4.4).
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Text shown to the terminal.
    pub response: String,
    /// `None` means "return control to `main`"; `Some(id)` keeps the
    /// session inside this app, on screen `id`.
    pub screen: Option<String>,
    /// Whether the client should re-render immediately (vs. wait for
    /// further input); apps that stream multi-step output set this to
    /// `false` until their final message.
    pub refresh: bool,
}

impl CommandResult {
    pub fn new(response: impl Into<String>, screen: Option<String>) -> Self {
        Self { response: response.into(), screen, refresh: true }
    }

    pub fn to_main(response: impl Into<String>) -> Self {
        Self { response: response.into(), screen: None, refresh: true }
    }
}

/// The app interface (§4.4). Object-safe via `async_trait` so
/// [`crate::domain::LoadedApp`] can hold `Arc<dyn BbsApp>` regardless of
/// whether the concrete type is a compiled-in builtin or a
/// [`crate::remote::remote_app::RemoteApp`] proxy over the sandboxed isolate.
#[async_trait]
pub trait BbsApp: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn version(&self) -> &str;
    fn description(&self) -> &str;
    fn author(&self) -> &str;
    fn source(&self) -> Option<&str> {
        None
    }

    async fn get_welcome_screen(&self) -> String;
    async fn handle_command(&self, screen_id: Option<&str>, command: &str, session: &SessionView) -> CommandResult;
    async fn get_help(&self, screen_id: Option<&str>) -> String;

    /// Called once, at registration time, with a capability facade scoped
    /// to this app's id. Default no-op - most apps need nothing at boot.
    async fn on_init(&self, _caps: &CapabilityFacade) {}
    async fn on_user_enter(&self, _user_id: &str, _session: &SessionView) {}
    async fn on_user_exit(&self, _user_id: &str, _session: &SessionView) {}
}

/// Why an app failed admission (§4.4). Surfaced to the installer as
/// `ApiError::SandboxRejection` for remote apps, or treated as a build-time
/// bug (it should never happen) for builtins - `LocalLoader` still runs the
/// check defensively since a misconfigured local app is still a bug worth
/// catching rather than admitting.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ContractViolation {
    #[error("app id '{0}' is empty or exceeds {MAX_ID_LEN} characters")]
    InvalidId(String),
    #[error("app name '{0}' is empty or exceeds {MAX_NAME_LEN} characters")]
    InvalidName(String),
    #[error("app description exceeds {MAX_DESCRIPTION_LEN} characters")]
    DescriptionTooLong,
    #[error("welcome screen is empty or exceeds {MAX_WELCOME_LEN} characters")]
    InvalidWelcomeScreen,
    #[error("help text exceeds {MAX_HELP_LEN} characters")]
    HelpTooLong,
    #[error("get_help(None) returned empty text for the HELP probe")]
    HelpProbeFailed,
}

/// Runs the four checks of §4.4 against an already-constructed app. Called
/// exactly once per app, right before [`crate::registry::AppRegistry::register`]
/// - by the time an app reaches the registry, admission is binary and
///   already decided; there is no "partially admitted" state.
pub async fn validate_contract(app: &dyn BbsApp) -> Result<(), ContractViolation> {
    let id = app.id();
    if id.is_empty() || id.len() > MAX_ID_LEN {
        return Err(ContractViolation::InvalidId(id.to_string()));
    }

    let name = app.name();
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(ContractViolation::InvalidName(name.to_string()));
    }

    if app.description().len() > MAX_DESCRIPTION_LEN {
        return Err(ContractViolation::DescriptionTooLong);
    }

    let welcome = app.get_welcome_screen().await;
    if welcome.is_empty() || welcome.len() > MAX_WELCOME_LEN {
        return Err(ContractViolation::InvalidWelcomeScreen);
    }

    // The "HELP probe": calling get_help(None) must not panic and must
    // return something non-empty, and any screen-scoped help text must
    // stay inside bounds too.
    let help = app.get_help(None).await;
    if help.is_empty() {
        return Err(ContractViolation::HelpProbeFailed);
    }
    if help.len() > MAX_HELP_LEN {
        return Err(ContractViolation::HelpTooLong);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixtureApp {
        id: String,
        welcome: String,
        help: String,
    }

    #[async_trait]
    impl BbsApp for FixtureApp {
        fn id(&self) -> &str {
            &self.id
        }
        fn name(&self) -> &str {
            "Fixture"
        }
        fn version(&self) -> &str {
            "1.0.0"
        }
        fn description(&self) -> &str {
            "a fixture app for contract tests"
        }
        fn author(&self) -> &str {
            "test"
        }

        async fn get_welcome_screen(&self) -> String {
            self.welcome.clone()
        }

        async fn handle_command(&self, _screen_id: Option<&str>, _command: &str, _session: &SessionView) -> CommandResult {
            CommandResult::to_main("ok")
        }

        async fn get_help(&self, _screen_id: Option<&str>) -> String {
            self.help.clone()
        }
    }

    fn fixture() -> FixtureApp {
        FixtureApp { id: "fixture".into(), welcome: "Welcome!".into(), help: "Type HELP.".into() }
    }

    #[tokio::test]
    async fn a_well_formed_app_passes_admission() {
        assert!(validate_contract(&fixture()).await.is_ok());
    }

    #[tokio::test]
    async fn an_empty_welcome_screen_is_rejected() {
        let app = FixtureApp { welcome: String::new(), ..fixture() };
        assert!(matches!(validate_contract(&app).await, Err(ContractViolation::InvalidWelcomeScreen)));
    }

    #[tokio::test]
    async fn an_empty_help_probe_is_rejected() {
        let app = FixtureApp { help: String::new(), ..fixture() };
        assert!(matches!(validate_contract(&app).await, Err(ContractViolation::HelpProbeFailed)));
    }

    #[tokio::test]
    async fn an_oversized_id_is_rejected() {
        let app = FixtureApp { id: "x".repeat(MAX_ID_LEN + 1), ..fixture() };
        assert!(matches!(validate_contract(&app).await, Err(ContractViolation::InvalidId(_))));
    }
}
