//! # Shell (C9)
//!
//! The session's state machine (§4.9). `Shell::dispatch` is the single
//! entry point every `TerminalEndpoints::command` call goes through: it
//! normalizes the input, checks the universal verbs that take precedence
//! in every area, then either answers directly or forwards to an
//! installed app's `handle_command`, and finally persists whatever
//! changed through `SessionSvc` - exactly the five steps of §4.9, in
//! order.

use shared::errors::ApiError;

use crate::capability::CapabilityFacade;
use crate::contract::BbsApp;
use crate::domain::{Role, Session, SessionView, MAIN_AREA};
use crate::registry::AppRegistry;
use crate::remote::RemoteLoader;
use crate::service::{Identity, SessionSvc};
use crate::store::Store;
use std::sync::Arc;

/// What `TerminalEndpoints::command` hands back to the client (§4.9 step 5,
/// §6's `POST /terminal/command` response shape).
#[derive(Debug, Clone)]
pub struct ShellOutcome {
    pub area: String,
    pub response: String,
    pub refresh: bool,
    pub screen: Option<String>,
}

/// Where a session's `currentArea` points, parsed once per dispatch.
/// Absent/invalid area strings collapse to `Main` (§4.9 "parsing the area
/// is tolerant of absent/null values").
enum Area {
    Main,
    App { app_id: String, screen_id: String },
}

fn parse_area(raw: &str) -> Area {
    if raw.is_empty() || raw == MAIN_AREA {
        return Area::Main;
    }
    match raw.split_once(':') {
        Some((app_id, screen_id)) if !app_id.is_empty() => {
            Area::App { app_id: app_id.to_string(), screen_id: screen_id.to_string() }
        }
        _ => Area::Main,
    }
}

fn render_main_menu_for(registry: &AppRegistry) -> String {
    let apps = registry.list_all();
    let mut lines = vec!["=== MAIN MENU ===".to_string(), String::new()];
    if apps.is_empty() {
        lines.push("No apps are installed yet.".to_string());
    } else {
        for (i, app) in apps.iter().enumerate() {
            lines.push(format!("{}. {} - {}", i + 1, app.app.name(), app.app.description()));
        }
    }
    lines.push(String::new());
    lines.push("Type a number to enter an app, HELP for commands, EXIT to log off.".to_string());
    lines.join("\n")
}

/// Gate for the `INSTALL`/`UNINSTALL`/`LIST REMOTE APPS` verbs (§4.9 step 2).
fn require_admin(session: &Session) -> Result<(), String> {
    if !session.is_authenticated() {
        return Err("You must be logged in as an admin to do that.".to_string());
    }
    if session.role != Some(Role::Admin) {
        return Err("Only an admin user can do that.".to_string());
    }
    Ok(())
}

pub struct Shell {
    store: Arc<dyn Store>,
    sessions: SessionSvc,
    identity: Identity,
    registry: Arc<AppRegistry>,
    remote_loader: Arc<RemoteLoader>,
    rate_limiter: Arc<shared::rate_limit::RateLimiter>,
}

impl Shell {
    pub fn new(
        store: Arc<dyn Store>,
        sessions: SessionSvc,
        identity: Identity,
        registry: Arc<AppRegistry>,
        remote_loader: Arc<RemoteLoader>,
        rate_limiter: Arc<shared::rate_limit::RateLimiter>,
    ) -> Self {
        Self { store, sessions, identity, registry, remote_loader, rate_limiter }
    }

    fn caps_for(&self, app_id: &str) -> CapabilityFacade {
        CapabilityFacade::new(
            app_id.to_string(),
            self.store.clone(),
            self.sessions.clone(),
            self.identity.clone(),
            self.rate_limiter.clone(),
        )
    }

    /// Renders the catalog every fresh session sees, and the screen `MAIN`/
    /// `B`/`BACK` return to - numbered in registration order (§4.9's "a
    /// numeric token N selects the Nth installed app in insertion order").
    pub fn render_main_menu(&self) -> String {
        render_main_menu_for(&self.registry)
    }

    fn main_menu_help(&self) -> String {
        "Universal commands: HELP, MAIN/MENU, EXIT/QUIT/X/LOGOFF, DEBUG. \
         Type a number to enter the matching app from the main menu."
            .to_string()
    }

    /// The five-step dispatch of §4.9.
    pub async fn dispatch(&self, session_key: &str, raw: &str) -> Result<ShellOutcome, ApiError> {
        let session = self.sessions.check(session_key).await?;
        let cmd = raw.trim().to_uppercase();

        if let Some(outcome) = self.dispatch_universal(&session, &cmd, raw).await? {
            return self.persist(&session, raw, outcome).await;
        }

        let outcome = match parse_area(&session.current_area) {
            Area::Main => self.dispatch_main(&session, &cmd).await,
            Area::App { app_id, screen_id } => self.dispatch_app(&session, &app_id, &screen_id, raw).await,
        };

        self.persist(&session, raw, outcome).await
    }

    /// Step 2 of §4.9: verbs that take precedence in every area. Returns
    /// `None` if `cmd` isn't a universal verb, so the caller falls through
    /// to area dispatch.
    async fn dispatch_universal(&self, session: &Session, cmd: &str, raw: &str) -> Result<Option<ShellOutcome>, ApiError> {
        match cmd {
            "HELP" => {
                let response = match parse_area(&session.current_area) {
                    Area::Main => self.main_menu_help(),
                    Area::App { app_id, screen_id } => match self.registry.get(&app_id) {
                        Some(loaded) => loaded.app.get_help(Some(&screen_id)).await,
                        None => "That app is no longer installed. Type MAIN to return.".to_string(),
                    },
                };
                Ok(Some(ShellOutcome { area: session.current_area.clone(), response, refresh: true, screen: None }))
            }
            "MAIN" | "MENU" => Ok(Some(ShellOutcome {
                area: MAIN_AREA.to_string(),
                response: self.render_main_menu(),
                refresh: true,
                screen: None,
            })),
            "EXIT" | "QUIT" | "X" | "LOGOFF" => Ok(Some(ShellOutcome {
                area: session.current_area.clone(),
                response: "Goodbye! Your session will remain available if you reconnect.".to_string(),
                refresh: true,
                screen: None,
            })),
            "DEBUG" => {
                let snapshot = self.store.debug_dump().await?;
                let response = format!(
                    "sessions={} users={} key_values={} sample_sessions={:?}",
                    snapshot.session_count, snapshot.user_count, snapshot.kv_count, snapshot.sample_session_keys
                );
                Ok(Some(ShellOutcome { area: session.current_area.clone(), response, refresh: true, screen: None }))
            }
            _ if cmd.starts_with("INSTALL ") || cmd.starts_with("UNINSTALL ") || cmd == "LIST REMOTE APPS" => {
                Ok(Some(self.dispatch_admin_verb(session, &cmd, raw).await))
            }
            _ => Ok(None),
        }
    }

    /// `INSTALL REMOTE <url>` / `UNINSTALL REMOTE <url>` / `LIST REMOTE APPS`
    /// (§4.9 step 2's admin verbs). Always a response-level outcome - a
    /// rejected install is never an HTTP error (§7).
    async fn dispatch_admin_verb(&self, session: &Session, cmd: &str, raw: &str) -> ShellOutcome {
        let area = session.current_area.clone();
        let response = match require_admin(session) {
            Err(message) => message,
            Ok(()) => {
                let tokens: Vec<&str> = raw.split_whitespace().collect();
                if cmd == "LIST REMOTE APPS" {
                    let urls = self.registry.list_remote_urls();
                    if urls.is_empty() {
                        "No remote apps are installed.".to_string()
                    } else {
                        urls.join("\n")
                    }
                } else if cmd.starts_with("INSTALL ") && tokens.len() >= 3 {
                    let url = tokens[2];
                    let app_id_hint = self.remote_loader.app_id_hint(url);
                    match self.remote_loader.install(&self.registry, url, self.caps_for(&app_id_hint)).await {
                        Ok(app) => format!("Installed '{}' from {}.", app.id(), url),
                        Err(e) => format!("Install failed: {e}"),
                    }
                } else if cmd.starts_with("UNINSTALL ") && tokens.len() >= 3 {
                    let url = tokens[2];
                    match self.registry.remote_record(url) {
                        Some(record) => {
                            self.registry.unregister(&record.app_id);
                            self.registry.remove_remote_record(url);
                            format!("Uninstalled '{}'.", record.app_id)
                        }
                        None => format!("No installed remote app matches {url}."),
                    }
                } else {
                    "Usage: INSTALL REMOTE <url> | UNINSTALL REMOTE <url> | LIST REMOTE APPS".to_string()
                }
            }
        };
        ShellOutcome { area, response, refresh: true, screen: None }
    }

    /// Step 3 of §4.9 when the session is in `main`.
    async fn dispatch_main(&self, session: &Session, cmd: &str) -> ShellOutcome {
        let apps = self.registry.list_all();

        if let Ok(n) = cmd.parse::<usize>() {
            if n >= 1 && n <= apps.len() {
                let loaded = &apps[n - 1];
                let welcome = loaded.app.get_welcome_screen().await;
                if session.is_authenticated() {
                    let view = SessionView::from(session);
                    loaded.app.on_user_enter(&session.user_id.unwrap().to_string(), &view).await;
                }
                return ShellOutcome {
                    area: format!("{}:home", loaded.id()),
                    response: welcome,
                    refresh: true,
                    screen: Some("home".to_string()),
                };
            }
        }

        let guidance = if apps.is_empty() {
            "No apps are installed yet.".to_string()
        } else {
            format!("Unknown command. Select 1..{} to enter an app, or HELP for commands.", apps.len())
        };
        ShellOutcome { area: MAIN_AREA.to_string(), response: guidance, refresh: true, screen: None }
    }

    /// Step 3 of §4.9 when the session is inside an app. `onUserExit` fires
    /// exactly once, on the transition back out to the main menu - either
    /// an explicit `B`/`BACK` or the app itself returning a `None` screen -
    /// never on every command inside the app.
    async fn dispatch_app(&self, session: &Session, app_id: &str, screen_id: &str, raw: &str) -> ShellOutcome {
        let upper = raw.trim().to_uppercase();
        let Some(loaded) = self.registry.get(app_id) else {
            return ShellOutcome {
                area: MAIN_AREA.to_string(),
                response: "That app is no longer installed. Returning to the main menu.".to_string(),
                refresh: true,
                screen: None,
            };
        };

        if upper == "B" || upper == "BACK" {
            if session.is_authenticated() {
                let view = SessionView::from(session);
                loaded.app.on_user_exit(&session.user_id.unwrap().to_string(), &view).await;
            }
            return ShellOutcome {
                area: MAIN_AREA.to_string(),
                response: self.render_main_menu(),
                refresh: true,
                screen: None,
            };
        }

        let view = SessionView::from(session);
        let result = loaded.app.handle_command(Some(screen_id), raw, &view).await;

        match result.screen {
            None => {
                if session.is_authenticated() {
                    loaded.app.on_user_exit(&session.user_id.unwrap().to_string(), &view).await;
                }
                ShellOutcome { area: MAIN_AREA.to_string(), response: self.render_main_menu(), refresh: true, screen: None }
            }
            Some(same) if same == screen_id => ShellOutcome {
                area: format!("{app_id}:{same}"),
                response: result.response,
                refresh: result.refresh,
                screen: Some(same),
            },
            Some(next) => ShellOutcome {
                area: format!("{app_id}:{next}"),
                response: result.response,
                refresh: result.refresh,
                screen: Some(next),
            },
        }
    }

    /// Step 4 of §4.9: always append to history; only write `currentArea`
    /// when it actually changed, since area writes dominate write traffic
    /// (§4.3's rationale for `set_current_area` being a separate call).
    async fn persist(&self, session: &Session, raw: &str, outcome: ShellOutcome) -> Result<ShellOutcome, ApiError> {
        self.sessions.append_history(&session.key, raw.to_string()).await?;
        if outcome.area != session.current_area {
            self.sessions.set_current_area(&session.key, outcome.area.clone()).await?;
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AppOrigin, LoadedApp};
    use async_trait::async_trait;

    // `Shell` holds an `Arc<RateLimiter>` (via `CapabilityFacade`'s install
    // path), which in turn needs a live Redis connection to construct -
    // the same reason `capability::tests` and `rate_limit::tests` stop at
    // the pure-logic boundary rather than building the real thing. These
    // tests cover `parse_area`, `require_admin`, and `render_main_menu`
    // directly; the full `dispatch` wiring is exercised by the
    // integration environment.

    struct StubApp {
        id: String,
        name: String,
        description: String,
    }

    #[async_trait]
    impl BbsApp for StubApp {
        fn id(&self) -> &str {
            &self.id
        }
        fn name(&self) -> &str {
            &self.name
        }
        fn version(&self) -> &str {
            "0.1.0"
        }
        fn description(&self) -> &str {
            &self.description
        }
        fn author(&self) -> &str {
            "test"
        }
        async fn get_welcome_screen(&self) -> String {
            "Welcome".into()
        }
        async fn handle_command(&self, _screen_id: Option<&str>, _command: &str, _session: &SessionView) -> crate::contract::CommandResult {
            crate::contract::CommandResult::to_main("ok")
        }
        async fn get_help(&self, _screen_id: Option<&str>) -> String {
            "help".into()
        }
    }

    #[test]
    fn parse_area_treats_empty_and_main_as_main() {
        assert!(matches!(parse_area(""), Area::Main));
        assert!(matches!(parse_area("main"), Area::Main));
    }

    #[test]
    fn parse_area_splits_app_and_screen() {
        match parse_area("hangman:home") {
            Area::App { app_id, screen_id } => {
                assert_eq!(app_id, "hangman");
                assert_eq!(screen_id, "home");
            }
            Area::Main => panic!("expected Area::App"),
        }
    }

    #[test]
    fn parse_area_with_no_colon_is_an_app_on_no_screen() {
        match parse_area("hangman") {
            Area::App { app_id, screen_id } => {
                assert_eq!(app_id, "hangman");
                assert_eq!(screen_id, "");
            }
            Area::Main => panic!("expected Area::App"),
        }
    }

    #[test]
    fn render_main_menu_lists_apps_in_order() {
        let registry = AppRegistry::new();
        registry.insert(LoadedApp::new(
            Arc::new(StubApp { id: "hangman".into(), name: "Hangman".into(), description: "guess the word".into() }),
            AppOrigin::Local,
        ));
        let menu = render_main_menu_for(&registry);
        assert!(menu.contains("MAIN MENU"));
        assert!(menu.contains("1. Hangman - guess the word"));
    }

    #[test]
    fn render_main_menu_with_no_apps_says_so() {
        let registry = AppRegistry::new();
        let menu = render_main_menu_for(&registry);
        assert!(menu.contains("MAIN MENU"));
        assert!(menu.contains("No apps are installed yet."));
    }

    #[test]
    fn require_admin_rejects_unauthenticated_sessions() {
        let session = Session::new("k1".into(), None, None);
        assert!(require_admin(&session).is_err());
    }

    #[test]
    fn require_admin_rejects_non_admin_users() {
        let mut session = Session::new("k1".into(), None, None);
        session.user_id = Some(uuid::Uuid::new_v4());
        session.role = Some(Role::User);
        assert!(require_admin(&session).is_err());
    }

    #[test]
    fn require_admin_accepts_admin_users() {
        let mut session = Session::new("k1".into(), None, None);
        session.user_id = Some(uuid::Uuid::new_v4());
        session.role = Some(Role::Admin);
        assert!(require_admin(&session).is_ok());
    }
}
