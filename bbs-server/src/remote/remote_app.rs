//! # RemoteApp (C7 cont'd)
//!
//! The `BbsApp` proxy for a remote, sandboxed app (§4.7e/h). Holds the
//! already-validated `Program` AST and the metadata `RemoteLoader`
//! extracted at install time; every call spawns a fresh `sandbox-runtime`
//! child, feeds it one framed `Request`, services zero or more
//! mid-execution `CapabilityCall`s through the real `CapabilityFacade`
//! captured at `on_init` (the same `OnceLock`-at-`on_init` pattern
//! `local::apps::hangman` uses), and applies the capability wrapping of
//! §4.7h to whatever the child finally answers with - screen ids
//! sanitized, commands truncated, responses truncated, and any pipe
//! failure or timeout turned into an in-app error message rather than a
//! panic or a propagated `ApiError` (the `BbsApp` trait's command/help/
//! welcome methods are infallible by design).

use std::process::Stdio;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use shared::config::SandboxConfig;
use shared::rate_limit::RateLimiter;
use tokio::process::Command;

use crate::capability::CapabilityFacade;
use crate::contract::{BbsApp, CommandResult};
use crate::domain::SessionView;
use crate::sandbox::protocol::{self, CapabilityCall, CapabilityResult, DescribeResult, LifecycleHook, Request, ResourceLimits, Response};
use crate::sandbox::script::Program;

/// Bound imposed on a command before it is ever handed to a remote app
/// (§4.7h). A user's input is adversarial by default once it crosses into
/// sandboxed-app territory.
const MAX_COMMAND_LEN: usize = 1_000;
/// Bound imposed on whatever a remote app sends back (§4.7h).
const MAX_RESPONSE_LEN: usize = 10_000;
const FALLBACK_MESSAGE: &str = "This app is temporarily unavailable. Type B to go back.";

pub struct RemoteApp {
    program: Program,
    describe: DescribeResult,
    source_url: String,
    sandbox_config: SandboxConfig,
    rate_limiter: Arc<RateLimiter>,
    /// Captured in `on_init`, the same pattern `local::apps::hangman` uses
    /// to reach a facade from a trait method `BbsApp` gives no facade
    /// parameter to - services this app's mid-execution `CapabilityCall`s.
    caps: OnceLock<CapabilityFacade>,
}

impl RemoteApp {
    pub fn new(
        program: Program,
        describe: DescribeResult,
        source_url: String,
        sandbox_config: SandboxConfig,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self { program, describe, source_url, sandbox_config, rate_limiter, caps: OnceLock::new() }
    }

    fn limits(&self) -> ResourceLimits {
        ResourceLimits {
            step_budget: self.sandbox_config.step_budget as usize,
            heap_ceiling: (self.sandbox_config.max_old_space_mb * 1024) as usize,
        }
    }

    /// Sanitizes a screen id to the allow-listed character set (§4.7h);
    /// anything else collapses to `None`, equivalent to "return to main".
    fn sanitize_screen_id(screen_id: Option<&str>) -> Option<String> {
        screen_id.and_then(|id| {
            let valid = !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
            valid.then(|| id.to_string())
        })
    }

    fn truncate_response(response: String) -> String {
        if response.chars().count() <= MAX_RESPONSE_LEN {
            response
        } else {
            response.chars().take(MAX_RESPONSE_LEN).collect()
        }
    }

    async fn run_request(&self, request: &Request, timeout: Duration, session: Option<&SessionView>) -> Result<Response, String> {
        spawn_and_run(request, timeout, self.caps.get(), session).await
    }

    async fn gate(&self, operation: &str) -> bool {
        self.rate_limiter.check_and_increment(&self.describe.id, operation).await.is_ok()
    }
}

fn sandbox_runtime_path() -> std::path::PathBuf {
    let mut path = std::env::current_exe().unwrap_or_else(|_| "sandbox-runtime".into());
    path.set_file_name(if cfg!(windows) { "sandbox-runtime.exe" } else { "sandbox-runtime" });
    path
}

/// Spawns `sandbox-runtime`, feeds it one framed `Request`, and then loops:
/// a `Response::Capability` is serviced against `caps`/`session` and
/// answered with a `Request::CapabilityResume` so the still-running script
/// can continue, anything else is the final answer and ends the child's
/// lifecycle (§4.7e/§4.8). `caps` is `None` for `RemoteLoader`'s
/// install-time `Describe` probe, which never executes the script and so
/// never needs one; a script that calls a capability native with no `caps`
/// available gets `CapabilityResult::Failed` rather than a hang.
pub(crate) async fn spawn_and_run(
    request: &Request,
    timeout: Duration,
    caps: Option<&CapabilityFacade>,
    session: Option<&SessionView>,
) -> Result<Response, String> {
    let exe = sandbox_runtime_path();
    let mut child = Command::new(&exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("failed to spawn sandbox-runtime: {e}"))?;

    let mut stdin = child.stdin.take().ok_or("sandbox-runtime stdin unavailable")?;
    let mut stdout = child.stdout.take().ok_or("sandbox-runtime stdout unavailable")?;

    let result = tokio::time::timeout(timeout, async {
        let payload = protocol::encode_request(request).map_err(|e| e.to_string())?;
        protocol::asynchronous::write_frame(&mut stdin, &payload).await.map_err(|e| e.to_string())?;

        loop {
            let response_bytes = protocol::asynchronous::read_frame(&mut stdout).await.map_err(|e| e.to_string())?;
            let response = protocol::decode_response(&response_bytes).map_err(|e| e.to_string())?;
            let Response::Capability(call) = response else {
                return Ok(response);
            };
            let result = match caps {
                Some(facade) => service_capability(facade, session, call).await,
                None => CapabilityResult::Failed("capabilities are unavailable in this context".to_string()),
            };
            let resume = protocol::encode_request(&Request::CapabilityResume { result }).map_err(|e| e.to_string())?;
            protocol::asynchronous::write_frame(&mut stdin, &resume).await.map_err(|e| e.to_string())?;
        }
    })
    .await;

    drop(stdin);
    match result {
        Ok(inner) => {
            let _ = child.wait().await;
            inner
        }
        Err(_) => {
            let _ = child.start_kill();
            Err(format!("sandbox-runtime timed out after {timeout:?}"))
        }
    }
}

/// Services one `CapabilityCall` against the real `CapabilityFacade`
/// (§4.8). `user_storage`/`current_user` resolve the user id from
/// `session` - the script never supplies one, so it can never read or
/// write another user's scope by passing a different id.
async fn service_capability(
    facade: &CapabilityFacade,
    session: Option<&SessionView>,
    call: CapabilityCall,
) -> CapabilityResult {
    let ttl = |secs: Option<i64>| secs.map(chrono::Duration::seconds);
    match call {
        CapabilityCall::StorageGet { key } => match facade.storage_get(&key).await {
            Ok(v) => CapabilityResult::Value(v),
            Err(e) => CapabilityResult::Failed(e.to_string()),
        },
        CapabilityCall::StorageSet { key, value, ttl_secs } => {
            match facade.storage_set(&key, value, ttl(ttl_secs)).await {
                Ok(()) => CapabilityResult::Done,
                Err(e) => CapabilityResult::Failed(e.to_string()),
            }
        }
        CapabilityCall::StorageDelete { key } => match facade.storage_delete(&key).await {
            Ok(deleted) => CapabilityResult::Deleted(deleted),
            Err(e) => CapabilityResult::Failed(e.to_string()),
        },
        CapabilityCall::UserStorageGet { key } => {
            let Some(user_id) = session.and_then(|s| s.user_id) else {
                return CapabilityResult::Failed("no authenticated user".to_string());
            };
            match facade.user_storage_get(user_id, &key).await {
                Ok(v) => CapabilityResult::Value(v),
                Err(e) => CapabilityResult::Failed(e.to_string()),
            }
        }
        CapabilityCall::UserStorageSet { key, value, ttl_secs } => {
            let Some(user_id) = session.and_then(|s| s.user_id) else {
                return CapabilityResult::Failed("no authenticated user".to_string());
            };
            match facade.user_storage_set(user_id, &key, value, ttl(ttl_secs)).await {
                Ok(()) => CapabilityResult::Done,
                Err(e) => CapabilityResult::Failed(e.to_string()),
            }
        }
        CapabilityCall::UserStorageDelete { key } => {
            let Some(user_id) = session.and_then(|s| s.user_id) else {
                return CapabilityResult::Failed("no authenticated user".to_string());
            };
            match facade.user_storage_delete(user_id, &key).await {
                Ok(deleted) => CapabilityResult::Deleted(deleted),
                Err(e) => CapabilityResult::Failed(e.to_string()),
            }
        }
        CapabilityCall::NamespacedStorageGet { namespace, key } => {
            match facade.namespaced_storage_get(&namespace, &key).await {
                Ok(v) => CapabilityResult::Value(v),
                Err(e) => CapabilityResult::Failed(e.to_string()),
            }
        }
        CapabilityCall::NamespacedStorageSet { namespace, key, value, ttl_secs } => {
            match facade.namespaced_storage_set(&namespace, &key, value, ttl(ttl_secs)).await {
                Ok(()) => CapabilityResult::Done,
                Err(e) => CapabilityResult::Failed(e.to_string()),
            }
        }
        CapabilityCall::NamespacedStorageDelete { namespace, key } => {
            match facade.namespaced_storage_delete(&namespace, &key).await {
                Ok(deleted) => CapabilityResult::Deleted(deleted),
                Err(e) => CapabilityResult::Failed(e.to_string()),
            }
        }
        CapabilityCall::CurrentUser => {
            let Some(session) = session else { return CapabilityResult::User(None) };
            match facade.current_user(session).await {
                Ok(profile) => CapabilityResult::User(profile),
                Err(e) => CapabilityResult::Failed(e.to_string()),
            }
        }
    }
}

#[async_trait]
impl BbsApp for RemoteApp {
    fn id(&self) -> &str {
        &self.describe.id
    }

    fn name(&self) -> &str {
        &self.describe.name
    }

    fn version(&self) -> &str {
        &self.describe.version
    }

    fn description(&self) -> &str {
        &self.describe.description
    }

    fn author(&self) -> &str {
        &self.describe.author
    }

    fn source(&self) -> Option<&str> {
        Some(&self.source_url)
    }

    async fn get_welcome_screen(&self) -> String {
        if !self.gate("command_execution").await {
            return FALLBACK_MESSAGE.to_string();
        }
        let request = Request::WelcomeScreen { program: self.program.clone(), limits: self.limits() };
        let timeout = Duration::from_millis(self.sandbox_config.call_timeout_ms);
        match self.run_request(&request, timeout, None).await {
            Ok(Response::WelcomeScreen(text)) => Self::truncate_response(text),
            _ => FALLBACK_MESSAGE.to_string(),
        }
    }

    async fn handle_command(&self, screen_id: Option<&str>, command: &str, session: &SessionView) -> CommandResult {
        if !self.gate("command_execution").await {
            return CommandResult::new(FALLBACK_MESSAGE, Self::sanitize_screen_id(screen_id));
        }
        let screen_id = Self::sanitize_screen_id(screen_id);
        let command: String = command.chars().take(MAX_COMMAND_LEN).collect();
        let request = Request::HandleCommand {
            program: self.program.clone(),
            limits: self.limits(),
            screen_id: screen_id.clone(),
            command,
            session: session.clone(),
        };
        let timeout = Duration::from_millis(self.sandbox_config.call_timeout_ms);
        match self.run_request(&request, timeout, Some(session)).await {
            Ok(Response::HandleCommand(wire)) => {
                let mut result: CommandResult = wire.into();
                result.response = Self::truncate_response(result.response);
                result.screen = Self::sanitize_screen_id(result.screen.as_deref());
                result
            }
            Ok(Response::Error(reason)) => {
                tracing::warn!(app_id = %self.describe.id, %reason, "remote app returned a script error");
                CommandResult::new(FALLBACK_MESSAGE, screen_id)
            }
            _ => CommandResult::new(FALLBACK_MESSAGE, screen_id),
        }
    }

    async fn get_help(&self, screen_id: Option<&str>) -> String {
        if !self.gate("command_execution").await {
            return FALLBACK_MESSAGE.to_string();
        }
        let screen_id = Self::sanitize_screen_id(screen_id);
        let request = Request::Help { program: self.program.clone(), limits: self.limits(), screen_id };
        let timeout = Duration::from_millis(self.sandbox_config.call_timeout_ms);
        match self.run_request(&request, timeout, None).await {
            Ok(Response::Help(text)) => Self::truncate_response(text),
            _ => FALLBACK_MESSAGE.to_string(),
        }
    }

    async fn on_init(&self, caps: &CapabilityFacade) {
        let _ = self.caps.set(caps.clone());
        if !self.describe.has_on_init {
            return;
        }
        let request = Request::Lifecycle {
            program: self.program.clone(),
            limits: self.limits(),
            hook: LifecycleHook::OnInit,
            session: None,
        };
        let timeout = Duration::from_millis(self.sandbox_config.call_timeout_ms);
        if let Err(reason) = self.run_request(&request, timeout, None).await {
            tracing::warn!(app_id = %self.describe.id, %reason, "remote app onInit failed");
        }
    }

    async fn on_user_enter(&self, user_id: &str, session: &SessionView) {
        if !self.describe.has_on_user_enter {
            return;
        }
        let request = Request::Lifecycle {
            program: self.program.clone(),
            limits: self.limits(),
            hook: LifecycleHook::OnUserEnter { user_id: user_id.to_string() },
            session: Some(session.clone()),
        };
        let timeout = Duration::from_millis(self.sandbox_config.call_timeout_ms);
        if let Err(reason) = self.run_request(&request, timeout, Some(session)).await {
            tracing::warn!(app_id = %self.describe.id, %reason, "remote app onUserEnter failed");
        }
    }

    async fn on_user_exit(&self, user_id: &str, session: &SessionView) {
        if !self.describe.has_on_user_exit {
            return;
        }
        let request = Request::Lifecycle {
            program: self.program.clone(),
            limits: self.limits(),
            hook: LifecycleHook::OnUserExit { user_id: user_id.to_string() },
            session: Some(session.clone()),
        };
        let timeout = Duration::from_millis(self.sandbox_config.call_timeout_ms);
        if let Err(reason) = self.run_request(&request, timeout, Some(session)).await {
            tracing::warn!(app_id = %self.describe.id, %reason, "remote app onUserExit failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_screen_id_rejects_punctuation() {
        assert_eq!(RemoteApp::sanitize_screen_id(Some("valid_id-1")), Some("valid_id-1".to_string()));
        assert_eq!(RemoteApp::sanitize_screen_id(Some("../etc/passwd")), None);
        assert_eq!(RemoteApp::sanitize_screen_id(None), None);
        assert_eq!(RemoteApp::sanitize_screen_id(Some("")), None);
    }

    #[test]
    fn truncate_response_caps_at_the_response_limit() {
        let long = "x".repeat(MAX_RESPONSE_LEN + 500);
        let truncated = RemoteApp::truncate_response(long);
        assert_eq!(truncated.chars().count(), MAX_RESPONSE_LEN);
    }

    #[test]
    fn truncate_response_leaves_short_responses_untouched() {
        assert_eq!(RemoteApp::truncate_response("hi".to_string()), "hi");
    }
}
