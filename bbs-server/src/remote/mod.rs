//! # RemoteLoader (C7)
//!
//! Ties together every piece of §4.7's pipeline: [`url::parse_source_url`]
//! (a), [`manifest::fetch_manifest`] (b), a size-bounded raw-text fetch
//! (c), [`crate::sandbox::static_analysis`] (d), a `Describe` round-trip
//! through `sandbox-runtime` (e/g), [`crate::contract::validate_contract`]
//! on the resulting [`remote_app::RemoteApp`] proxy, and the 1-hour
//! install cache plus `refresh_remote_all` (i). `RemoteApp`'s own
//! per-call capability wrapping is (h); this module only runs the
//! install-time half of the pipeline.

pub mod manifest;
pub mod remote_app;
pub mod url;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use shared::config::{RemoteConfig, SandboxConfig};
use shared::errors::ApiError;
use shared::rate_limit::RateLimiter;

use crate::contract::{validate_contract, BbsApp};
use crate::domain::{AppOrigin, LoadedApp};
use crate::registry::{AppRegistry, RemoteInstallRecord};
use crate::sandbox::protocol::{DescribeResult, Request, ResourceLimits, Response};
use crate::sandbox::script::compile;
use crate::sandbox::static_analysis;

/// Size bound from §4.7c step (c). Enforced both against `Content-Length`
/// and against the actual byte count read, since a server can lie about
/// (or omit) the header.
const MAX_SOURCE_BYTES: usize = 1024 * 1024;

pub struct RemoteLoader {
    http: reqwest::Client,
    remote_config: RemoteConfig,
    sandbox_config: SandboxConfig,
    rate_limiter: Arc<RateLimiter>,
}

impl RemoteLoader {
    pub fn new(remote_config: RemoteConfig, sandbox_config: SandboxConfig, rate_limiter: Arc<RateLimiter>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client with a fixed timeout always builds");
        Self { http, remote_config, sandbox_config, rate_limiter }
    }

    /// Runs pipeline steps (a)-(h) and, if the result passes admission,
    /// registers it - or returns the already-cached entry if this exact
    /// URL was installed within the last `install_cache_hours` (§4.7i).
    pub async fn install(&self, registry: &AppRegistry, source_url: &str, caps: crate::capability::CapabilityFacade) -> Result<LoadedApp, ApiError> {
        let location = url::parse_source_url(source_url, &self.remote_config.allowed_hosts)?;

        if let Some(record) = registry.remote_record(source_url) {
            let age = Utc::now() - record.installed_at;
            if age < chrono::Duration::hours(self.remote_config.install_cache_hours) {
                if let Some(app) = registry.get(&record.app_id) {
                    return Ok(app);
                }
            }
        }

        let manifest = manifest::fetch_manifest(&self.http, &location, &self.remote_config.manifest_name).await;
        for dep in &manifest.dependencies {
            if !crate::sandbox::stdlib::ALLOWED_MODULES.contains(&dep.as_str()) {
                return Err(ApiError::SandboxRejection {
                    reason: format!("manifest declares dependency '{dep}' outside the require allow-list"),
                });
            }
        }
        let file_url = manifest::source_url_for(&location, &manifest, &self.remote_config.manifest_name);
        let source = self.fetch_source(&file_url).await?;

        static_analysis::scan_source(&source)
            .map_err(|v| ApiError::SandboxRejection { reason: v.to_string() })?;
        let program = compile(&source).map_err(|e| ApiError::SandboxRejection { reason: e.to_string() })?;
        static_analysis::analyze_program(&program).map_err(|v| ApiError::SandboxRejection { reason: v.to_string() })?;

        let describe = self.describe(&program).await?;

        let app: Arc<dyn BbsApp> = Arc::new(remote_app::RemoteApp::new(
            program,
            describe,
            file_url.clone(),
            self.sandbox_config.clone(),
            self.rate_limiter.clone(),
        ));

        validate_contract(app.as_ref()).await.map_err(|v| ApiError::SandboxRejection { reason: v.to_string() })?;

        let loaded = LoadedApp::new(app.clone(), AppOrigin::Remote(source_url.to_string()));
        registry.register(loaded.clone(), caps).await?;
        registry.record_remote_install(RemoteInstallRecord {
            url: source_url.to_string(),
            app_id: app.id().to_string(),
            installed_at: Utc::now(),
            last_refreshed_at: None,
        });

        Ok(loaded)
    }

    /// Derives the same app-id a successful install of `url` would end up
    /// with, without running the pipeline - the best guess available to a
    /// caller that needs a `CapabilityFacade` before `describe` has told it
    /// the app's real id (an unparsable URL still needs *some* facade to
    /// hand the installer, hence the empty-string fallback rather than an
    /// `Option`).
    pub fn app_id_hint(&self, url: &str) -> String {
        url::parse_source_url(url, &self.remote_config.allowed_hosts)
            .map(|loc| loc.synthesized_id())
            .unwrap_or_default()
    }

    /// Re-runs the whole pipeline for every tracked remote URL (§4.7i).
    /// Each replacement is a single `AppRegistry::register` call, so a
    /// reader can never observe a half-installed app mid-refresh (§4.5).
    pub async fn refresh_all<F>(&self, registry: &AppRegistry, caps_for: F) -> Vec<(String, Result<(), ApiError>)>
    where
        F: Fn(&str) -> crate::capability::CapabilityFacade,
    {
        let urls = registry.list_remote_urls();
        let mut results = Vec::with_capacity(urls.len());
        for url in urls {
            let caps = caps_for(&self.app_id_hint(&url));
            let outcome = self.force_reinstall(registry, &url, caps).await;
            results.push((url, outcome.map(|_| ())));
        }
        results
    }

    async fn force_reinstall(&self, registry: &AppRegistry, source_url: &str, caps: crate::capability::CapabilityFacade) -> Result<LoadedApp, ApiError> {
        registry.remove_remote_record(source_url);
        self.install(registry, source_url, caps).await
    }

    async fn fetch_source(&self, url: &str) -> Result<String, ApiError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ApiError::RemoteFetchFault { reason: format!("fetch failed: {e}") })?;

        if !response.status().is_success() {
            return Err(ApiError::RemoteFetchFault { reason: format!("source fetch returned {}", response.status()) });
        }

        if let Some(len) = response.content_length() {
            if len as usize > MAX_SOURCE_BYTES {
                return Err(ApiError::SandboxRejection { reason: "source exceeds 1 MiB".to_string() });
            }
        }

        let bytes = response.bytes().await.map_err(|e| ApiError::RemoteFetchFault { reason: e.to_string() })?;
        if bytes.len() > MAX_SOURCE_BYTES {
            return Err(ApiError::SandboxRejection { reason: "source exceeds 1 MiB".to_string() });
        }

        String::from_utf8(bytes.to_vec()).map_err(|_| ApiError::SandboxRejection { reason: "source is not valid UTF-8".to_string() })
    }

    /// Runs the admission `Describe` probe (§4.7g) through one
    /// `sandbox-runtime` invocation, exactly like a normal call - there is
    /// no separate "trusted" load path.
    async fn describe(&self, program: &crate::sandbox::script::Program) -> Result<DescribeResult, ApiError> {
        let request = Request::Describe {
            program: program.clone(),
            limits: ResourceLimits {
                step_budget: self.sandbox_config.step_budget as usize,
                heap_ceiling: (self.sandbox_config.max_old_space_mb * 1024) as usize,
            },
        };
        let timeout = Duration::from_millis(self.sandbox_config.load_timeout_ms);
        match remote_app::spawn_and_run(&request, timeout, None, None).await {
            Ok(Response::Describe(result)) => Ok(result),
            Ok(Response::Error(reason)) => Err(ApiError::SandboxRejection { reason }),
            Ok(_) => Err(ApiError::SandboxRejection { reason: "unexpected response to describe probe".to_string() }),
            Err(reason) => Err(ApiError::SandboxRejection { reason }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_source_bytes_matches_the_spec_bound() {
        assert_eq!(MAX_SOURCE_BYTES, 1024 * 1024);
    }
}
