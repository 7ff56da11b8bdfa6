//! # Manifest
//!
//! Fetches and parses the remote app's manifest file (§4.7c step (b)) -
//! a small JSON document naming the entry-point source file, and
//! optionally the app's declared dependencies (informational only; this
//! runtime has no package graph to resolve, since `require` is limited to
//! [`crate::sandbox::stdlib::ALLOWED_MODULES`]). A missing or malformed
//! manifest is recoverable: the loader falls back to a conventional
//! `main.script` entry point rather than failing the install outright.

use serde::Deserialize;

use super::url::SourceLocation;

const DEFAULT_MAIN: &str = "main.script";

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    #[serde(default = "default_main")]
    pub main: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

fn default_main() -> String {
    DEFAULT_MAIN.to_string()
}

impl Default for Manifest {
    fn default() -> Self {
        Self { main: default_main(), dependencies: Vec::new() }
    }
}

/// Builds the raw-content URL for a file at `location`'s repo/branch/subpath,
/// assuming a GitHub-shaped raw-content convention - the only shape the
/// allow-listed hosts in practice need to support.
fn raw_file_url(location: &SourceLocation, manifest_name: &str, filename: &str) -> String {
    let base = match &location.subpath {
        Some(subpath) => format!(
            "https://{}/{}/{}/{}/{}",
            location.host, location.owner, location.repo, location.branch, subpath
        ),
        None => format!("https://{}/{}/{}/{}", location.host, location.owner, location.repo, location.branch),
    };
    if filename == manifest_name {
        format!("{base}/{manifest_name}")
    } else {
        format!("{base}/{filename}")
    }
}

/// Fetches and parses the manifest, falling back to [`Manifest::default`]
/// on any network error, non-200 response, or parse failure - a missing
/// manifest is not grounds for rejecting the install (§4.7c step (b)).
pub async fn fetch_manifest(client: &reqwest::Client, location: &SourceLocation, manifest_name: &str) -> Manifest {
    let url = raw_file_url(location, manifest_name, manifest_name);
    match client.get(&url).send().await {
        Ok(response) if response.status().is_success() => match response.text().await {
            Ok(body) => serde_json::from_str(&body).unwrap_or_default(),
            Err(_) => Manifest::default(),
        },
        _ => Manifest::default(),
    }
}

pub fn source_url_for(location: &SourceLocation, manifest: &Manifest, manifest_name: &str) -> String {
    raw_file_url(location, manifest_name, &manifest.main)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location() -> SourceLocation {
        SourceLocation {
            host: "git.example.com".into(),
            owner: "acme".into(),
            repo: "widgets".into(),
            branch: "main".into(),
            subpath: None,
        }
    }

    #[test]
    fn default_manifest_points_at_the_conventional_entry_point() {
        let manifest = Manifest::default();
        assert_eq!(manifest.main, DEFAULT_MAIN);
        assert!(manifest.dependencies.is_empty());
    }

    #[test]
    fn deserializes_a_manifest_with_an_explicit_main() {
        let manifest: Manifest = serde_json::from_str(r#"{"main": "app.script", "dependencies": ["util"]}"#).unwrap();
        assert_eq!(manifest.main, "app.script");
        assert_eq!(manifest.dependencies, vec!["util".to_string()]);
    }

    #[test]
    fn source_url_for_builds_a_raw_content_path() {
        let manifest = Manifest { main: "app.script".to_string(), dependencies: vec![] };
        let url = source_url_for(&location(), &manifest, "package-manifest");
        assert_eq!(url, "https://git.example.com/acme/widgets/main/app.script");
    }
}
