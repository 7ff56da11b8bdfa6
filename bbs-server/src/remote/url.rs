//! # Source URL
//!
//! Parses a remote app's source URL into the parts `RemoteLoader` needs to
//! fetch its manifest and source file (§4.7c pipeline step (a)): host,
//! owner, repo, an optional branch, and an optional subpath. The host
//! allowlist check happens here too - nothing downstream ever sees a URL
//! this function hasn't already approved.

use shared::errors::ApiError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub host: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub subpath: Option<String>,
}

impl SourceLocation {
    /// Deterministic app id synthesized from the location (§4.7i
    /// "synthesized id `remote_<owner>_<repo>[_<subpath>]`").
    pub fn synthesized_id(&self) -> String {
        let mut id = format!("remote_{}_{}", self.owner, self.repo);
        if let Some(subpath) = &self.subpath {
            let slug: String =
                subpath.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect();
            id.push('_');
            id.push_str(&slug);
        }
        id
    }
}

/// Parses `https://<host>/<owner>/<repo>[/tree/<branch>[/<subpath>]]`,
/// rejecting anything whose host isn't in `allowed_hosts` or that doesn't
/// fit the shape (§4.7c step (a)).
pub fn parse_source_url(url: &str, allowed_hosts: &[String]) -> Result<SourceLocation, ApiError> {
    let parsed =
        reqwest::Url::parse(url).map_err(|e| ApiError::RemoteFetchFault { reason: format!("malformed url: {e}") })?;

    if parsed.scheme() != "https" {
        return Err(ApiError::RemoteFetchFault { reason: "only https sources are allowed".to_string() });
    }

    let host = parsed.host_str().ok_or_else(|| ApiError::RemoteFetchFault { reason: "url has no host".to_string() })?;
    if !allowed_hosts.iter().any(|allowed| allowed == host) {
        return Err(ApiError::RemoteFetchFault { reason: format!("host '{host}' is not in the allowlist") });
    }

    let segments: Vec<&str> =
        parsed.path_segments().map(|s| s.filter(|seg| !seg.is_empty()).collect()).unwrap_or_default();

    let (owner, repo) = match (segments.first(), segments.get(1)) {
        (Some(owner), Some(repo)) => (owner.to_string(), repo.to_string()),
        _ => return Err(ApiError::RemoteFetchFault { reason: "url must be https://host/owner/repo[...]".to_string() }),
    };

    let (branch, subpath) = match segments.get(2..) {
        Some([tree, branch, rest @ ..]) if *tree == "tree" => {
            let subpath = if rest.is_empty() { None } else { Some(rest.join("/")) };
            (branch.to_string(), subpath)
        }
        Some(rest) if !rest.is_empty() => ("main".to_string(), Some(rest.join("/"))),
        _ => ("main".to_string(), None),
    };

    Ok(SourceLocation { host: host.to_string(), owner, repo, branch, subpath })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed() -> Vec<String> {
        vec!["git.example.com".to_string()]
    }

    #[test]
    fn parses_a_bare_owner_repo_url() {
        let loc = parse_source_url("https://git.example.com/acme/widgets", &allowed()).unwrap();
        assert_eq!(loc.owner, "acme");
        assert_eq!(loc.repo, "widgets");
        assert_eq!(loc.branch, "main");
        assert_eq!(loc.subpath, None);
    }

    #[test]
    fn parses_a_url_with_an_explicit_branch_and_subpath() {
        let loc = parse_source_url("https://git.example.com/acme/widgets/tree/dev/apps/demo", &allowed()).unwrap();
        assert_eq!(loc.branch, "dev");
        assert_eq!(loc.subpath, Some("apps/demo".to_string()));
    }

    #[test]
    fn rejects_a_host_outside_the_allowlist() {
        let result = parse_source_url("https://evil.example.com/acme/widgets", &allowed());
        assert!(result.is_err());
    }

    #[test]
    fn rejects_non_https_schemes() {
        let result = parse_source_url("http://git.example.com/acme/widgets", &allowed());
        assert!(result.is_err());
    }

    #[test]
    fn rejects_a_url_missing_a_repo_segment() {
        let result = parse_source_url("https://git.example.com/acme", &allowed());
        assert!(result.is_err());
    }

    #[test]
    fn synthesized_id_slugifies_the_subpath() {
        let loc = SourceLocation {
            host: "git.example.com".into(),
            owner: "acme".into(),
            repo: "widgets".into(),
            branch: "main".into(),
            subpath: Some("apps/demo".into()),
        };
        assert_eq!(loc.synthesized_id(), "remote_acme_widgets_apps_demo");
    }
}
