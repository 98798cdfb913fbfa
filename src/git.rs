//! Provisioner (spec §4.3, component C3).
//!
//! Resolves a [`Query`]'s ref to a commit SHA and materializes the source on
//! disk: a partial/shallow clone for remote queries, a direct path for local
//! ones. Grounded on the teacher's `git.rs` (`run_git`, `TempCloneDir`,
//! `normalize_to_https`, `clone_repo`'s shallow-vs-full branching) and the
//! Python original's `clone.py`/`utils/git_utils.py` for the exact partial
//! clone sequence, auth header format, and ref-resolution precedence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use base64::Engine;
use tokio::process::Command;

use crate::error::Error;
use crate::source::HostProbe;
use crate::types::{GitRef, Query, RepoMetadata, SourceKind};

/// Wall-clock budget for the whole provisioning step (spec §4.3, env
/// override `GIT_INGEST_TIMEOUT_SECS`), matching the Python original's
/// `DEFAULT_TIMEOUT`.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// `true` if `url`'s host is a GitHub variant that understands the
/// `x-oauth-basic` token scheme (spec §4.3 "Authentication").
pub fn is_github_host(url: &str) -> bool {
    url.contains("github.com") || url.contains("github.")
}

/// Validates a GitHub PAT's shape: classic (`gh[pousr]_` + 36 alphanumerics)
/// or fine-grained (`github_pat_` + 22 + `_` + 59 alphanumerics).
pub fn is_valid_token_format(token: &str) -> bool {
    let classic = ["ghp_", "gho_", "ghu_", "ghs_", "ghr_"].iter().any(|prefix| {
        token
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.len() == 36 && rest.chars().all(|c| c.is_ascii_alphanumeric()))
    });
    if classic {
        return true;
    }
    let Some(rest) = token.strip_prefix("github_pat_") else {
        return false;
    };
    let Some((first, second)) = rest.split_once('_') else {
        return false;
    };
    first.len() == 22
        && second.len() == 59
        && first.chars().all(|c| c.is_ascii_alphanumeric())
        && second.chars().all(|c| c.is_ascii_alphanumeric())
}

fn host_of(url: &str) -> Option<&str> {
    let without_scheme = url.split("://").nth(1).unwrap_or(url);
    without_scheme.split('/').next().filter(|h| !h.is_empty())
}

/// Builds the `git -c http.https://<host>/.extraheader=...` config value
/// carrying a Basic auth header, matching the Python original's
/// `create_git_auth_header` exactly (never written to the working tree,
/// only passed as an ephemeral `-c` flag).
pub fn auth_config_param(token: &str, url: &str) -> anyhow::Result<String> {
    let host = host_of(url).context("invalid repository URL")?;
    let basic = base64::engine::general_purpose::STANDARD.encode(format!("x-oauth-basic:{token}"));
    Ok(format!("http.https://{host}/.extraheader=Authorization: Basic {basic}"))
}

async fn run_git(cwd: Option<&Path>, extra_config: Option<&str>, args: &[&str]) -> anyhow::Result<String> {
    let mut cmd = Command::new("git");
    if let Some(dir) = cwd {
        cmd.args(["-C", &dir.to_string_lossy()]);
    }
    if let Some(cfg) = extra_config {
        cmd.args(["-c", cfg]);
    }
    cmd.args(args);

    let output = cmd
        .output()
        .await
        .map_err(|e| anyhow::anyhow!("failed to run git: {e}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{}", stderr.trim());
    }

    Ok(String::from_utf8(output.stdout)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()))
}

/// Warns (once, best-effort) if Windows long-path support isn't enabled —
/// advisory only, never blocks the clone (matches the Python original's
/// `ensure_git_installed` Windows branch).
#[cfg(windows)]
async fn check_longpaths() {
    if let Ok(out) = run_git(None, None, &["config", "core.longpaths"]).await {
        if out.trim().to_lowercase() != "true" {
            tracing::warn!(
                "git clone may fail on Windows due to long file paths; \
                 consider `git config --global core.longpaths true`"
            );
        }
    }
}

#[cfg(not(windows))]
async fn check_longpaths() {}

/// HTTP-based reachability probe used to discover a domain-less slug's host
/// (spec §4.1) and to fail fast before attempting a clone (spec §4.3).
/// Grounded on the teacher's `github.rs` (`build_client`, status-code
/// dispatch), reinterpreted as a plain reachability check rather than a
/// GitHub REST call.
pub struct HttpHostProbe {
    client: reqwest::Client,
}

impl HttpHostProbe {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("gitdigest/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl HostProbe for HttpHostProbe {
    async fn reachable(&self, candidate_url: &str) -> bool {
        matches!(
            self.client.head(candidate_url).send().await,
            Ok(resp) if resp.status().is_success() || resp.status().as_u16() == 301 || resp.status().as_u16() == 302
        )
    }

    async fn list_refs(&self, url: &str) -> (Vec<String>, Vec<String>) {
        let Ok(output) = run_git(None, None, &["ls-remote", "--heads", "--tags", url]).await else {
            return (Vec::new(), Vec::new());
        };

        let mut branches = Vec::new();
        let mut tags = Vec::new();
        for line in output.lines() {
            let Some((_, reference)) = line.split_once(char::is_whitespace) else {
                continue;
            };
            let reference = reference.trim();
            if let Some(name) = reference.strip_prefix("refs/heads/") {
                branches.push(name.to_string());
            } else if let Some(name) = reference.strip_prefix("refs/tags/") {
                let name = name.strip_suffix("^{}").unwrap_or(name).to_string();
                if !tags.contains(&name) {
                    tags.push(name);
                }
            }
        }
        (branches, tags)
    }
}

/// Builds the `Authorization: Basic ...` header value for `url`, but only
/// when `url`'s host is a GitHub variant (spec §4.3 "Authentication": "issue
/// an authenticated HEAD if a token is supplied and the host is a GitHub
/// variant"). `None` for every other host, even when a token is present, so
/// a token never leaks to a non-GitHub host.
fn maybe_auth_header(token: Option<&str>, url: &str) -> Option<String> {
    let t = token?;
    if !is_github_host(url) {
        return None;
    }
    let basic = base64::engine::general_purpose::STANDARD.encode(format!("x-oauth-basic:{t}"));
    Some(format!("Basic {basic}"))
}

/// Checks whether `url` is reachable and, if a token is present and the host
/// is a GitHub variant, authorized. Maps HTTP status to the spec's error
/// taxonomy: 404 → [`Error::NotFound`], 401/403 → [`Error::Unauthorized`],
/// everything else that isn't a 2xx → [`Error::ProvisionerError`].
pub async fn check_reachable(url: &str, token: Option<&str>) -> Result<(), Error> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("gitdigest/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| Error::ProvisionerError(e.to_string()))?;

    let mut req = client.head(url);
    if let Some(auth) = maybe_auth_header(token, url) {
        req = req.header("Authorization", auth);
    }
    let resp = req
        .send()
        .await
        .map_err(|e| Error::ProvisionerError(format!("{url}: {e}")))?;

    match resp.status() {
        s if s.is_success() || s.as_u16() == 301 || s.as_u16() == 302 => Ok(()),
        s if s.as_u16() == 404 => Err(Error::NotFound(url.to_string())),
        s if s.as_u16() == 401 || s.as_u16() == 403 => Err(Error::Unauthorized(url.to_string())),
        s => Err(Error::ProvisionerError(format!("{url}: unexpected status {s}"))),
    }
}

fn pick_commit_sha(output: &str) -> Option<String> {
    let mut first_non_peeled = None;
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((sha, reference)) = line.split_once(char::is_whitespace) else {
            continue;
        };
        let reference = reference.trim();
        if reference.ends_with("^{}") {
            return Some(sha.to_string());
        }
        if first_non_peeled.is_none() {
            first_non_peeled = Some(sha.to_string());
        }
    }
    first_non_peeled
}

/// Resolves `git_ref` to a commit SHA via `git ls-remote`, preferring the
/// peeled SHA of an annotated tag over its tag-object SHA (spec §4.3 "Ref
/// resolution").
async fn resolve_ref_to_sha(
    url: &str,
    git_ref: Option<&GitRef>,
    auth: Option<&str>,
) -> Result<String, Error> {
    if let Some(GitRef::Commit(sha)) = git_ref {
        return Ok(sha.clone());
    }
    let pattern = match git_ref {
        Some(GitRef::Tag(t)) => format!("refs/tags/{t}*"),
        Some(GitRef::Branch(b)) => format!("refs/heads/{b}"),
        Some(GitRef::Commit(_)) => unreachable!(),
        None => "HEAD".to_string(),
    };

    let output = run_git(None, auth, &["ls-remote", url, &pattern])
        .await
        .map_err(|e| Error::ProvisionerError(e.to_string()))?;

    pick_commit_sha(&output).ok_or_else(|| Error::RefNotFound(pattern))
}

/// Strips a trailing `.git` suffix off the file component of `subpath`
/// (spec §4.3 "Partial clone setup"): a blob URL points at a file, so the
/// sparse-checkout scope is the file's parent directory.
fn sparse_checkout_scope(subpath: &str, blob: bool) -> String {
    let trimmed = subpath.trim_start_matches('/');
    if blob {
        Path::new(trimmed)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| ".".to_string())
    } else {
        trimmed.to_string()
    }
}

/// The outcome of provisioning: where the source landed on disk, and the
/// git identity resolved for it (empty for local non-git directories).
pub struct Provisioned {
    pub local_path: PathBuf,
    pub metadata: RepoMetadata,
}

/// Materializes `query` on disk within the provisioning timeout (spec
/// §4.3). For [`SourceKind::Local`], this is a no-op beyond reading git
/// metadata, if any, from the existing working tree.
pub async fn provision(query: &Query, token: Option<&str>) -> Result<Provisioned, Error> {
    tokio::time::timeout(DEFAULT_TIMEOUT, provision_inner(query, token))
        .await
        .map_err(|_| Error::Timeout(DEFAULT_TIMEOUT))?
}

async fn provision_inner(query: &Query, token: Option<&str>) -> Result<Provisioned, Error> {
    match query.source_kind {
        SourceKind::Local => provision_local(query).await,
        SourceKind::Remote => provision_remote(query, token).await,
    }
}

async fn provision_local(query: &Query) -> Result<Provisioned, Error> {
    let root = query
        .root_path
        .clone()
        .ok_or_else(|| Error::InvalidSource("local query missing root_path".to_string()))?;

    let metadata = match run_git(Some(&root), None, &["rev-parse", "HEAD"]).await {
        Ok(sha) => {
            let branch = run_git(Some(&root), None, &["rev-parse", "--abbrev-ref", "HEAD"])
                .await
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| s != "HEAD");
            RepoMetadata {
                commit_sha: Some(sha.trim().to_string()),
                branch,
                tag: None,
            }
        }
        Err(_) => RepoMetadata::default(),
    };

    Ok(Provisioned {
        local_path: root,
        metadata,
    })
}

async fn provision_remote(query: &Query, token: Option<&str>) -> Result<Provisioned, Error> {
    check_longpaths().await;

    let host = query
        .host
        .as_ref()
        .ok_or_else(|| Error::InvalidSource("remote query missing host".to_string()))?;
    let owner = query.owner.as_deref().unwrap_or_default();
    let repo = query.repo.as_deref().unwrap_or_default();
    let url = format!("https://{}/{owner}/{repo}", host.host_str());

    if let Some(t) = token {
        if !is_valid_token_format(t) {
            return Err(Error::InvalidToken);
        }
    }

    check_reachable(&url, token).await?;

    let auth = if host.is_github_variant() {
        token
            .map(|t| auth_config_param(t, &url))
            .transpose()
            .map_err(|e| Error::ProvisionerError(e.to_string()))?
    } else {
        None
    };
    let auth = auth.as_deref();

    let commit = resolve_ref_to_sha(&url, query.git_ref.as_ref(), auth).await?;

    tokio::fs::create_dir_all(&query.scratch_path)
        .await
        .map_err(|e| Error::IOError(e.to_string()))?;
    let dest = &query.scratch_path;

    let partial_clone = query.subpath != "/";

    let mut clone_args: Vec<&str> = vec!["clone", "--single-branch", "--depth=1", "--no-checkout"];
    if partial_clone {
        clone_args.push("--filter=blob:none");
        clone_args.push("--sparse");
    }
    clone_args.push(&url);
    let dest_str = dest.to_string_lossy().into_owned();
    clone_args.push(&dest_str);

    run_git(None, auth, &clone_args)
        .await
        .map_err(|e| Error::ProvisionerError(format!("clone failed: {e}")))?;

    if partial_clone {
        let scope = sparse_checkout_scope(&query.subpath, query.blob);
        run_git(Some(dest), auth, &["sparse-checkout", "set", &scope])
            .await
            .map_err(|e| Error::ProvisionerError(format!("sparse-checkout failed: {e}")))?;
    }

    run_git(Some(dest), auth, &["fetch", "--depth=1", "origin", &commit])
        .await
        .map_err(|e| Error::ProvisionerError(format!("fetch failed: {e}")))?;
    run_git(Some(dest), auth, &["checkout", &commit])
        .await
        .map_err(|e| Error::ProvisionerError(format!("checkout failed: {e}")))?;

    if query.include_submodules {
        run_git(
            Some(dest),
            auth,
            &["submodule", "update", "--init", "--recursive", "--depth=1"],
        )
        .await
        .map_err(|e| Error::ProvisionerError(format!("submodule update failed: {e}")))?;
    }

    let branch = match &query.git_ref {
        Some(GitRef::Branch(b)) => Some(b.clone()),
        _ => None,
    };
    let tag = match &query.git_ref {
        Some(GitRef::Tag(t)) => Some(t.clone()),
        _ => None,
    };

    Ok(Provisioned {
        local_path: dest.clone(),
        metadata: RepoMetadata {
            commit_sha: Some(commit),
            branch,
            tag,
        },
    })
}

/// Normalizes a remote URL to `https://host/owner/repo`, accepting SCP-style
/// (`git@host:owner/repo`) and `ssh://` forms. Kept from the teacher's
/// `normalize_to_https` for displaying a repo's detected remote in the
/// summary header when ingesting a local git working tree.
pub fn normalize_to_https(url: &str) -> String {
    let url = url.trim();
    if let Some(rest) = url.strip_prefix("ssh://") {
        let rest = rest.strip_prefix("git@").unwrap_or(rest);
        return format!("https://{}", rest.trim_end_matches(".git"));
    }
    if let Some(rest) = url.strip_prefix("git@") {
        if let Some((host, path)) = rest.split_once(':') {
            return format!("https://{host}/{}", path.trim_end_matches(".git"));
        }
    }
    if let Some(rest) = url.strip_prefix("http://") {
        return format!("https://{}", rest.trim_end_matches(".git"));
    }
    if let Some(rest) = url.strip_prefix("https://") {
        return format!("https://{}", rest.trim_end_matches(".git"));
    }
    url.trim_end_matches(".git").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_format_classic() {
        assert!(is_valid_token_format(&format!("ghp_{}", "a".repeat(36))));
        assert!(!is_valid_token_format("ghp_tooshort"));
    }

    #[test]
    fn token_format_fine_grained() {
        let token = format!("github_pat_{}_{}", "a".repeat(22), "b".repeat(59));
        assert!(is_valid_token_format(&token));
        assert!(!is_valid_token_format("github_pat_short"));
    }

    #[test]
    fn pick_sha_prefers_peeled_tag() {
        let output = "abc123\trefs/tags/v1.0.0\ndef456\trefs/tags/v1.0.0^{}\n";
        assert_eq!(pick_commit_sha(output).as_deref(), Some("def456"));
    }

    #[test]
    fn pick_sha_first_line_for_branch() {
        let output = "abc123\trefs/heads/main\n";
        assert_eq!(pick_commit_sha(output).as_deref(), Some("abc123"));
    }

    #[test]
    fn pick_sha_none_for_empty_output() {
        assert_eq!(pick_commit_sha(""), None);
    }

    #[test]
    fn sparse_scope_tree_keeps_full_subpath() {
        assert_eq!(sparse_checkout_scope("/src/lib", false), "src/lib");
    }

    #[test]
    fn sparse_scope_blob_drops_filename() {
        assert_eq!(sparse_checkout_scope("/src/main.rs", true), "src");
    }

    #[test]
    fn sparse_scope_blob_at_root() {
        assert_eq!(sparse_checkout_scope("/README.md", true), ".");
    }

    #[test]
    fn normalize_https_passthrough() {
        assert_eq!(
            normalize_to_https("https://github.com/user/repo.git"),
            "https://github.com/user/repo"
        );
    }

    #[test]
    fn normalize_scp_style() {
        assert_eq!(
            normalize_to_https("git@github.com:user/repo.git"),
            "https://github.com/user/repo"
        );
    }

    #[test]
    fn normalize_ssh_scheme() {
        assert_eq!(
            normalize_to_https("ssh://git@github.com/user/repo.git"),
            "https://github.com/user/repo"
        );
    }

    #[test]
    fn is_github_host_variants() {
        assert!(is_github_host("https://github.com/a/b"));
        assert!(is_github_host("https://github.myco.com/a/b"));
        assert!(!is_github_host("https://gitlab.com/a/b"));
    }

    #[test]
    fn auth_header_omitted_for_non_github_host() {
        assert_eq!(maybe_auth_header(Some("tok"), "https://gitlab.com/a/b"), None);
        assert_eq!(maybe_auth_header(Some("tok"), "https://bitbucket.org/a/b"), None);
    }

    #[test]
    fn auth_header_built_for_github_host_when_token_present() {
        assert!(maybe_auth_header(Some("tok"), "https://github.com/a/b").is_some());
        assert!(maybe_auth_header(None, "https://github.com/a/b").is_none());
    }
}
