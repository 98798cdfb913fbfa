//! Core data model (spec §3): `Query`, `Node`, and the small value types the
//! pipeline threads between components.

use std::path::PathBuf;

use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Remote,
    Local,
}

/// Known Git hosting providers, plus the `github.*` enterprise wildcard
/// (spec §3 Query).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitHost {
    GitHub,
    GitLab,
    Bitbucket,
    Gitea,
    Codeberg,
    /// A `github.<tld>` enterprise host, e.g. `github.mycompany.com`.
    GitHubEnterprise(String),
}

impl GitHost {
    pub fn host_str(&self) -> &str {
        match self {
            GitHost::GitHub => "github.com",
            GitHost::GitLab => "gitlab.com",
            GitHost::Bitbucket => "bitbucket.org",
            GitHost::Gitea => "gitea.com",
            GitHost::Codeberg => "codeberg.org",
            GitHost::GitHubEnterprise(h) => h,
        }
    }

    /// `true` for `github.com` and any `github.*` enterprise host — these
    /// are the only hosts the Provisioner authenticates against (spec §4.3).
    pub fn is_github_variant(&self) -> bool {
        matches!(self, GitHost::GitHub | GitHost::GitHubEnterprise(_))
    }
}

/// A resolved ref: at most one of branch/tag/commit (spec §4.3 Ref resolution).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitRef {
    Branch(String),
    Tag(String),
    Commit(String),
}

/// Resource budgets bounding a traversal (spec §3 Query, §6 env vars).
#[derive(Debug, Clone, Copy)]
pub struct Budgets {
    pub max_file_size: u64,
    pub max_files: usize,
    pub max_total_size: u64,
    pub max_dir_depth: usize,
}

impl Budgets {
    /// Matches the Python original's `gitingest/config.py` constants.
    pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
    pub const DEFAULT_MAX_FILES: usize = 10_000;
    pub const DEFAULT_MAX_TOTAL_SIZE: u64 = 500 * 1024 * 1024;
    pub const DEFAULT_MAX_DIR_DEPTH: usize = 20;
}

impl Default for Budgets {
    fn default() -> Self {
        Self {
            max_file_size: Self::DEFAULT_MAX_FILE_SIZE,
            max_files: Self::DEFAULT_MAX_FILES,
            max_total_size: Self::DEFAULT_MAX_TOTAL_SIZE,
            max_dir_depth: Self::DEFAULT_MAX_DIR_DEPTH,
        }
    }
}

/// The normalized request driving one ingestion job (spec §3 Query).
///
/// Created by `source::resolve` and read-only thereafter — mirrors the
/// teacher's `RepoInfo`/`Config` split, collapsed into one value since the
/// pipeline here always fully resolves a source before touching disk.
#[derive(Debug, Clone)]
pub struct Query {
    pub source_kind: SourceKind,
    pub host: Option<GitHost>,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub git_ref: Option<GitRef>,
    /// Always begins with `/`.
    pub subpath: String,
    /// `true` when `git_ref` points at a single file path, not a directory.
    pub blob: bool,
    /// Local mode: the existing directory or file the user pointed at.
    pub root_path: Option<PathBuf>,
    pub slug: String,
    pub id: Uuid,
    pub scratch_path: PathBuf,
    pub budgets: Budgets,
    pub include_patterns: Option<Vec<String>>,
    pub ignore_patterns: Vec<String>,
    pub include_submodules: bool,
    pub include_gitignored: bool,
}

impl Query {
    /// Spec §3 invariants. Called by `source::resolve` right after
    /// construction and asserted in tests; never needs to be re-checked
    /// downstream since `Query` is read-only after creation.
    pub fn check_invariants(&self) -> Result<(), String> {
        match self.source_kind {
            SourceKind::Remote => {
                if self.owner.as_deref().unwrap_or("").is_empty()
                    || self.repo.as_deref().unwrap_or("").is_empty()
                    || self.host.is_none()
                {
                    return Err("remote query missing host/owner/repo".into());
                }
            }
            SourceKind::Local => {
                let Some(root) = &self.root_path else {
                    return Err("local query missing root_path".into());
                };
                if !root.exists() {
                    return Err(format!("{}: path does not exist", root.display()));
                }
            }
        }
        if !self.subpath.starts_with('/') {
            return Err("subpath must begin with '/'".into());
        }
        if self.budgets.max_file_size == 0
            || self.budgets.max_files == 0
            || self.budgets.max_total_size == 0
            || self.budgets.max_dir_depth == 0
        {
            return Err("budgets must be strictly positive".into());
        }
        Ok(())
    }
}

/// A typed filesystem entry produced by the walker (spec §3 Node).
///
/// Re-expressed as a tagged variant per DESIGN NOTES §9: directories own
/// their children by value, rendering switches on the tag rather than
/// dispatching through a formatter hierarchy.
#[derive(Debug, Clone)]
pub enum Node {
    File {
        name: String,
        rel_path: String,
        abs_path: PathBuf,
        depth: usize,
        size_bytes: u64,
    },
    Directory {
        name: String,
        rel_path: String,
        abs_path: PathBuf,
        depth: usize,
        size_bytes: u64,
        children: Vec<Node>,
        file_count: usize,
        dir_count: usize,
    },
    Symlink {
        name: String,
        rel_path: String,
        abs_path: PathBuf,
        depth: usize,
        size_bytes: u64,
        /// The link target exactly as read — never resolved into the node
        /// graph, so cycles through symlinks are structurally impossible.
        target: PathBuf,
    },
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::File { name, .. } | Node::Directory { name, .. } | Node::Symlink { name, .. } => name,
        }
    }

    pub fn rel_path(&self) -> &str {
        match self {
            Node::File { rel_path, .. }
            | Node::Directory { rel_path, .. }
            | Node::Symlink { rel_path, .. } => rel_path,
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            Node::File { depth, .. } | Node::Directory { depth, .. } | Node::Symlink { depth, .. } => *depth,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        match self {
            Node::File { size_bytes, .. }
            | Node::Directory { size_bytes, .. }
            | Node::Symlink { size_bytes, .. } => *size_bytes,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Node::Directory { .. })
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Directory { children, .. } => children,
            _ => &[],
        }
    }
}

/// Git metadata resolved by the Provisioner (spec §4.3), threaded into the
/// Digest Assembler's summary header (spec §4.6).
#[derive(Debug, Clone, Default)]
pub struct RepoMetadata {
    pub commit_sha: Option<String>,
    pub branch: Option<String>,
    pub tag: Option<String>,
}

/// The public option bag for `ingest()` (spec §6 Primary API).
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub max_file_size: Option<u64>,
    pub max_files: Option<usize>,
    pub max_total_size: Option<u64>,
    pub max_dir_depth: Option<usize>,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub branch: Option<String>,
    pub tag: Option<String>,
    pub commit: Option<String>,
    pub include_gitignored: bool,
    pub include_submodules: bool,
    pub token: Option<String>,
    pub max_tokens: Option<usize>,
    pub output_path: Option<PathBuf>,
}

/// The tuple `(summary, tree, content)` plus identity (spec GLOSSARY "Digest").
#[derive(Debug, Clone)]
pub struct Digest {
    pub summary: String,
    pub tree: String,
    pub content: String,
    pub digest_id: Uuid,
}
