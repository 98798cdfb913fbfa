//! CLI argument surface (spec §6 "CLI surface"). Grounded on the teacher's
//! `cli.rs` (`clap::Parser` derive shape).

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "gitdigest",
    about = "Ingest a git repository or local directory into a deterministic, LLM-friendly text digest",
    version
)]
pub struct Args {
    /// Repository URL, `owner/repo` slug, or local path
    pub source: String,

    /// Write the digest (summary + tree + content) to this path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Maximum size, in bytes, for any single file
    #[arg(long = "max-size")]
    pub max_size: Option<u64>,

    /// Maximum token budget for the content blob
    #[arg(long = "max-tokens")]
    pub max_tokens: Option<usize>,

    /// Glob pattern to include (repeatable; overrides default/user ignores)
    #[arg(long = "include-pattern", action = clap::ArgAction::Append)]
    pub include_pattern: Vec<String>,

    /// Glob pattern to exclude (repeatable)
    #[arg(long = "exclude-pattern", action = clap::ArgAction::Append)]
    pub exclude_pattern: Vec<String>,

    /// Branch to check out
    #[arg(long)]
    pub branch: Option<String>,

    /// Tag to check out
    #[arg(long)]
    pub tag: Option<String>,

    /// Commit SHA to check out
    #[arg(long)]
    pub commit: Option<String>,

    /// Don't apply `.gitignore` exclusions
    #[arg(long = "include-gitignored")]
    pub include_gitignored: bool,

    /// Initialize and fetch submodules
    #[arg(long = "include-submodules")]
    pub include_submodules: bool,

    /// Personal access token for private repositories
    #[arg(long)]
    pub token: Option<String>,
}
