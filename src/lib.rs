//! # gitdigest
//!
//! Ingests a git repository (or a local directory) into a deterministic,
//! LLM-friendly text digest: a summary header, an ASCII directory tree, and
//! a concatenated content blob (spec §1, §6 "Primary API").
//!
//! The pipeline is seven cooperating components (spec §4): the Source
//! Resolver ([`source`]) parses the input into a [`types::Query`]; the
//! Provisioner ([`git`]) materializes it on disk; the Filesystem Walker
//! ([`walk`]) and Pattern Engine ([`pattern`]) build a filtered [`types::Node`]
//! tree; the Content Reader ([`content`]) classifies each file; the Digest
//! Assembler ([`digest`]) and Token Accountant ([`tokens`]) render the final
//! three-part output.
//!
//! [`ingest`] is the synchronous entry point a caller with no async runtime
//! can call directly; [`ingest_async`] is the same pipeline for callers
//! already inside one (the CLI, tests). DESIGN NOTES §9 ("Async/coroutine
//! control flow") asks for synchronous core functions with I/O parallelism
//! owned by the caller — the internals stay on `tokio` (matching the
//! teacher's `git.rs`) and `ingest` drives its own runtime so nothing about
//! that choice leaks into the public API.

pub mod cli;
pub mod content;
pub mod defaults;
pub mod digest;
pub mod env;
pub mod error;
pub mod git;
pub mod pattern;
pub mod source;
pub mod tokens;
pub mod types;
pub mod walk;

use crate::env::Env;
use crate::error::Error;
use crate::source::HostProbe;
use crate::types::{Budgets, Digest, GitRef, IngestOptions, Query, SourceKind};

/// Overrides `query.git_ref` with an explicit `--branch`/`--tag`/`--commit`
/// option, taking precedence over whatever the source URL itself encoded
/// (spec §4.1/§4.3; commit > tag > branch when more than one is given).
fn apply_ref_override(query: &mut Query, options: &IngestOptions) {
    if let Some(commit) = &options.commit {
        query.git_ref = Some(GitRef::Commit(commit.clone()));
    } else if let Some(tag) = &options.tag {
        query.git_ref = Some(GitRef::Tag(tag.clone()));
    } else if let Some(branch) = &options.branch {
        query.git_ref = Some(GitRef::Branch(branch.clone()));
    }
}

async fn run_pipeline(query: &Query, options: &IngestOptions) -> Result<Digest, Error> {
    tracing::info!(slug = %query.slug, "provisioning");
    let provisioned = git::provision(query, options.token.as_deref()).await?;

    let scan_root = if query.subpath == "/" {
        provisioned.local_path.clone()
    } else {
        provisioned.local_path.join(query.subpath.trim_start_matches('/'))
    };

    tracing::debug!(root = %scan_root.display(), "walking");
    let include_patterns = query.include_patterns.clone().unwrap_or_default();
    let root = walk::build_tree(
        &scan_root,
        &include_patterns,
        &query.ignore_patterns,
        query.include_gitignored,
        query.budgets,
    )
    .await?;

    tracing::debug!("assembling digest");
    let digest = digest::assemble(&root, query, &provisioned.metadata, options.max_tokens).await;

    if let Some(path) = &options.output_path {
        let full = format!("{}\n{}\n{}", digest.summary, digest.tree, digest.content);
        tokio::fs::write(path, full)
            .await
            .map_err(|e| Error::IOError(e.to_string()))?;
    }

    Ok(digest)
}

/// Resolves `query`'s budgets from `options`, falling back to `env`'s
/// process-wide defaults (spec §6 env vars, §9 "Global state").
fn resolve_budgets(options: &IngestOptions, env: &Env) -> Budgets {
    Budgets {
        max_file_size: options.max_file_size.unwrap_or(env.budgets.max_file_size),
        max_files: options.max_files.unwrap_or(env.budgets.max_files),
        max_total_size: options.max_total_size.unwrap_or(env.budgets.max_total_size),
        max_dir_depth: options.max_dir_depth.unwrap_or(env.budgets.max_dir_depth),
    }
}

/// The async entry point (spec §6 "Primary API"). Drives the full
/// `resolving → provisioning → walking → reading → assembling` state
/// machine (spec §4.7) and always reclaims the job's scratch directory
/// (spec §5 "Resource policy"), even on failure.
pub async fn ingest_async(source: &str, options: IngestOptions) -> Result<Digest, Error> {
    let env = Env::from_environment();
    let budgets = resolve_budgets(&options, &env);

    let probe = git::HttpHostProbe::new().map_err(|e| Error::ProvisionerError(e.to_string()))?;

    let mut query = source::resolve(
        source,
        &probe,
        &env.tmp_root,
        budgets,
        &options.include_patterns,
        &options.exclude_patterns,
        options.include_submodules,
        options.include_gitignored,
    )
    .await?;
    apply_ref_override(&mut query, &options);

    let result = run_pipeline(&query, &options).await;

    if query.source_kind == SourceKind::Remote {
        let _ = tokio::fs::remove_dir_all(&query.scratch_path).await;
    }

    result
}

/// The blocking entry point (spec §6 "Primary API") for callers without
/// their own async runtime. Spins up a dedicated multi-thread `tokio`
/// runtime for the duration of one job; see the module docs for why the
/// core stays `tokio`-based internally regardless.
pub fn ingest(source: &str, options: IngestOptions) -> Result<Digest, Error> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::IOError(e.to_string()))?;
    runtime.block_on(ingest_async(source, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GitRef, SourceKind};
    use std::path::PathBuf;
    use uuid::Uuid;

    fn blank_query() -> Query {
        Query {
            source_kind: SourceKind::Local,
            host: None,
            owner: None,
            repo: None,
            git_ref: None,
            subpath: "/".to_string(),
            blob: false,
            root_path: Some(PathBuf::from(".")),
            slug: "local".to_string(),
            id: Uuid::nil(),
            scratch_path: PathBuf::new(),
            budgets: Budgets::default(),
            include_patterns: None,
            ignore_patterns: Vec::new(),
            include_submodules: false,
            include_gitignored: false,
        }
    }

    #[test]
    fn ref_override_precedence_is_commit_then_tag_then_branch() {
        let mut options = IngestOptions {
            branch: Some("main".to_string()),
            tag: Some("v1.0.0".to_string()),
            commit: Some("a".repeat(40)),
            ..IngestOptions::default()
        };

        let mut query = blank_query();
        apply_ref_override(&mut query, &options);
        assert_eq!(query.git_ref, Some(GitRef::Commit("a".repeat(40))));

        options.commit = None;
        apply_ref_override(&mut query, &options);
        assert_eq!(query.git_ref, Some(GitRef::Tag("v1.0.0".to_string())));

        options.tag = None;
        apply_ref_override(&mut query, &options);
        assert_eq!(query.git_ref, Some(GitRef::Branch("main".to_string())));
    }
}
