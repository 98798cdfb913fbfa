//! The crate's exhaustive, stable error kind set (spec §7).
//!
//! Internal plumbing uses `anyhow::Result` (same as the teacher's `git.rs`);
//! each component's public entry point converts into one of these variants
//! at the boundary, the same place the teacher's `error::Error` sits relative
//! to its `anyhow`-returning git/filter helpers.

use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaReason {
    FileSize,
    FileCount,
    TotalSize,
    DirDepth,
}

impl std::fmt::Display for QuotaReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QuotaReason::FileSize => "file_size",
            QuotaReason::FileCount => "file_count",
            QuotaReason::TotalSize => "total_size",
            QuotaReason::DirDepth => "dir_depth",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid source: {0}")]
    InvalidSource(String),

    #[error("unknown host: {0}")]
    UnknownHost(String),

    #[error("invalid token format")]
    InvalidToken,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("source not found: {0}")]
    NotFound(String),

    #[error("ref not found: {0}")]
    RefNotFound(String),

    #[error("pattern syntax error: {0}")]
    PatternSyntax(String),

    #[error("quota exceeded ({reason}): {detail}")]
    QuotaExceeded { reason: QuotaReason, detail: String },

    #[error("I/O error: {0}")]
    IOError(String),

    #[error("git provisioner error: {0}")]
    ProvisionerError(String),

    #[error("tokenizer unavailable: {0}")]
    TokenizerUnavailable(String),

    #[error("job cancelled")]
    Cancelled,

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IOError(e.to_string())
    }
}

/// CLI-facing exit codes (spec §6).
pub fn exit_code(err: &Error) -> i32 {
    match err {
        Error::InvalidSource(_) | Error::PatternSyntax(_) | Error::InvalidToken => 2,
        Error::Unauthorized(_) => 3,
        Error::NotFound(_) | Error::RefNotFound(_) | Error::UnknownHost(_) => 4,
        Error::QuotaExceeded { .. } => 5,
        _ => 1,
    }
}

pub fn invalid_source(path: impl Into<PathBuf>) -> Error {
    let path = path.into();
    Error::InvalidSource(format!("{}: not found", path.display()))
}
